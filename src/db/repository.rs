//! Repository for profiles and their links.
//!
//! Every update is a read-modify-write of one full record inside a store
//! transaction. Transient store failures are retried a bounded number of
//! times before being reported.

use std::time::Duration;

use crate::keys;
use crate::models::{Item, Link, NewLink, Profile, ProfileAndLinks, StoredItem};
use crate::store::{MutationError, Store, StoreError, StoreTxn};

/// Base delay between attempts; grows linearly with the attempt number.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Repository for all profile and link operations.
#[derive(Clone)]
pub struct Repository {
    store: Store,
    list_limit: usize,
    max_retries: u32,
}

impl Repository {
    pub fn new(store: Store, list_limit: usize, max_retries: u32) -> Self {
        Self {
            store,
            list_limit,
            max_retries,
        }
    }

    // ==================== READS ====================

    /// List profiles in slug order, up to the configured bound.
    pub async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let items = self
            .store
            .list_type(Profile::ITEM_TYPE, self.list_limit)
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Item::Profile(profile) => Some(profile),
                _ => None,
            })
            .collect())
    }

    /// Fetch a profile and its links with a single bounded scan.
    ///
    /// The profile is `None` when nothing is stored under its key; links
    /// found under the key are returned either way.
    pub async fn get_profile_and_links(&self, slug: &str) -> Result<ProfileAndLinks, StoreError> {
        let items = self
            .store
            .list(&keys::profile_key(slug), self.list_limit)
            .await?;

        let mut result = ProfileAndLinks::default();
        for item in items {
            match item {
                Item::Profile(profile) => result.profile = Some(profile),
                Item::Link(link) => result.links.push(link),
            }
        }

        Ok(result)
    }

    /// Get a profile by slug.
    pub async fn get_profile(&self, slug: &str) -> Result<Option<Profile>, StoreError> {
        self.store.get(&keys::profile_key(slug)).await
    }

    /// Get a single link of a profile.
    pub async fn get_link(&self, slug: &str, id: u64) -> Result<Option<Link>, StoreError> {
        self.store.get(&keys::link_key(slug, id)).await
    }

    // ==================== CREATION ====================

    /// Create a profile with no links. Fails with `AlreadyExists` if the
    /// slug is taken.
    pub async fn create_profile(
        &self,
        full_name: &str,
        slug: &str,
        profile_image: &str,
    ) -> Result<Profile, MutationError> {
        self.bootstrap_profile(full_name, slug, profile_image, &[])
            .await
            .map(|(profile, _)| profile)
    }

    /// Create a profile and seed it with `samples`, one link after another.
    ///
    /// The profile and its links are written in one transaction: either all
    /// of them exist afterwards or none do.
    pub async fn bootstrap_profile(
        &self,
        full_name: &str,
        slug: &str,
        profile_image: &str,
        samples: &[NewLink],
    ) -> Result<(Profile, Vec<Link>), MutationError> {
        let mut attempt = 0;
        loop {
            match self
                .try_bootstrap_profile(full_name, slug, profile_image, samples)
                .await
            {
                Err(e) if self.should_retry(&e, attempt, "create profile") => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(MutationError::Store(e)) => {
                    tracing::error!("Failed to create profile '{}': {}", slug, e);
                    return Err(MutationError::Store(e));
                }
                result => return result,
            }
        }
    }

    async fn try_bootstrap_profile(
        &self,
        full_name: &str,
        slug: &str,
        profile_image: &str,
        samples: &[NewLink],
    ) -> Result<(Profile, Vec<Link>), MutationError> {
        let mut txn = self.store.transaction().await?;
        let written = write_profile(&mut txn, full_name, slug, profile_image, samples).await;
        let (profile, links) = finish(txn, written).await?;
        tracing::info!("Created profile '{}' with {} links", slug, links.len());
        Ok((profile, links))
    }

    /// Create a link at the end of a profile's list.
    ///
    /// The new link gets the next id from the profile's sequence and an
    /// ordinal one past the current maximum (1 for the first link).
    pub async fn create_link(&self, slug: &str, new_link: &NewLink) -> Result<Link, MutationError> {
        let mut attempt = 0;
        loop {
            match self.try_create_link(slug, new_link).await {
                Err(e) if self.should_retry(&e, attempt, "create link") => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                result => return result,
            }
        }
    }

    async fn try_create_link(&self, slug: &str, new_link: &NewLink) -> Result<Link, MutationError> {
        let mut txn = self.store.transaction().await?;
        let written = append_link(&mut txn, slug, new_link).await;
        let link = finish(txn, written).await?;

        tracing::debug!("Created link {} for profile '{}'", link.id, slug);
        Ok(link)
    }

    /// Delete a link. Returns whether it existed.
    pub async fn delete_link(&self, slug: &str, id: u64) -> Result<bool, StoreError> {
        let deleted = self.store.delete(&keys::link_key(slug, id)).await?;
        if deleted {
            tracing::debug!("Deleted link {} of profile '{}'", id, slug);
        }
        Ok(deleted)
    }

    // ==================== MUTATIONS ====================

    /// Apply `mutate` to the record at `key_path` inside one transaction.
    ///
    /// Returns the record as written. If nothing of type `T` is stored at
    /// the key, the transaction is rolled back and `NotFound` is returned
    /// without any write.
    pub async fn with_transaction<T, F>(
        &self,
        key_path: &str,
        mut mutate: F,
    ) -> Result<T, MutationError>
    where
        T: StoredItem,
        F: FnMut(&mut T) + Send,
    {
        let mut attempt = 0;
        loop {
            match self.try_mutate(key_path, &mut mutate).await {
                Err(e) if self.should_retry(&e, attempt, key_path) => {
                    attempt += 1;
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                result => return result,
            }
        }
    }

    async fn try_mutate<T, F>(&self, key_path: &str, mutate: &mut F) -> Result<T, MutationError>
    where
        T: StoredItem,
        F: FnMut(&mut T) + Send,
    {
        let mut txn = self.store.transaction().await?;

        let Some(mut item) = txn.get::<T>(key_path).await? else {
            txn.rollback().await?;
            tracing::warn!("{} at '{}' not found for update", T::ITEM_TYPE, key_path);
            return Err(MutationError::NotFound {
                key_path: key_path.to_string(),
            });
        };

        mutate(&mut item);
        let stored = txn.put(&item).await?;
        txn.commit().await?;

        Ok(stored)
    }

    /// Whether a failed attempt should be repeated.
    fn should_retry(&self, err: &MutationError, attempt: u32, operation: &str) -> bool {
        match err {
            MutationError::Store(e) if e.is_retryable() && attempt < self.max_retries => {
                tracing::warn!(
                    "Store busy during {} (attempt {}/{}), retrying: {}",
                    operation,
                    attempt + 1,
                    self.max_retries,
                    e
                );
                true
            }
            _ => false,
        }
    }

    pub async fn increment_profile_views(&self, slug: &str) -> Result<Profile, MutationError> {
        self.with_transaction(&keys::profile_key(slug), |profile: &mut Profile| {
            profile.view_count += 1;
        })
        .await
    }

    pub async fn rename_profile(&self, slug: &str, new_name: &str) -> Result<Profile, MutationError> {
        self.with_transaction(&keys::profile_key(slug), |profile: &mut Profile| {
            profile.full_name = new_name.to_string();
        })
        .await
    }

    pub async fn update_profile_bio(&self, slug: &str, new_bio: &str) -> Result<Profile, MutationError> {
        self.with_transaction(&keys::profile_key(slug), |profile: &mut Profile| {
            profile.bio = new_bio.to_string();
        })
        .await
    }

    pub async fn increment_link_clicks(&self, slug: &str, id: u64) -> Result<Link, MutationError> {
        self.with_transaction(&keys::link_key(slug, id), |link: &mut Link| {
            link.click_count += 1;
        })
        .await
    }

    pub async fn update_link_order(
        &self,
        slug: &str,
        id: u64,
        order: u32,
    ) -> Result<Link, MutationError> {
        self.with_transaction(&keys::link_key(slug, id), |link: &mut Link| {
            link.order = order;
        })
        .await
    }
}

// Transaction bodies shared by the creation paths

/// Commit `txn` if `written` succeeded, otherwise roll it back.
async fn finish<T>(txn: StoreTxn, written: Result<T, MutationError>) -> Result<T, MutationError> {
    match written {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn write_profile(
    txn: &mut StoreTxn,
    full_name: &str,
    slug: &str,
    profile_image: &str,
    samples: &[NewLink],
) -> Result<(Profile, Vec<Link>), MutationError> {
    let key_path = keys::profile_key(slug);
    if txn.get::<Profile>(&key_path).await?.is_some() {
        return Err(MutationError::AlreadyExists { key_path });
    }

    let profile = txn
        .put(&Profile::new(full_name, slug, profile_image))
        .await?;

    // Sequential: each ordinal depends on the links written before it
    let mut links = Vec::with_capacity(samples.len());
    for sample in samples {
        links.push(append_link(txn, slug, sample).await?);
    }

    Ok((profile, links))
}

/// Write `new_link` after the last link of the profile at `slug`.
async fn append_link(
    txn: &mut StoreTxn,
    slug: &str,
    new_link: &NewLink,
) -> Result<Link, MutationError> {
    let profile_key = keys::profile_key(slug);

    // Unbounded so the ordinal never misses a link past the display limit
    let items = txn.list(&profile_key, usize::MAX).await?;

    if !items.iter().any(|item| matches!(item, Item::Profile(_))) {
        tracing::warn!("Profile '{}' not found for adding a link", slug);
        return Err(MutationError::NotFound {
            key_path: profile_key,
        });
    }

    let max_order = items
        .iter()
        .filter_map(|item| match item {
            Item::Link(link) => Some(link.order),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    let Some(order) = max_order.checked_add(1) else {
        tracing::warn!("Profile '{}' has a link at the highest ordinal", slug);
        return Err(MutationError::OrdinalExhausted {
            key_path: profile_key,
        });
    };

    let id = txn.next_sequence(&profile_key).await?;
    let link = Link {
        id,
        profile_id: slug.to_string(),
        title: new_link.title.clone(),
        url: new_link.url.clone(),
        emoji: new_link.emoji.clone(),
        link_type: new_link.link_type.clone(),
        description: new_link.description.clone(),
        is_active: true,
        order,
        click_count: 0,
        created_at: None,
        updated_at: None,
    };

    Ok(txn.put(&link).await?)
}
