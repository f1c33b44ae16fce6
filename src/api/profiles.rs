//! Profile API endpoints.

use axum::{
    extract::{Path, State},
    Form,
};
use rand::seq::IndexedRandom;

use super::{success, ApiResponse, ApiResult};
use crate::display;
use crate::errors::AppError;
use crate::keys;
use crate::models::{
    sample_links, CreateProfileForm, EditProfileForm, Profile, ProfileEditPage, ProfilePage,
    EMOJI_OPTIONS, PROFILE_IMAGE_OPTIONS,
};
use crate::AppState;

/// GET /api/profiles - List profiles for the home page.
pub async fn list_profiles(State(state): State<AppState>) -> ApiResult<Vec<Profile>> {
    let profiles = state.repo.list_profiles().await?;
    success(profiles)
}

/// POST /api/profiles - Create a profile seeded with the sample links.
pub async fn create_profile(
    State(state): State<AppState>,
    Form(form): Form<CreateProfileForm>,
) -> ApiResult<ProfileEditPage> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    let slug = keys::slugify(name);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Name must contain at least one letter or digit".to_string(),
        ));
    }

    let profile_image = random_profile_image();
    let (profile, mut links) = state
        .repo
        .bootstrap_profile(name, &slug, profile_image, &sample_links())
        .await?;
    display::sort_links(&mut links);

    tracing::info!("Bootstrapped profile '{}' with {} links", slug, links.len());

    success(ProfileEditPage {
        profile,
        links,
        emoji_options: emoji_options(),
        messages: vec![format!("Created profile: {}!", name)],
    })
}

/// GET /api/profiles/{slug} - Public profile page.
///
/// Counts a view on every successful load.
pub async fn profile_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<ProfilePage> {
    let fetched = state.repo.get_profile_and_links(&slug).await?;
    let profile = match fetched.profile {
        Some(profile) if profile.is_active => profile,
        _ => return Err(profile_not_found(&slug)),
    };

    // A lost view is not worth failing the page for
    let profile = match state.repo.increment_profile_views(&slug).await {
        Ok(updated) => updated,
        Err(e) => {
            tracing::warn!("Failed to record view for profile '{}': {}", slug, e);
            profile
        }
    };

    let links = display::visible_links(fetched.links);
    let total_clicks = display::total_clicks(&links);

    success(ProfilePage {
        profile,
        links,
        total_clicks,
    })
}

/// GET /api/profiles/{slug}/edit - Edit page with every link, active or not.
pub async fn profile_edit(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<ProfileEditPage> {
    edit_page(&state, &slug, Vec::new()).await.map(ApiResponse::new)
}

/// POST /api/profiles/{slug}/edit - Apply a rename and/or bio change.
///
/// Each changed field is written in its own transaction.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Form(form): Form<EditProfileForm>,
) -> ApiResult<ProfileEditPage> {
    let current = state
        .repo
        .get_profile(&slug)
        .await?
        .ok_or_else(|| profile_not_found(&slug))?;

    let mut messages = Vec::new();

    let new_name = form.profile_name.trim();
    if !new_name.is_empty() && new_name != current.full_name {
        state.repo.rename_profile(&slug, new_name).await?;
        messages.push("Profile name updated!".to_string());
    }

    if let Some(bio) = &form.profile_bio {
        let new_bio = bio.trim();
        if new_bio != current.bio {
            state.repo.update_profile_bio(&slug, new_bio).await?;
            messages.push("Profile bio updated!".to_string());
        }
    }

    edit_page(&state, &slug, messages)
        .await
        .map(ApiResponse::new)
}

async fn edit_page(
    state: &AppState,
    slug: &str,
    messages: Vec<String>,
) -> Result<ProfileEditPage, AppError> {
    let fetched = state.repo.get_profile_and_links(slug).await?;
    let profile = fetched.profile.ok_or_else(|| profile_not_found(slug))?;

    let mut links = fetched.links;
    display::sort_links(&mut links);

    Ok(ProfileEditPage {
        profile,
        links,
        emoji_options: emoji_options(),
        messages,
    })
}

fn random_profile_image() -> &'static str {
    PROFILE_IMAGE_OPTIONS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(PROFILE_IMAGE_OPTIONS[0])
}

fn emoji_options() -> Vec<String> {
    EMOJI_OPTIONS.iter().map(|e| e.to_string()).collect()
}

fn profile_not_found(slug: &str) -> AppError {
    AppError::NotFound(format!("Profile {} not found", slug))
}
