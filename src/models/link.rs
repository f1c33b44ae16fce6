//! Link model and the requests that add or reorder links.

use serde::{Deserialize, Serialize};

use super::StoredItem;
use crate::keys;

/// An outbound link shown on a profile page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: u64,
    pub profile_id: String,
    pub title: String,
    pub url: String,
    pub emoji: String,
    pub link_type: String,
    pub description: String,
    pub is_active: bool,
    pub order: u32,
    pub click_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl StoredItem for Link {
    const ITEM_TYPE: &'static str = "Link";

    fn key_path(&self) -> String {
        keys::link_key(&self.profile_id, self.id)
    }

    fn set_timestamps(&mut self, created_at: i64, updated_at: i64) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}

/// Fields supplied when creating a link. Id and ordinal are assigned by the
/// repository.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLink {
    pub title: String,
    pub url: String,
    pub emoji: String,
    pub link_type: String,
    pub description: String,
}

/// Links every new profile is seeded with, in creation order.
pub fn sample_links() -> [NewLink; 2] {
    [
        NewLink {
            title: "StatelyDB Docs".to_string(),
            url: "https://docs.stately.cloud/api/put/".to_string(),
            emoji: "😎".to_string(),
            link_type: "website".to_string(),
            description: "Learn more about StatelyDB".to_string(),
        },
        NewLink {
            title: "Contact Stately".to_string(),
            url: "mailto:support@stately.cloud".to_string(),
            emoji: "📧".to_string(),
            link_type: "contact".to_string(),
            description: "Get in touch with us".to_string(),
        },
    ]
}

/// Form body for adding a link.
#[derive(Debug, Clone, Deserialize)]
pub struct AddLinkForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_emoji")]
    pub emoji: String,
    #[serde(default = "default_link_type")]
    pub link_type: String,
    #[serde(default)]
    pub description: String,
}

fn default_emoji() -> String {
    "🔗".to_string()
}

fn default_link_type() -> String {
    "other".to_string()
}

impl AddLinkForm {
    /// Validate the form and normalize it into a [`NewLink`].
    ///
    /// Title, URL and description are required. URLs without an explicit
    /// `http://` or `https://` scheme get `https://` prepended.
    pub fn into_new_link(self) -> Option<NewLink> {
        let title = self.title.trim();
        let url = self.url.trim();
        let description = self.description.trim();
        if title.is_empty() || url.is_empty() || description.is_empty() {
            return None;
        }

        let url = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        };

        let emoji = match self.emoji.trim() {
            "" => default_emoji(),
            emoji => emoji.to_string(),
        };

        Some(NewLink {
            title: title.to_string(),
            url,
            emoji,
            link_type: self.link_type,
            description: description.to_string(),
        })
    }
}

/// JSON body for reordering links.
#[derive(Debug, Clone, Deserialize)]
pub struct ReorderLinksRequest {
    #[serde(default)]
    pub orders: Vec<LinkOrder>,
}

/// New ordinal for a single link.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkOrder {
    pub id: u64,
    pub order: u32,
}

/// Outcome of a reorder request.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReorderResult {
    pub updated: Vec<u64>,
    pub missing: Vec<u64>,
}
