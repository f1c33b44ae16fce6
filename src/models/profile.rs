//! Profile model and the requests that create or edit one.

use serde::{Deserialize, Serialize};

use super::{Link, StoredItem};
use crate::keys;

/// Avatar markers a new profile can be given.
pub const PROFILE_IMAGE_OPTIONS: [&str; 8] = ["🌟", "⚡", "🚀", "💎", "🔥", "🌈", "🎨", "🎭"];

/// Avatar markers offered on the edit page.
pub const EMOJI_OPTIONS: [&str; 10] = [
    "🌟", "⚡", "🚀", "💎", "🔥", "🌈", "🎨", "🎭", "🎪", "🎯",
];

/// Bio every new profile starts with.
pub const DEFAULT_BIO: &str = "Welcome to my profile!";

/// A public profile page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub slug: String,
    pub profile_image: String,
    pub bio: String,
    pub is_active: bool,
    pub view_count: u64,
    /// Filled from store metadata, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Profile {
    /// Build a fresh, active profile with zero views.
    pub fn new(full_name: &str, slug: &str, profile_image: &str) -> Self {
        Self {
            id: slug.to_string(),
            full_name: full_name.to_string(),
            slug: slug.to_string(),
            profile_image: profile_image.to_string(),
            bio: DEFAULT_BIO.to_string(),
            is_active: true,
            view_count: 0,
            created_at: None,
            updated_at: None,
        }
    }
}

impl StoredItem for Profile {
    const ITEM_TYPE: &'static str = "Profile";

    fn key_path(&self) -> String {
        keys::profile_key(&self.slug)
    }

    fn set_timestamps(&mut self, created_at: i64, updated_at: i64) {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
    }
}

/// A profile together with the links found under its key.
#[derive(Debug, Clone, Default)]
pub struct ProfileAndLinks {
    pub profile: Option<Profile>,
    pub links: Vec<Link>,
}

/// Public profile page payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePage {
    pub profile: Profile,
    pub links: Vec<Link>,
    pub total_clicks: u64,
}

/// Edit page payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEditPage {
    pub profile: Profile,
    pub links: Vec<Link>,
    pub emoji_options: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
}

/// Form body for creating a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProfileForm {
    #[serde(default)]
    pub name: String,
}

/// Form body for the edit page.
#[derive(Debug, Clone, Deserialize)]
pub struct EditProfileForm {
    #[serde(default)]
    pub profile_name: String,
    /// Absent leaves the bio untouched; empty clears it
    #[serde(default)]
    pub profile_bio: Option<String>,
}
