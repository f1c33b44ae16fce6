//! Data models for the link-in-bio application.
//!
//! Profiles and links are stored as typed items; request bodies mirror the
//! form fields the pages submit.

mod item;
mod link;
mod profile;

pub use item::*;
pub use link::*;
pub use profile::*;
