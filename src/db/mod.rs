//! Profile and link persistence.
//!
//! The repository owns every read and write the handlers perform; it speaks
//! key paths and typed items to the store and nothing else.

mod repository;

pub use repository::*;
