//! Core domain models for tabshelf
//!
//! This crate contains:
//! - Tab records (metadata and binary file rows)
//! - External media sync records
//! - Shared error type

pub mod error;
pub mod media;
pub mod tab;

pub use error::{Error, Result};
pub use media::{MediaSync, SyncMethod};
pub use tab::{TabFile, TabId, TabMetadata};
