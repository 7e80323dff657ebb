//! # NID Common Library
//!
//! Shared code for the Network Inventory Dashboard backend:
//! - Error taxonomy used across layers
//! - Domain vocabulary (technology, category, import status, storage mode)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Category, ImportStatus, StorageMode, Technology};
