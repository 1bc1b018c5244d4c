//! Listing photo storage.
//!
//! Property identifiers, the quota-safe store, and the upload service.

pub mod property;
pub mod quota;
pub mod service;
pub mod storage;

pub use property::PropertyId;
pub use quota::QuotaLocks;
pub use service::{PhotoService, QuotaStatus};
pub use storage::{LocalPhotoStore, PhotoStore, StoredImageRecord};
