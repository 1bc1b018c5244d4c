//! Listing Photos Kernel Library
//!
//! Upload pipeline, quota-safe storage, and the HTTP surface.
//! The main entry point for running the server is the `listing-photos` binary.

pub mod config;
pub mod error;
pub mod file;
pub mod metrics;
pub mod photo;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{BatchError, PhotoError, PhotoResult};
pub use state::AppState;
