//! geoload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the geoload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`GeoloadError`] and the [`Result`] alias used by every crate
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Types**: the search documents and bulk actions sent to the index
//!
//! # Example
//!
//! ```no_run
//! use geoload_common::types::GeoPoint;
//!
//! let point = GeoPoint::new(56.78, 12.34);
//! assert_eq!(point.lat, 56.78);
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{GeoloadError, Result};
