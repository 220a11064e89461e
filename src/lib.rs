//! Library exports for lexgate, shared between the binary and tests.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod startup;
pub mod store;
pub mod utils;

pub use client::{ApiClient, CancellationToken};
pub use error::ClientError;
pub use models::{Envelope, RequestDescriptor, RequestOptions};
