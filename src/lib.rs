//! Library crate for snyk-compliance-rs: inventory and export retrieval from the
//! Snyk REST API plus the reconciliation that classifies each target.
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod inventory;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod types;

pub use client::ApiClient;
pub use config::Config;
pub use error::{ReportError, Result};
