//! Digestline Core Library
//!
//! Builds a relationship and activity digest from a Gmail/Google Calendar
//! window: retrieval, normalization, thread interaction analysis,
//! aggregation, and report delivery.

pub mod analysis;
pub mod archive;
pub mod config;
pub mod delivery;
pub mod error;
pub mod google;
pub mod models;
pub mod oauth;
pub mod pipeline;
pub mod report;
pub mod summarizer;
pub mod token_provider;

pub use config::Config;
pub use error::{Error, Result};
pub use models::*;

/// Application name for config paths
pub const APP_NAME: &str = "digestline";
