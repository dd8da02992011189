//! Data models for Digestline
//!
//! Normalized messages and events, plus the records the analysis stages
//! produce from them.

mod event;
mod message;
mod records;

pub use event::*;
pub use message::*;
pub use records::*;
