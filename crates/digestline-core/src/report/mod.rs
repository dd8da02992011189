//! Output contract and its HTML/plain-text rendering

mod assemble;
mod render;

pub use assemble::{assemble, highlights, DigestPayload, Highlights, ReportLimits};
pub use render::{render_html, render_text, ReportView};
