//! Text helpers over raw SIP messages as stored by the collector.

pub mod headers;
pub mod sdp_utils;
pub mod user_agent;

pub use headers::{extract_all_headers, extract_header, extract_headers_by_prefix};
pub use sdp_utils::{extract_media_summary, extract_sdp};
pub use user_agent::format_user_agent;

/// First line of the message (request line or status line).
pub fn start_line(raw: &str) -> &str {
    raw.lines().next().map(str::trim).unwrap_or_default()
}
