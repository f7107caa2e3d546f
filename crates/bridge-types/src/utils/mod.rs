//! Small helpers shared across the bridge crates.

pub mod formatting;
pub mod helpers;

pub use formatting::{escape_html, id_prefix, truncate_id};
pub use helpers::{current_timestamp, now_rfc3339};
