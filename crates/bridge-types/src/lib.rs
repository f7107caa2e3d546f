//! Common types module for the callback bridge.
//!
//! This module defines the data types shared by every bridge component:
//! the inbound webhook envelope, decoded callback actions, record statuses,
//! outbound chat payloads and the configuration validation framework.

/// API types for HTTP responses and error bodies.
pub mod api;
/// Inbound update envelope and callback action decoding.
pub mod callback;
/// Outbound chat platform payloads.
pub mod delivery;
/// Order and payment record types.
pub mod record;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Secret string wrapper for credentials.
pub mod secret_string;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for formatting and timestamps.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use callback::*;
pub use delivery::*;
pub use record::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{current_timestamp, escape_html, id_prefix, now_rfc3339, truncate_id};
pub use validation::*;
