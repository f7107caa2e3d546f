//! Core of the callback bridge.
//!
//! Decodes button taps coming from the chat platform, applies the matching
//! status change to order and payment records, and reports back to the
//! chat. The [`BridgeBuilder`] wires storage and delivery backends into a
//! [`BridgeEngine`], which the HTTP service shares across requests.

pub mod builder;
pub mod engine;
pub mod handlers;
pub mod state;

pub use builder::{BridgeBuilder, BridgeFactories, BuilderError};
pub use engine::{BridgeEngine, EngineError};
pub use handlers::{CallbackDispatcher, DispatchError, DispatchOutcome};
pub use state::{ProcessedCallbacks, RecordError, RecordStore};
