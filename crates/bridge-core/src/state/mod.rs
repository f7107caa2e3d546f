//! Persistent state touched by the dispatcher: order and payment records
//! and the processed-callback window.

pub mod processed;
pub mod records;

pub use processed::ProcessedCallbacks;
pub use records::{RecordError, RecordStore};
