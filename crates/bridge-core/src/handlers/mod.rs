pub mod callback;

pub use callback::{CallbackDispatcher, DispatchError, DispatchOutcome};
