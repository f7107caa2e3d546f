//! Callback ids that were already applied.
//!
//! The platform redelivers an update when it does not get a timely 2xx.
//! Remembering callback ids for a short window lets the dispatcher skip
//! the side effects of a redelivered tap.

use super::records::RecordError;
use bridge_storage::StorageService;
use bridge_types::{now_rfc3339, StorageKey};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub struct ProcessedCallbacks {
	storage: Arc<StorageService>,
	/// `None` disables deduplication.
	ttl: Option<Duration>,
}

impl ProcessedCallbacks {
	pub fn new(storage: Arc<StorageService>, ttl_seconds: u64) -> Self {
		Self {
			storage,
			ttl: (ttl_seconds > 0).then(|| Duration::from_secs(ttl_seconds)),
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.ttl.is_some()
	}

	/// Whether `callback_id` was marked within the window.
	pub async fn contains(&self, callback_id: &str) -> Result<bool, RecordError> {
		if !self.is_enabled() {
			return Ok(false);
		}
		self.storage
			.exists(StorageKey::ProcessedCallbacks.as_str(), callback_id)
			.await
			.map_err(|e| RecordError::Storage(e.to_string()))
	}

	/// Marks `callback_id` as taken before its side effects run.
	///
	/// Returns `false` when another delivery already holds it. Always `true`
	/// when deduplication is disabled.
	pub async fn claim(&self, callback_id: &str) -> Result<bool, RecordError> {
		let Some(ttl) = self.ttl else {
			return Ok(true);
		};
		self.storage
			.store_if_absent(
				StorageKey::ProcessedCallbacks.as_str(),
				callback_id,
				&json!({ "processedAt": now_rfc3339() }),
				Some(ttl),
			)
			.await
			.map_err(|e| RecordError::Storage(e.to_string()))
	}

	/// Gives a claim back so a retry of the same tap is applied again.
	pub async fn release(&self, callback_id: &str) -> Result<(), RecordError> {
		if !self.is_enabled() {
			return Ok(());
		}
		self.storage
			.remove(StorageKey::ProcessedCallbacks.as_str(), callback_id)
			.await
			.map_err(|e| RecordError::Storage(e.to_string()))
	}
}
