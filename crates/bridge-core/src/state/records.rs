//! Status writes on order and payment documents.
//!
//! Every action turns into a small set of named fields written on top of
//! the stored document. How a missing document is treated depends on the
//! configured [`WriteMode`].

use bridge_config::WriteMode;
use bridge_storage::{StorageError, StorageService};
use bridge_types::{
	now_rfc3339, CallbackAction, OrderRecord, PaymentRecord, StorageKey, FIELD_PROCESSED_AT,
	FIELD_PROCESSED_BY, FIELD_STATUS, FIELD_UPDATED_AT,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
	#[error("{kind} {id} not found")]
	NotFound { kind: &'static str, id: String },
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Namespace holding the documents an action writes to.
fn namespace_for(action: &CallbackAction) -> StorageKey {
	match action {
		CallbackAction::PaymentDecision { .. } => StorageKey::Payments,
		_ => StorageKey::Orders,
	}
}

pub struct RecordStore {
	storage: Arc<StorageService>,
	write_mode: WriteMode,
	record_actor: bool,
}

impl RecordStore {
	pub fn new(storage: Arc<StorageService>, write_mode: WriteMode, record_actor: bool) -> Self {
		Self {
			storage,
			write_mode,
			record_actor,
		}
	}

	/// Fields written for `action`, stamped with `now`.
	fn fields_for(&self, action: &CallbackAction, actor: Option<&str>, now: String) -> Map<String, Value> {
		let mut fields = Map::new();
		match action {
			CallbackAction::OrderDecision { decision, .. }
			| CallbackAction::PaymentDecision { decision, .. } => {
				fields.insert(
					FIELD_STATUS.to_string(),
					Value::from(decision.target_status().as_str()),
				);
				if self.record_actor {
					if let Some(actor) = actor {
						fields.insert(FIELD_PROCESSED_BY.to_string(), Value::from(actor));
					}
					fields.insert(FIELD_PROCESSED_AT.to_string(), Value::from(now.clone()));
				}
			},
			CallbackAction::DepartmentUpdate {
				department, status, ..
			} => {
				fields.insert(
					department.status_field().to_string(),
					Value::from(status.as_str()),
				);
			},
		}
		fields.insert(FIELD_UPDATED_AT.to_string(), Value::from(now));
		fields
	}

	/// Writes the status change described by `action`.
	///
	/// `actor` is the display name of whoever tapped the button; it is only
	/// recorded on approve/reject decisions.
	pub async fn apply(&self, action: &CallbackAction, actor: Option<&str>) -> Result<(), RecordError> {
		let namespace = namespace_for(action).as_str();
		let id = action.entity_id();
		let fields = self.fields_for(action, actor, now_rfc3339());

		let result = match self.write_mode {
			WriteMode::Merge => self.storage.merge_fields(namespace, id, fields).await,
			WriteMode::Update => self.storage.update_fields(namespace, id, fields).await,
		};

		result.map_err(|e| match e {
			StorageError::NotFound => RecordError::NotFound {
				kind: action.entity_kind(),
				id: id.to_string(),
			},
			other => RecordError::Storage(other.to_string()),
		})
	}

	pub async fn order(&self, id: &str) -> Result<OrderRecord, RecordError> {
		self.read(StorageKey::Orders, "order", id).await
	}

	pub async fn payment(&self, id: &str) -> Result<PaymentRecord, RecordError> {
		self.read(StorageKey::Payments, "payment", id).await
	}

	async fn read<T: serde::de::DeserializeOwned>(
		&self,
		key: StorageKey,
		kind: &'static str,
		id: &str,
	) -> Result<T, RecordError> {
		self.storage
			.retrieve(key.as_str(), id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => RecordError::NotFound {
					kind,
					id: id.to_string(),
				},
				other => RecordError::Storage(other.to_string()),
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bridge_storage::implementations::memory::MemoryStorage;
	use bridge_types::{Decision, DecisionStatus, Department, DepartmentStatus};
	use serde_json::json;

	fn storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	fn approve_order(id: &str) -> CallbackAction {
		CallbackAction::OrderDecision {
			order_id: id.to_string(),
			decision: Decision::Approve,
		}
	}

	#[tokio::test]
	async fn test_order_decision_records_actor() {
		let storage = storage();
		storage
			.store("orders", "o1", &json!({"status": "pending", "table": 2}))
			.await
			.unwrap();
		let records = RecordStore::new(storage, WriteMode::Merge, true);

		records.apply(&approve_order("o1"), Some("chef")).await.unwrap();

		let order = records.order("o1").await.unwrap();
		assert_eq!(order.status, Some(DecisionStatus::Approved));
		assert_eq!(order.processed_by.as_deref(), Some("chef"));
		assert!(order.processed_at.is_some());
		assert!(order.updated_at.is_some());
		assert_eq!(order.extra.get("table"), Some(&json!(2)));
	}

	#[tokio::test]
	async fn test_actor_tracking_disabled() {
		let records = RecordStore::new(storage(), WriteMode::Merge, false);
		records.apply(&approve_order("o1"), Some("chef")).await.unwrap();

		let order = records.order("o1").await.unwrap();
		assert!(order.processed_by.is_none());
		assert!(order.processed_at.is_none());
	}

	#[tokio::test]
	async fn test_department_update_leaves_status_alone() {
		let storage = storage();
		storage
			.store("orders", "o2", &json!({"status": "approved", "kitchenStatus": "pending"}))
			.await
			.unwrap();
		let records = RecordStore::new(storage, WriteMode::Merge, true);

		let action = CallbackAction::DepartmentUpdate {
			order_id: "o2".to_string(),
			department: Department::Kitchen,
			status: DepartmentStatus::Ready,
		};
		records.apply(&action, Some("chef")).await.unwrap();

		let order = records.order("o2").await.unwrap();
		assert_eq!(order.status, Some(DecisionStatus::Approved));
		assert_eq!(order.kitchen_status, Some(DepartmentStatus::Ready));
		assert!(order.bar_status.is_none());
		// Station updates never carry an actor
		assert!(order.processed_by.is_none());
	}

	#[tokio::test]
	async fn test_payment_decision_only_touches_payments() {
		let storage = storage();
		let records = RecordStore::new(storage.clone(), WriteMode::Merge, true);

		let action = CallbackAction::PaymentDecision {
			payment_id: "p1".to_string(),
			decision: Decision::Reject,
		};
		records.apply(&action, None).await.unwrap();

		let payment = records.payment("p1").await.unwrap();
		assert_eq!(payment.status, Some(DecisionStatus::Rejected));
		assert!(payment.processed_by.is_none());
		assert!(!storage.exists("orders", "p1").await.unwrap());
	}

	#[tokio::test]
	async fn test_update_mode_requires_existing_document() {
		let records = RecordStore::new(storage(), WriteMode::Update, true);

		let err = records.apply(&approve_order("ghost"), None).await.unwrap_err();
		assert!(matches!(err, RecordError::NotFound { kind: "order", ref id } if id == "ghost"));
		assert!(matches!(
			records.order("ghost").await,
			Err(RecordError::NotFound { .. })
		));
	}

	#[tokio::test]
	async fn test_reapplying_decision_is_stable() {
		let records = RecordStore::new(storage(), WriteMode::Merge, false);
		records.apply(&approve_order("o3"), None).await.unwrap();
		let first = records.order("o3").await.unwrap();
		records.apply(&approve_order("o3"), None).await.unwrap();
		let second = records.order("o3").await.unwrap();

		assert_eq!(first.status, second.status);
		assert_eq!(first.extra, second.extra);
	}
}
