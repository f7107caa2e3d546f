//! Order and payment record types.
//!
//! Records are owned by whoever creates them (the ordering front-end); the
//! bridge only overwrites individual status fields. Field names follow the
//! document layout used by that front-end, hence the camelCase constants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Document field holding the overall decision status.
pub const FIELD_STATUS: &str = "status";
/// Document field holding the last modification time.
pub const FIELD_UPDATED_AT: &str = "updatedAt";
/// Document field naming who took the decision.
pub const FIELD_PROCESSED_BY: &str = "processedBy";
/// Document field holding when the decision was taken.
pub const FIELD_PROCESSED_AT: &str = "processedAt";

/// Overall decision status shared by orders and payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
	Pending,
	Approved,
	Rejected,
}

impl DecisionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			DecisionStatus::Pending => "pending",
			DecisionStatus::Approved => "approved",
			DecisionStatus::Rejected => "rejected",
		}
	}
}

impl fmt::Display for DecisionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Decision carried by an approve/reject button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
	Approve,
	Reject,
}

impl Decision {
	/// Status written to the record when this decision is applied.
	pub fn target_status(&self) -> DecisionStatus {
		match self {
			Decision::Approve => DecisionStatus::Approved,
			Decision::Reject => DecisionStatus::Rejected,
		}
	}
}

/// Per-station fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartmentStatus {
	Pending,
	Ready,
	Delayed,
}

impl DepartmentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			DepartmentStatus::Pending => "pending",
			DepartmentStatus::Ready => "ready",
			DepartmentStatus::Delayed => "delayed",
		}
	}
}

impl fmt::Display for DepartmentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Fulfillment station tracked on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
	Kitchen,
	Bar,
}

impl Department {
	/// Name used inside callback identifiers.
	pub fn as_str(&self) -> &'static str {
		match self {
			Department::Kitchen => "kitchen",
			Department::Bar => "bar",
		}
	}

	/// Capitalized name used in chat messages.
	pub fn display_name(&self) -> &'static str {
		match self {
			Department::Kitchen => "Kitchen",
			Department::Bar => "Bar",
		}
	}

	/// Order document field holding this station's status.
	pub fn status_field(&self) -> &'static str {
		match self {
			Department::Kitchen => "kitchenStatus",
			Department::Bar => "barStatus",
		}
	}
}

/// Typed view over a stored order document.
///
/// Only the fields the bridge knows about are typed; anything else the
/// front-end stored is kept in `extra` so a read-modify-write never drops it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<DecisionStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kitchen_status: Option<DepartmentStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bar_status: Option<DepartmentStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub processed_by: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub processed_at: Option<String>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OrderRecord {
	/// Returns the status of the given station, if set.
	pub fn department_status(&self, department: Department) -> Option<DepartmentStatus> {
		match department {
			Department::Kitchen => self.kitchen_status,
			Department::Bar => self.bar_status,
		}
	}
}

/// Typed view over a stored payment document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<DecisionStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub updated_at: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub processed_by: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub processed_at: Option<String>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
