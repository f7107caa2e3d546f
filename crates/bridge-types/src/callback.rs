//! Inbound webhook envelope and callback action decoding.
//!
//! The chat platform posts an update envelope for every subscribed event.
//! Only callback queries (button taps) carry work for the bridge; their
//! opaque `data` string is decoded exactly once into a [`CallbackAction`]
//! so the rest of the system never inspects raw identifiers.

use crate::{Decision, Department, DepartmentStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Update envelope delivered to the webhook.
///
/// Fields the bridge does not act on (plain messages, edits, ...) are
/// ignored during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Update {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub update_id: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub callback_query: Option<CallbackQuery>,
}

/// A user's tap on an inline keyboard button.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
	/// Identifier used to answer the query; also the redelivery idempotency key.
	pub id: String,
	/// Data attached to the button by whoever generated it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	/// Message the button was attached to.
	pub message: Message,
	/// User who tapped the button.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub from: Option<User>,
}

impl CallbackQuery {
	/// Chat the originating message lives in.
	pub fn chat_id(&self) -> i64 {
		self.message.chat.id
	}

	/// Human readable name of the user who tapped the button, if known.
	pub fn actor(&self) -> Option<String> {
		self.from.as_ref().and_then(User::display_name)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message_id: Option<i64>,
	pub chat: Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
	pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
	pub id: i64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub first_name: Option<String>,
}

impl User {
	/// Username when set, otherwise the first name.
	pub fn display_name(&self) -> Option<String> {
		self.username
			.clone()
			.filter(|name| !name.is_empty())
			.or_else(|| self.first_name.clone())
	}
}

/// Errors produced while decoding callback data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackParseError {
	/// The data matches none of the known button layouts.
	#[error("Unrecognized callback data: {0}")]
	Unrecognized(String),
	/// The layout matched but no entity id followed the prefix.
	#[error("Missing entity id in callback data: {0}")]
	MissingId(String),
	/// The entity id cannot be used as a record key.
	#[error("Invalid entity id '{0}'")]
	InvalidId(String),
}

/// Action requested by a callback button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackAction {
	/// Approve or reject an order (`approve_order_<id>`, `reject_order_<id>`).
	OrderDecision { order_id: String, decision: Decision },
	/// Approve or reject a payment (`approve_payment_<id>`, `reject_payment_<id>`).
	PaymentDecision {
		payment_id: String,
		decision: Decision,
	},
	/// Report a station status (`ready_<department>_<id>`, `delay_<department>_<id>`).
	DepartmentUpdate {
		order_id: String,
		department: Department,
		status: DepartmentStatus,
	},
}

impl CallbackAction {
	/// Id of the record this action writes to.
	pub fn entity_id(&self) -> &str {
		match self {
			CallbackAction::OrderDecision { order_id, .. } => order_id,
			CallbackAction::PaymentDecision { payment_id, .. } => payment_id,
			CallbackAction::DepartmentUpdate { order_id, .. } => order_id,
		}
	}

	/// Kind of record this action writes to ("order" or "payment").
	pub fn entity_kind(&self) -> &'static str {
		match self {
			CallbackAction::PaymentDecision { .. } => "payment",
			_ => "order",
		}
	}
}

/// Strips `<verb>_<entity>_` from the front of `data`.
fn strip_decision<'a>(data: &'a str, entity: &str) -> Option<(Decision, &'a str)> {
	[(Decision::Approve, "approve"), (Decision::Reject, "reject")]
		.into_iter()
		.find_map(|(decision, verb)| {
			data.strip_prefix(verb)
				.and_then(|rest| rest.strip_prefix('_'))
				.and_then(|rest| rest.strip_prefix(entity))
				.and_then(|rest| rest.strip_prefix('_'))
				.map(|id| (decision, id))
		})
}

fn validate_id<'a>(data: &str, id: &'a str) -> Result<&'a str, CallbackParseError> {
	if id.is_empty() {
		return Err(CallbackParseError::MissingId(data.to_string()));
	}
	if id.contains('/') {
		return Err(CallbackParseError::InvalidId(id.to_string()));
	}
	Ok(id)
}

impl FromStr for CallbackAction {
	type Err = CallbackParseError;

	/// Decodes callback data; the first matching layout wins.
	fn from_str(data: &str) -> Result<Self, Self::Err> {
		if let Some((decision, id)) = strip_decision(data, "order") {
			return Ok(CallbackAction::OrderDecision {
				order_id: validate_id(data, id)?.to_string(),
				decision,
			});
		}

		if let Some((decision, id)) = strip_decision(data, "payment") {
			return Ok(CallbackAction::PaymentDecision {
				payment_id: validate_id(data, id)?.to_string(),
				decision,
			});
		}

		// <action>_<department>_<orderId>; the id keeps any further underscores
		let mut parts = data.splitn(3, '_');
		let status = match parts.next() {
			Some("ready") => DepartmentStatus::Ready,
			Some("delay") => DepartmentStatus::Delayed,
			_ => return Err(CallbackParseError::Unrecognized(data.to_string())),
		};
		let department = match parts.next() {
			Some("kitchen") => Department::Kitchen,
			Some("bar") => Department::Bar,
			_ => return Err(CallbackParseError::Unrecognized(data.to_string())),
		};
		let order_id = validate_id(data, parts.next().unwrap_or_default())?;

		Ok(CallbackAction::DepartmentUpdate {
			order_id: order_id.to_string(),
			department,
			status,
		})
	}
}

impl fmt::Display for CallbackAction {
	/// Renders the callback data a button must carry to trigger this action.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let verb = |decision: &Decision| match decision {
			Decision::Approve => "approve",
			Decision::Reject => "reject",
		};
		match self {
			CallbackAction::OrderDecision { order_id, decision } => {
				write!(f, "{}_order_{}", verb(decision), order_id)
			},
			CallbackAction::PaymentDecision {
				payment_id,
				decision,
			} => write!(f, "{}_payment_{}", verb(decision), payment_id),
			CallbackAction::DepartmentUpdate {
				order_id,
				department,
				status,
			} => {
				let action = match status {
					DepartmentStatus::Delayed => "delay",
					_ => "ready",
				};
				write!(f, "{}_{}_{}", action, department.as_str(), order_id)
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_parse_order_decisions() {
		let action: CallbackAction = "approve_order_abc123456789".parse().unwrap();
		assert_eq!(
			action,
			CallbackAction::OrderDecision {
				order_id: "abc123456789".to_string(),
				decision: Decision::Approve,
			}
		);

		let action: CallbackAction = "reject_order_xyz".parse().unwrap();
		assert_eq!(action.entity_id(), "xyz");
		assert!(matches!(
			action,
			CallbackAction::OrderDecision {
				decision: Decision::Reject,
				..
			}
		));
	}

	#[test]
	fn test_parse_payment_decisions() {
		let action: CallbackAction = "reject_payment_p1".parse().unwrap();
		assert_eq!(
			action,
			CallbackAction::PaymentDecision {
				payment_id: "p1".to_string(),
				decision: Decision::Reject,
			}
		);
		assert_eq!(action.entity_kind(), "payment");
	}

	#[test]
	fn test_parse_department_updates() {
		let action: CallbackAction = "ready_kitchen_o42".parse().unwrap();
		assert_eq!(
			action,
			CallbackAction::DepartmentUpdate {
				order_id: "o42".to_string(),
				department: Department::Kitchen,
				status: DepartmentStatus::Ready,
			}
		);

		let action: CallbackAction = "delay_bar_o42".parse().unwrap();
		assert!(matches!(
			action,
			CallbackAction::DepartmentUpdate {
				department: Department::Bar,
				status: DepartmentStatus::Delayed,
				..
			}
		));
	}

	#[test]
	fn test_department_id_keeps_underscores() {
		let action: CallbackAction = "ready_bar_table_12".parse().unwrap();
		assert_eq!(action.entity_id(), "table_12");
	}

	#[test]
	fn test_order_prefix_wins_over_department_layout() {
		// Would also look like a station update to a substring check
		let action: CallbackAction = "approve_order_ready_kitchen".parse().unwrap();
		assert_eq!(action.entity_id(), "ready_kitchen");
		assert_eq!(action.entity_kind(), "order");
	}

	#[test]
	fn test_unrecognized_data() {
		for data in [
			"",
			"hello",
			"approve_invoice_1",
			"ready_grill_1",
			"ready",
			"xready_kitchen_1",
			"approveorder_1",
		] {
			assert!(
				matches!(
					data.parse::<CallbackAction>(),
					Err(CallbackParseError::Unrecognized(_))
				),
				"expected {:?} to be unrecognized",
				data
			);
		}
	}

	#[test]
	fn test_missing_and_invalid_ids() {
		assert_eq!(
			"approve_order_".parse::<CallbackAction>(),
			Err(CallbackParseError::MissingId("approve_order_".to_string()))
		);
		assert!(matches!(
			"delay_kitchen".parse::<CallbackAction>(),
			Err(CallbackParseError::MissingId(_))
		));
		assert!(matches!(
			"reject_payment_a/b".parse::<CallbackAction>(),
			Err(CallbackParseError::InvalidId(_))
		));
	}

	#[test]
	fn test_ids_are_otherwise_opaque() {
		assert_eq!(
			"approve_order_table 4".parse::<CallbackAction>(),
			Ok(CallbackAction::OrderDecision {
				order_id: "table 4".to_string(),
				decision: Decision::Approve,
			})
		);
		assert_eq!(
			"ready_bar_a\tb".parse::<CallbackAction>().map(|a| a.entity_id().to_string()),
			Ok("a\tb".to_string())
		);
	}

	#[test]
	fn test_display_renders_button_data() {
		let action = CallbackAction::DepartmentUpdate {
			order_id: "o1".to_string(),
			department: Department::Bar,
			status: DepartmentStatus::Delayed,
		};
		assert_eq!(action.to_string(), "delay_bar_o1");
	}

	#[test]
	fn test_update_deserialization() {
		let update: Update = serde_json::from_value(json!({
			"update_id": 10,
			"callback_query": {
				"id": "cb-1",
				"data": "approve_order_o1",
				"from": {"id": 5, "first_name": "Ana"},
				"message": {"message_id": 3, "chat": {"id": -100200}}
			}
		}))
		.unwrap();

		let query = update.callback_query.unwrap();
		assert_eq!(query.chat_id(), -100200);
		assert_eq!(query.actor().as_deref(), Some("Ana"));
	}

	#[test]
	fn test_update_without_callback_query() {
		let update: Update =
			serde_json::from_value(json!({"update_id": 1, "message": {"text": "hi"}})).unwrap();
		assert!(update.callback_query.is_none());
	}

	#[test]
	fn test_callback_query_requires_chat() {
		let result = serde_json::from_value::<Update>(json!({
			"callback_query": {"id": "cb-1", "data": "approve_order_o1"}
		}));
		assert!(result.is_err());
	}

	#[test]
	fn test_actor_prefers_username() {
		let user = User {
			id: 1,
			username: Some("chef".to_string()),
			first_name: Some("Ana".to_string()),
		};
		assert_eq!(user.display_name().as_deref(), Some("chef"));
	}
}
