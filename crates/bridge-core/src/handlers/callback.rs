//! Callback query handler.
//!
//! Turns a button tap into at most one record write followed by a chat
//! confirmation and an answer to the callback query.

use crate::state::{ProcessedCallbacks, RecordStore};
use bridge_config::StoreErrorMode;
use bridge_delivery::DeliveryService;
use bridge_types::{
	escape_html, id_prefix, truncate_id, CallbackAction, CallbackAnswer, CallbackQuery, Decision,
	DepartmentStatus, OutgoingMessage, Update,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Errors that make the webhook answer with a server error.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("Store error: {0}")]
	Store(String),
	#[error("Processed-set error: {0}")]
	Processed(String),
}

/// What happened to an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// The update carried no callback query.
	NoCallback,
	/// The callback data matched no known button.
	Ignored,
	/// The callback id was already applied recently.
	Duplicate,
	Applied(CallbackAction),
	/// The record write failed and the user was asked to retry.
	StoreFailed(CallbackAction),
}

/// Chat confirmation for an applied action.
pub fn confirmation_text(action: &CallbackAction) -> String {
	match action {
		CallbackAction::OrderDecision {
			order_id,
			decision: Decision::Approve,
		} => format!(
			"✅ Order {} has been approved and sent to kitchen/bar!",
			id_prefix(order_id)
		),
		CallbackAction::OrderDecision {
			order_id,
			decision: Decision::Reject,
		} => format!("❌ Order {} has been rejected.", id_prefix(order_id)),
		CallbackAction::PaymentDecision {
			payment_id,
			decision: Decision::Approve,
		} => format!("✅ Payment {} has been approved.", id_prefix(payment_id)),
		CallbackAction::PaymentDecision {
			payment_id,
			decision: Decision::Reject,
		} => format!("❌ Payment {} has been rejected.", id_prefix(payment_id)),
		CallbackAction::DepartmentUpdate {
			order_id,
			department,
			status,
		} => {
			let icon = match status {
				DepartmentStatus::Delayed => "⏳",
				_ => "✅",
			};
			format!(
				"{} {} marked order {} as {}.",
				icon,
				department.display_name(),
				id_prefix(order_id),
				status
			)
		},
	}
}

/// Short text shown as the callback query answer.
pub fn ack_text(action: &CallbackAction) -> String {
	match action {
		CallbackAction::OrderDecision { decision, .. } => {
			format!("Order {}!", decision.target_status())
		},
		CallbackAction::PaymentDecision { decision, .. } => {
			format!("Payment {}!", decision.target_status())
		},
		CallbackAction::DepartmentUpdate {
			department, status, ..
		} => format!("{}: {}", department.display_name(), status),
	}
}

pub struct CallbackDispatcher {
	records: Arc<RecordStore>,
	processed: Arc<ProcessedCallbacks>,
	delivery: Arc<DeliveryService>,
	on_store_error: StoreErrorMode,
	parse_mode: Option<String>,
}

impl CallbackDispatcher {
	pub fn new(
		records: Arc<RecordStore>,
		processed: Arc<ProcessedCallbacks>,
		delivery: Arc<DeliveryService>,
		on_store_error: StoreErrorMode,
		parse_mode: Option<String>,
	) -> Self {
		Self {
			records,
			processed,
			delivery,
			on_store_error,
			parse_mode,
		}
	}

	/// Handles one inbound update.
	#[instrument(skip_all, fields(update_id = ?update.update_id))]
	pub async fn dispatch(&self, update: &Update) -> Result<DispatchOutcome, DispatchError> {
		let Some(query) = update.callback_query.as_ref() else {
			return Ok(DispatchOutcome::NoCallback);
		};

		let Some(data) = query.data.as_deref() else {
			tracing::debug!(callback_id = %truncate_id(&query.id), "Callback without data");
			return Ok(DispatchOutcome::Ignored);
		};
		let action = match data.parse::<CallbackAction>() {
			Ok(action) => action,
			Err(e) => {
				tracing::debug!(callback_id = %truncate_id(&query.id), "Ignoring callback: {}", e);
				return Ok(DispatchOutcome::Ignored);
			},
		};

		if self
			.processed
			.contains(&query.id)
			.await
			.map_err(|e| DispatchError::Processed(e.to_string()))?
		{
			tracing::info!(
				callback_id = %truncate_id(&query.id),
				action = %action,
				"Skipping redelivered callback"
			);
			return Ok(DispatchOutcome::Duplicate);
		}

		// Taken before the write so a concurrent redelivery cannot apply it twice
		let claimed = match self.processed.claim(&query.id).await {
			Ok(true) => true,
			Ok(false) => {
				tracing::info!(
					callback_id = %truncate_id(&query.id),
					action = %action,
					"Skipping concurrently delivered callback"
				);
				return Ok(DispatchOutcome::Duplicate);
			},
			Err(e) => {
				tracing::warn!("Failed to record processed callback: {}", e);
				false
			},
		};

		self.apply(query, action, claimed).await
	}

	async fn apply(
		&self,
		query: &CallbackQuery,
		action: CallbackAction,
		claimed: bool,
	) -> Result<DispatchOutcome, DispatchError> {
		let actor = query.actor();
		if let Err(e) = self.records.apply(&action, actor.as_deref()).await {
			if claimed {
				if let Err(e) = self.processed.release(&query.id).await {
					tracing::warn!("Failed to release processed callback: {}", e);
				}
			}
			match self.on_store_error {
				StoreErrorMode::Propagate => {
					tracing::error!(action = %action, error = %e, "Failed to update record");
					return Err(DispatchError::Store(e.to_string()));
				},
				StoreErrorMode::Acknowledge => {
					tracing::warn!(action = %action, error = %e, "Failed to update record");
					let answer = CallbackAnswer::alert(
						query.id.clone(),
						format!("Error processing {}. Please try again.", action.entity_kind()),
					);
					if let Err(e) = self.delivery.answer_callback_query(&answer).await {
						tracing::warn!("Failed to answer callback query: {}", e);
					}
					return Ok(DispatchOutcome::StoreFailed(action));
				},
			}
		}

		tracing::info!(
			action = %action,
			entity = %truncate_id(action.entity_id()),
			actor = actor.as_deref().unwrap_or("unknown"),
			"Applied callback action"
		);

		let message = OutgoingMessage::new(query.chat_id(), self.render_confirmation(&action))
			.with_parse_mode(self.parse_mode.clone());
		if let Err(e) = self.delivery.send_message(&message).await {
			tracing::warn!("Failed to send confirmation: {}", e);
		}

		let answer = CallbackAnswer::notice(query.id.clone(), ack_text(&action));
		if let Err(e) = self.delivery.answer_callback_query(&answer).await {
			tracing::warn!("Failed to answer callback query: {}", e);
		}

		Ok(DispatchOutcome::Applied(action))
	}

	/// Confirmation text, escaped for the configured parse mode.
	fn render_confirmation(&self, action: &CallbackAction) -> String {
		let text = confirmation_text(action);
		match self.parse_mode.as_deref() {
			Some(mode) if mode.eq_ignore_ascii_case("html") => escape_html(&text),
			_ => text,
		}
	}
}
