//! Chat platform delivery for the callback bridge.
//!
//! Everything the bridge says back to the chat goes through
//! [`DeliveryInterface`]: confirmation messages, callback acknowledgments
//! and, from the command line only, webhook registration.

use async_trait::async_trait;
use bridge_types::{
	CallbackAnswer, ConfigSchema, ImplementationRegistry, OutgoingMessage, WebhookRegistration,
};
use thiserror::Error;

pub mod implementations {
	pub mod log;
	pub mod telegram;
}

#[derive(Debug, Error)]
pub enum DeliveryError {
	/// The request never produced a usable response.
	#[error("Network error: {0}")]
	Network(String),
	/// The platform answered and refused the call.
	#[error("API error{}: {description}", .code.map(|c| format!(" {}", c)).unwrap_or_default())]
	Api {
		code: Option<i64>,
		description: String,
	},
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Outbound calls to the chat platform.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Posts a message to a chat.
	async fn send_message(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;

	/// Answers a callback query so the client stops its loading indicator.
	async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), DeliveryError>;

	/// Points the platform's update delivery at a URL.
	async fn set_webhook(&self, registration: &WebhookRegistration) -> Result<(), DeliveryError>;
}

pub type DeliveryFactory = fn(&toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::{log, telegram};

	vec![
		(log::Registry::NAME, log::Registry::factory()),
		(telegram::Registry::NAME, telegram::Registry::factory()),
	]
}

/// Delivery front used by the dispatcher and the CLI.
pub struct DeliveryService {
	backend: Box<dyn DeliveryInterface>,
}

impl DeliveryService {
	pub fn new(backend: Box<dyn DeliveryInterface>) -> Self {
		Self { backend }
	}

	pub async fn send_message(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
		tracing::debug!(chat_id = message.chat_id, "Sending chat message");
		self.backend.send_message(message).await
	}

	pub async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), DeliveryError> {
		tracing::debug!(
			callback_query_id = %answer.callback_query_id,
			show_alert = answer.show_alert,
			"Answering callback query"
		);
		self.backend.answer_callback_query(answer).await
	}

	pub async fn set_webhook(&self, registration: &WebhookRegistration) -> Result<(), DeliveryError> {
		tracing::info!(
			url = %registration.url,
			allowed_updates = ?registration.allowed_updates,
			with_secret = registration.secret_token.is_some(),
			"Registering webhook"
		);
		self.backend.set_webhook(registration).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_api_error_rendering() {
		let err = DeliveryError::Api {
			code: Some(400),
			description: "Bad Request: chat not found".to_string(),
		};
		assert_eq!(err.to_string(), "API error 400: Bad Request: chat not found");

		let err = DeliveryError::Api {
			code: None,
			description: "unknown".to_string(),
		};
		assert_eq!(err.to_string(), "API error: unknown");
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["log", "telegram"]);
	}
}
