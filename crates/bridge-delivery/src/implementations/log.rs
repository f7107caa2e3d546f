//! Dry-run delivery that only logs what would have been sent.

use crate::{DeliveryError, DeliveryInterface};
use async_trait::async_trait;
use bridge_types::{
	CallbackAnswer, ConfigSchema, OutgoingMessage, Schema, ValidationError, WebhookRegistration,
};

pub struct LogDelivery;

#[async_trait]
impl DeliveryInterface for LogDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogDeliverySchema)
	}

	async fn send_message(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
		tracing::info!(
			chat_id = message.chat_id,
			parse_mode = ?message.parse_mode,
			text = %message.text,
			"sendMessage (dry run)"
		);
		Ok(())
	}

	async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), DeliveryError> {
		tracing::info!(
			callback_query_id = %answer.callback_query_id,
			text = ?answer.text,
			show_alert = answer.show_alert,
			"answerCallbackQuery (dry run)"
		);
		Ok(())
	}

	async fn set_webhook(&self, registration: &WebhookRegistration) -> Result<(), DeliveryError> {
		tracing::info!(url = %registration.url, "setWebhook (dry run)");
		Ok(())
	}
}

pub struct LogDeliverySchema;

impl ConfigSchema for LogDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

pub fn create_delivery(config: &toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	LogDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(e.to_string()))?;
	Ok(Box::new(LogDelivery))
}

pub struct Registry;

impl bridge_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}
