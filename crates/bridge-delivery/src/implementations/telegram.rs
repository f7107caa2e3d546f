//! Telegram Bot API client.
//!
//! Every call is a JSON `POST` to `{api_base_url}/bot{token}/{method}`. The
//! API wraps results as `{"ok": true, "result": ...}` or
//! `{"ok": false, "error_code": ..., "description": ...}`; the bridge never
//! needs the result payload, only whether the call was accepted.

use crate::{DeliveryError, DeliveryInterface};
use async_trait::async_trait;
use bridge_types::{
	CallbackAnswer, ConfigSchema, Field, FieldType, OutgoingMessage, Schema, SecretString,
	ValidationError, WebhookRegistration,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ApiResponse {
	ok: bool,
	#[serde(default)]
	error_code: Option<i64>,
	#[serde(default)]
	description: Option<String>,
}

#[derive(Serialize)]
struct SetWebhookParams<'a> {
	url: &'a str,
	allowed_updates: &'a [String],
	#[serde(skip_serializing_if = "Option::is_none")]
	secret_token: Option<&'a str>,
}

pub struct TelegramDelivery {
	client: reqwest::Client,
	api_base_url: String,
	bot_token: SecretString,
}

impl TelegramDelivery {
	pub fn new(
		bot_token: SecretString,
		api_base_url: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, DeliveryError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.pool_idle_timeout(Duration::from_secs(90))
			.build()
			.map_err(|e| {
				DeliveryError::Configuration(format!("Failed to build HTTP client: {}", e))
			})?;

		Ok(Self {
			client,
			api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
			bot_token,
		})
	}

	fn method_url(&self, method: &str) -> String {
		format!(
			"{}/bot{}/{}",
			self.api_base_url,
			self.bot_token.expose_secret(),
			method
		)
	}

	async fn call<P: Serialize + ?Sized>(&self, method: &str, params: &P) -> Result<(), DeliveryError> {
		// The token is part of the URL, so strip it from transport errors
		let response = self
			.client
			.post(self.method_url(method))
			.json(params)
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("{}: {}", method, e.without_url())))?;

		let status = response.status();
		let body: ApiResponse = match response.json().await {
			Ok(body) => body,
			Err(_) if !status.is_success() => {
				return Err(DeliveryError::Api {
					code: Some(i64::from(status.as_u16())),
					description: format!("{} returned HTTP {}", method, status),
				})
			},
			Err(e) => {
				return Err(DeliveryError::Network(format!(
					"{}: invalid response: {}",
					method,
					e.without_url()
				)))
			},
		};

		if body.ok {
			Ok(())
		} else {
			Err(DeliveryError::Api {
				code: body.error_code,
				description: body
					.description
					.unwrap_or_else(|| format!("{} was rejected", method)),
			})
		}
	}
}

#[async_trait]
impl DeliveryInterface for TelegramDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(TelegramDeliverySchema)
	}

	async fn send_message(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
		self.call("sendMessage", message).await
	}

	async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), DeliveryError> {
		self.call("answerCallbackQuery", answer).await
	}

	async fn set_webhook(&self, registration: &WebhookRegistration) -> Result<(), DeliveryError> {
		let params = SetWebhookParams {
			url: &registration.url,
			allowed_updates: &registration.allowed_updates,
			secret_token: registration
				.secret_token
				.as_ref()
				.map(SecretString::expose_secret),
		};
		self.call("setWebhook", &params).await
	}
}

pub struct TelegramDeliverySchema;

impl ConfigSchema for TelegramDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("bot_token", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(token) if token.split_once(':').is_some_and(|(id, secret)| {
						!id.is_empty() && !secret.is_empty()
					}) =>
					{
						Ok(())
					},
					_ => Err("bot_token must have the form <bot id>:<secret>".to_string()),
				}
			})],
			vec![
				Field::new("api_base_url", FieldType::String).with_validator(|v| {
					match v.as_str() {
						Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
							Ok(())
						},
						_ => Err("api_base_url must be an http(s) URL".to_string()),
					}
				}),
				Field::new(
					"timeout_seconds",
					FieldType::Integer {
						min: Some(1),
						max: Some(300),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory for the Telegram backend.
///
/// Options:
/// - `bot_token` (required): token issued by BotFather
/// - `api_base_url`: defaults to `https://api.telegram.org`
/// - `timeout_seconds`: per-request timeout, defaults to 30
pub fn create_delivery(config: &toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	TelegramDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(format!("Invalid configuration: {}", e)))?;

	let bot_token = config
		.get("bot_token")
		.and_then(|v| v.as_str())
		.map(SecretString::from)
		.ok_or_else(|| DeliveryError::Configuration("bot_token is required".into()))?;
	let api_base_url = config
		.get("api_base_url")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_API_BASE_URL);
	let timeout_seconds = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.and_then(|secs| u64::try_from(secs).ok())
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(TelegramDelivery::new(
		bot_token,
		api_base_url,
		Duration::from_secs(timeout_seconds),
	)?))
}

pub struct Registry;

impl bridge_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "telegram";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}
