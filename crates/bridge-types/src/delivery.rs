//! Outbound chat platform payloads.
//!
//! These mirror the Bot API method parameters the bridge uses. Field names
//! match the wire format so the payloads serialize directly into requests.

use crate::SecretString;
use serde::{Deserialize, Serialize};

/// Parameters of a `sendMessage` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
	pub chat_id: i64,
	pub text: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parse_mode: Option<String>,
}

impl OutgoingMessage {
	pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
		Self {
			chat_id,
			text: text.into(),
			parse_mode: None,
		}
	}

	pub fn with_parse_mode(mut self, parse_mode: Option<String>) -> Self {
		self.parse_mode = parse_mode;
		self
	}
}

/// Parameters of an `answerCallbackQuery` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAnswer {
	pub callback_query_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	/// Show a blocking alert instead of a transient notification.
	#[serde(default)]
	pub show_alert: bool,
}

impl CallbackAnswer {
	/// A transient, non-blocking acknowledgment.
	pub fn notice(callback_query_id: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			callback_query_id: callback_query_id.into(),
			text: Some(text.into()),
			show_alert: false,
		}
	}

	/// A blocking alert the user has to dismiss.
	pub fn alert(callback_query_id: impl Into<String>, text: impl Into<String>) -> Self {
		Self {
			show_alert: true,
			..Self::notice(callback_query_id, text)
		}
	}
}

/// Parameters of a `setWebhook` call.
///
/// Not serializable on purpose: the secret token must be exposed explicitly
/// by the client that builds the request.
#[derive(Debug, Clone)]
pub struct WebhookRegistration {
	pub url: String,
	pub allowed_updates: Vec<String>,
	pub secret_token: Option<SecretString>,
}
