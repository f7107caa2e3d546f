//! HTTP response bodies for the webhook and lookup endpoints.
//!
//! Error bodies are deliberately minimal (`{"error": "..."}`) because the
//! chat platform only looks at the status code and retries on non-2xx.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body returned when a webhook delivery was accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
	pub ok: bool,
}

impl WebhookAck {
	pub fn accepted() -> Self {
		Self { ok: true }
	}
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
}

/// Body of the liveness endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	pub service: String,
}

/// Errors surfaced to HTTP clients with their status mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum APIError {
	/// Secret token header missing or wrong (401).
	Unauthorized,
	/// Record lookup miss (404).
	NotFound,
	/// Anything but POST on the webhook path (405).
	MethodNotAllowed,
	/// Malformed envelope or a propagated store failure (500).
	Internal,
}

impl APIError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::Unauthorized => StatusCode::UNAUTHORIZED,
			APIError::NotFound => StatusCode::NOT_FOUND,
			APIError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
			APIError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn to_error_response(&self) -> ErrorResponse {
		ErrorResponse {
			error: self.to_string(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			APIError::Unauthorized => "Unauthorized",
			APIError::NotFound => "Not found",
			APIError::MethodNotAllowed => "Method not allowed",
			APIError::Internal => "Internal server error",
		})
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_error_bodies() {
		assert_eq!(
			serde_json::to_value(APIError::MethodNotAllowed.to_error_response()).unwrap(),
			json!({"error": "Method not allowed"})
		);
		assert_eq!(
			serde_json::to_value(APIError::Internal.to_error_response()).unwrap(),
			json!({"error": "Internal server error"})
		);
	}

	#[test]
	fn test_status_mapping() {
		assert_eq!(APIError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
		assert_eq!(APIError::NotFound.status_code(), StatusCode::NOT_FOUND);
		let response = APIError::MethodNotAllowed.into_response();
		assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
	}

	#[test]
	fn test_ack_body() {
		assert_eq!(
			serde_json::to_value(WebhookAck::accepted()).unwrap(),
			json!({"ok": true})
		);
	}
}
