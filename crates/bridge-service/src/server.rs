//! HTTP server for the callback bridge.
//!
//! Exposes the webhook the chat platform posts updates to, plus a liveness
//! check and read-only record lookups.

use axum::{
	body::Bytes,
	extract::{DefaultBodyLimit, Path, State},
	http::HeaderMap,
	response::Json,
	routing::{get, post},
	Router,
};
use bridge_core::BridgeEngine;
use bridge_types::{
	APIError, HealthResponse, OrderRecord, PaymentRecord, SecretString, Update, WebhookAck,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Header carrying the secret registered with `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub bridge: Arc<BridgeEngine>,
	/// Expected value of [`SECRET_TOKEN_HEADER`], when configured.
	pub secret_token: Option<SecretString>,
}

impl AppState {
	pub fn new(bridge: Arc<BridgeEngine>) -> Self {
		let secret_token = bridge
			.config()
			.webhook
			.as_ref()
			.and_then(|webhook| webhook.secret_token.clone());
		Self {
			bridge,
			secret_token,
		}
	}
}

pub fn build_router(state: AppState) -> Router {
	let api = state.bridge.config().api.clone();

	Router::new()
		.route(
			&api.webhook_path,
			post(handle_webhook).fallback(handle_method_not_allowed),
		)
		.route("/health", get(handle_health))
		.route("/api/orders/{id}", get(handle_get_order_by_id))
		.route("/api/payments/{id}", get(handle_get_payment_by_id))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(DefaultBodyLimit::max(api.max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until the process exits.
pub async fn start_server(bridge: Arc<BridgeEngine>) -> Result<(), Box<dyn std::error::Error>> {
	let api = bridge.config().api.clone();
	let app = build_router(AppState::new(bridge));

	let bind_address = format!("{}:{}", api.host, api.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!(
		webhook_path = %api.webhook_path,
		"Bridge API server starting on {}",
		bind_address
	);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST on the webhook path.
///
/// The body is read as raw bytes so a malformed envelope maps to the same
/// generic 500 as any other failure instead of axum's 4xx rejections.
async fn handle_webhook(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<WebhookAck>, APIError> {
	if let Some(expected) = &state.secret_token {
		let provided = headers
			.get(SECRET_TOKEN_HEADER)
			.and_then(|value| value.to_str().ok());
		if provided != Some(expected.expose_secret()) {
			tracing::warn!("Rejected webhook call with missing or wrong secret token");
			return Err(APIError::Unauthorized);
		}
	}

	let update: Update = serde_json::from_slice(&body).map_err(|e| {
		tracing::warn!("Malformed webhook payload: {}", e);
		APIError::Internal
	})?;

	match state.bridge.dispatcher().dispatch(&update).await {
		Ok(outcome) => {
			tracing::debug!(?outcome, "Webhook handled");
			Ok(Json(WebhookAck::accepted()))
		},
		Err(e) => {
			tracing::warn!("Webhook dispatch failed: {}", e);
			Err(APIError::Internal)
		},
	}
}

async fn handle_method_not_allowed() -> APIError {
	APIError::MethodNotAllowed
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
		service: state.bridge.config().bridge.id.clone(),
	})
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderRecord>, APIError> {
	match crate::apis::records::get_order_by_id(Path(id), &state.bridge).await {
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::warn!("Order retrieval failed: {}", e);
			Err(e)
		},
	}
}

/// Handles GET /api/payments/{id} requests.
async fn handle_get_payment_by_id(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<PaymentRecord>, APIError> {
	match crate::apis::records::get_payment_by_id(Path(id), &state.bridge).await {
		Ok(payment) => Ok(Json(payment)),
		Err(e) => {
			tracing::warn!("Payment retrieval failed: {}", e);
			Err(e)
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{
		body::{to_bytes, Body},
		http::{Request, StatusCode},
	};
	use bridge_config::{ApiConfig, Config, ConfigBuilder, StoreErrorMode, WebhookConfig, WriteMode};
	use bridge_delivery::{implementations::log::LogDelivery, DeliveryService};
	use bridge_storage::{implementations::memory::MemoryStorage, StorageService};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	const WEBHOOK: &str = "/api/telegram-webhook";

	fn bridge(config: Config) -> Arc<BridgeEngine> {
		Arc::new(BridgeEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			Arc::new(DeliveryService::new(Box::new(LogDelivery))),
		))
	}

	fn app(bridge: Arc<BridgeEngine>) -> Router {
		build_router(AppState::new(bridge))
	}

	fn callback_body(callback_id: &str, data: &str) -> String {
		json!({
			"update_id": 1,
			"callback_query": {
				"id": callback_id,
				"data": data,
				"message": {"message_id": 5, "chat": {"id": -100}},
				"from": {"id": 9, "first_name": "Ana"}
			}
		})
		.to_string()
	}

	fn post_json(path: &str, body: impl Into<Body>) -> Request<Body> {
		Request::builder()
			.method("POST")
			.uri(path)
			.header("content-type", "application/json")
			.body(body.into())
			.unwrap()
	}

	async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
		let response = app.oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
		(status, body)
	}

	#[tokio::test]
	async fn test_approve_order_updates_record() {
		let bridge = bridge(ConfigBuilder::new().build());

		let (status, body) = send(
			app(bridge.clone()),
			post_json(WEBHOOK, callback_body("cb-1", "approve_order_abc123456789")),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"ok": true}));

		let (status, body) = send(
			app(bridge),
			Request::get("/api/orders/abc123456789").body(Body::empty()).unwrap(),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "approved");
		assert_eq!(body["processedBy"], "Ana");
	}

	#[tokio::test]
	async fn test_unrecognized_and_empty_updates_are_acknowledged() {
		let bridge = bridge(ConfigBuilder::new().build());

		let (status, body) = send(
			app(bridge.clone()),
			post_json(WEBHOOK, callback_body("cb-1", "something_else_entirely")),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"ok": true}));

		let (status, _) = send(app(bridge), post_json(WEBHOOK, r#"{"update_id": 2}"#)).await;
		assert_eq!(status, StatusCode::OK);
	}

	#[tokio::test]
	async fn test_non_post_is_rejected() {
		let bridge = bridge(ConfigBuilder::new().build());
		let (status, body) = send(
			app(bridge),
			Request::get(WEBHOOK).body(Body::empty()).unwrap(),
		)
		.await;
		assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
		assert_eq!(body, json!({"error": "Method not allowed"}));
	}

	#[tokio::test]
	async fn test_malformed_body_is_internal_error() {
		let bridge = bridge(ConfigBuilder::new().build());

		let (status, body) = send(app(bridge.clone()), post_json(WEBHOOK, "{not json")).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, json!({"error": "Internal server error"}));

		// Callback query without a chat to answer in
		let (status, _) = send(
			app(bridge),
			post_json(WEBHOOK, r#"{"callback_query": {"id": "cb-1", "data": "approve_order_1"}}"#),
		)
		.await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[tokio::test]
	async fn test_propagate_mode_returns_internal_error() {
		let bridge = bridge(
			ConfigBuilder::new()
				.write_mode(WriteMode::Update)
				.on_store_error(StoreErrorMode::Propagate)
				.build(),
		);

		let (status, body) = send(
			app(bridge),
			post_json(WEBHOOK, callback_body("cb-1", "approve_order_missing")),
		)
		.await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, json!({"error": "Internal server error"}));
	}

	#[tokio::test]
	async fn test_acknowledge_mode_hides_store_failure() {
		let bridge = bridge(ConfigBuilder::new().write_mode(WriteMode::Update).build());

		let (status, body) = send(
			app(bridge),
			post_json(WEBHOOK, callback_body("cb-1", "reject_payment_missing")),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"ok": true}));
	}

	#[tokio::test]
	async fn test_secret_token_is_enforced() {
		let config = ConfigBuilder::new()
			.webhook(Some(WebhookConfig {
				url: "https://bot.example.com/api/telegram-webhook".to_string(),
				allowed_updates: vec!["callback_query".to_string()],
				secret_token: Some(SecretString::from("s3cret")),
			}))
			.build();
		let bridge = bridge(config);

		let (status, body) = send(
			app(bridge.clone()),
			post_json(WEBHOOK, callback_body("cb-1", "ready_kitchen_o1")),
		)
		.await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body, json!({"error": "Unauthorized"}));

		let mut request = post_json(WEBHOOK, callback_body("cb-1", "ready_kitchen_o1"));
		request
			.headers_mut()
			.insert(SECRET_TOKEN_HEADER, "s3cret".parse().unwrap());
		let (status, _) = send(app(bridge.clone()), request).await;
		assert_eq!(status, StatusCode::OK);

		let order = bridge.records().order("o1").await.unwrap();
		assert!(order.kitchen_status.is_some());
	}

	#[tokio::test]
	async fn test_custom_webhook_path_and_body_limit() {
		let config = ConfigBuilder::new()
			.api(ApiConfig {
				webhook_path: "/hooks/tg".to_string(),
				max_request_size: 64,
				..ApiConfig::default()
			})
			.build();
		let bridge = bridge(config);

		let (status, _) = send(app(bridge.clone()), post_json("/hooks/tg", "{}")).await;
		assert_eq!(status, StatusCode::OK);

		let (status, _) = send(
			app(bridge),
			post_json("/hooks/tg", callback_body("cb-1", "approve_order_abcdefghijklmnop")),
		)
		.await;
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[tokio::test]
	async fn test_health_and_missing_records() {
		let bridge = bridge(ConfigBuilder::new().bridge_id("bridge-7").build());

		let (status, body) = send(
			app(bridge.clone()),
			Request::get("/health").body(Body::empty()).unwrap(),
		)
		.await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"status": "ok", "service": "bridge-7"}));

		for path in ["/api/orders/nope", "/api/payments/nope"] {
			let (status, body) = send(
				app(bridge.clone()),
				Request::get(path).body(Body::empty()).unwrap(),
			)
			.await;
			assert_eq!(status, StatusCode::NOT_FOUND);
			assert_eq!(body, json!({"error": "Not found"}));
		}
	}
}
