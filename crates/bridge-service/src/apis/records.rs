//! Read-only lookups of order and payment documents.

use axum::extract::Path;
use bridge_core::{BridgeEngine, RecordError};
use bridge_types::{APIError, OrderRecord, PaymentRecord};
use tracing::info;

fn to_api_error(e: RecordError) -> APIError {
	match e {
		RecordError::NotFound { .. } => APIError::NotFound,
		RecordError::Storage(_) => APIError::Internal,
	}
}

/// Handles GET /api/orders/{id} requests.
pub async fn get_order_by_id(
	Path(id): Path<String>,
	bridge: &BridgeEngine,
) -> Result<OrderRecord, APIError> {
	info!("Retrieving order with ID: {}", id);
	bridge.records().order(&id).await.map_err(to_api_error)
}

/// Handles GET /api/payments/{id} requests.
pub async fn get_payment_by_id(
	Path(id): Path<String>,
	bridge: &BridgeEngine,
) -> Result<PaymentRecord, APIError> {
	info!("Retrieving payment with ID: {}", id);
	bridge.records().payment(&id).await.map_err(to_api_error)
}
