//! Startup and shutdown hooks.

use super::{BridgeEngine, EngineError};

impl BridgeEngine {
	/// Performs any initialization required before serving.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let dispatcher = &self.config.dispatcher;
		tracing::info!(
			bridge_id = %self.config.bridge.id,
			storage = %self.config.storage.primary,
			delivery = %self.config.delivery.primary,
			write_mode = ?dispatcher.write_mode,
			on_store_error = ?dispatcher.on_store_error,
			dedup_ttl_seconds = dispatcher.dedup_ttl_seconds,
			"Initializing bridge engine"
		);
		Ok(())
	}

	/// Final maintenance pass before exit.
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down bridge engine");
		self.storage
			.cleanup_expired()
			.await
			.map(|_| ())
			.map_err(|e| EngineError::Service(e.to_string()))
	}
}
