//! Bridge engine.
//!
//! Owns the long-lived service handles built at startup and hands them to
//! the HTTP layer. The engine itself only runs background maintenance;
//! requests are served by whoever holds a clone of it.

pub mod lifecycle;

use crate::handlers::CallbackDispatcher;
use crate::state::{ProcessedCallbacks, RecordStore};
use bridge_config::Config;
use bridge_delivery::DeliveryService;
use bridge_storage::StorageService;
use bridge_types::WebhookRegistration;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

#[derive(Clone)]
pub struct BridgeEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) delivery: Arc<DeliveryService>,
	pub(crate) records: Arc<RecordStore>,
	pub(crate) dispatcher: Arc<CallbackDispatcher>,
}

impl BridgeEngine {
	pub fn new(config: Config, storage: Arc<StorageService>, delivery: Arc<DeliveryService>) -> Self {
		let dispatcher_config = &config.dispatcher;
		let records = Arc::new(RecordStore::new(
			storage.clone(),
			dispatcher_config.write_mode,
			dispatcher_config.record_actor,
		));
		let processed = Arc::new(ProcessedCallbacks::new(
			storage.clone(),
			dispatcher_config.dedup_ttl_seconds,
		));
		let dispatcher = Arc::new(CallbackDispatcher::new(
			records.clone(),
			processed,
			delivery.clone(),
			dispatcher_config.on_store_error,
			dispatcher_config.parse_mode().map(str::to_string),
		));

		Self {
			config,
			storage,
			delivery,
			records,
			dispatcher,
		}
	}

	/// Runs background maintenance until Ctrl-C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!("Failed to listen for shutdown signal: {}", e);
			}
		})
		.await
	}

	/// Runs background maintenance until `shutdown` resolves.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		let storage = self.storage.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		shutdown.await;
		cleanup_handle.abort();

		self.shutdown().await
	}

	/// Registers the configured webhook URL with the chat platform.
	pub async fn register_webhook(&self) -> Result<(), EngineError> {
		let webhook = self.config.webhook.as_ref().ok_or_else(|| {
			EngineError::Config("No [webhook] section configured".to_string())
		})?;

		let registration = WebhookRegistration {
			url: webhook.url.clone(),
			allowed_updates: webhook.allowed_updates.clone(),
			secret_token: webhook.secret_token.clone(),
		};
		self.delivery
			.set_webhook(&registration)
			.await
			.map_err(|e| EngineError::Service(e.to_string()))
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn delivery(&self) -> &Arc<DeliveryService> {
		&self.delivery
	}

	pub fn records(&self) -> &Arc<RecordStore> {
		&self.records
	}

	pub fn dispatcher(&self) -> &Arc<CallbackDispatcher> {
		&self.dispatcher
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bridge_config::{ConfigBuilder, WebhookConfig};
	use bridge_delivery::implementations::log::LogDelivery;
	use bridge_storage::implementations::memory::MemoryStorage;
	use serde_json::json;

	fn engine(config: Config) -> BridgeEngine {
		BridgeEngine::new(
			config,
			Arc::new(StorageService::new(Box::new(MemoryStorage::new()))),
			Arc::new(DeliveryService::new(Box::new(LogDelivery))),
		)
	}

	#[tokio::test(start_paused = true)]
	async fn test_cleanup_runs_until_shutdown() {
		let engine = engine(ConfigBuilder::new().storage_cleanup_interval_seconds(30).build());
		engine
			.storage()
			.store_with_ttl(
				"processed_callbacks",
				"cb-1",
				&json!({}),
				Some(Duration::from_secs(10)),
			)
			.await
			.unwrap();

		let (tx, rx) = tokio::sync::oneshot::channel::<()>();
		let runner = {
			let engine = engine.clone();
			tokio::spawn(async move {
				engine
					.run_until(async {
						let _ = rx.await;
					})
					.await
			})
		};

		tokio::time::sleep(Duration::from_secs(45)).await;
		// The background pass already dropped the expired entry
		assert_eq!(engine.storage().cleanup_expired().await.unwrap(), 0);
		assert!(!engine
			.storage()
			.exists("processed_callbacks", "cb-1")
			.await
			.unwrap());

		tx.send(()).unwrap();
		runner.await.unwrap().unwrap();
	}

	#[tokio::test]
	async fn test_register_webhook_requires_section() {
		let err = engine(ConfigBuilder::new().build())
			.register_webhook()
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::Config(_)));

		let config = ConfigBuilder::new()
			.webhook(Some(WebhookConfig {
				url: "https://bot.example.com/api/telegram-webhook".to_string(),
				allowed_updates: vec!["callback_query".to_string()],
				secret_token: None,
			}))
			.build();
		engine(config).register_webhook().await.unwrap();
	}
}
