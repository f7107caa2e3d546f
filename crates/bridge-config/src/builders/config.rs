//! Configuration builder for tests and local development.

use crate::{
	ApiConfig, BridgeConfig, Config, DeliveryConfig, DispatcherConfig, StorageConfig,
	StoreErrorMode, WebhookConfig, WriteMode,
};
use std::collections::HashMap;

/// Fluent builder producing a [`Config`] backed by in-memory storage and the
/// log-only delivery backend unless told otherwise.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	bridge_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	storage_cleanup_interval_seconds: u64,
	delivery_primary: String,
	delivery_implementations: HashMap<String, toml::Value>,
	webhook: Option<WebhookConfig>,
	dispatcher: DispatcherConfig,
	api: ApiConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			bridge_id: "test-bridge".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations: HashMap::from([("memory".to_string(), empty_table())]),
			storage_cleanup_interval_seconds: 60,
			delivery_primary: "log".to_string(),
			delivery_implementations: HashMap::from([("log".to_string(), empty_table())]),
			webhook: None,
			dispatcher: DispatcherConfig::default(),
			api: ApiConfig::default(),
		}
	}

	pub fn bridge_id(mut self, id: impl Into<String>) -> Self {
		self.bridge_id = id.into();
		self
	}

	/// Selects the primary storage backend and registers its config table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		let primary = primary.into();
		self.storage_implementations.insert(primary.clone(), config);
		self.storage_primary = primary;
		self
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	/// Selects the primary delivery backend and registers its config table.
	pub fn delivery(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		let primary = primary.into();
		self.delivery_implementations.insert(primary.clone(), config);
		self.delivery_primary = primary;
		self
	}

	pub fn webhook(mut self, webhook: Option<WebhookConfig>) -> Self {
		self.webhook = webhook;
		self
	}

	pub fn write_mode(mut self, mode: WriteMode) -> Self {
		self.dispatcher.write_mode = mode;
		self
	}

	pub fn on_store_error(mut self, mode: StoreErrorMode) -> Self {
		self.dispatcher.on_store_error = mode;
		self
	}

	pub fn record_actor(mut self, enabled: bool) -> Self {
		self.dispatcher.record_actor = enabled;
		self
	}

	pub fn dedup_ttl_seconds(mut self, ttl: u64) -> Self {
		self.dispatcher.dedup_ttl_seconds = ttl;
		self
	}

	pub fn api(mut self, api: ApiConfig) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		Config {
			bridge: BridgeConfig { id: self.bridge_id },
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			delivery: DeliveryConfig {
				primary: self.delivery_primary,
				implementations: self.delivery_implementations,
			},
			webhook: self.webhook,
			dispatcher: self.dispatcher,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_defaults_pass_validation() {
		let config = ConfigBuilder::new().build();
		let rendered = toml::to_string(&config).unwrap();
		let reparsed: Config = rendered.parse().unwrap();

		assert_eq!(reparsed.bridge.id, "test-bridge");
		assert_eq!(reparsed.storage.primary, "memory");
		assert_eq!(reparsed.delivery.primary, "log");
	}

	#[test]
	fn test_builder_overrides() {
		let config = ConfigBuilder::new()
			.write_mode(WriteMode::Update)
			.on_store_error(StoreErrorMode::Propagate)
			.dedup_ttl_seconds(0)
			.build();

		assert_eq!(config.dispatcher.write_mode, WriteMode::Update);
		assert_eq!(config.dispatcher.on_store_error, StoreErrorMode::Propagate);
		assert_eq!(config.dispatcher.dedup_ttl_seconds, 0);
		assert!(config.dispatcher.record_actor);
	}
}
