//! Builder for assembling a bridge engine from configuration.
//!
//! Storage and delivery backends are created through factory functions
//! keyed by implementation name, so the binary decides which backends are
//! compiled in while the configuration decides which one is used.

use crate::engine::BridgeEngine;
use bridge_config::Config;
use bridge_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use bridge_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions available to the builder, by implementation name.
pub struct BridgeFactories<SF, DF> {
	pub storage_factories: HashMap<String, SF>,
	pub delivery_factories: HashMap<String, DF>,
}

pub struct BridgeBuilder {
	config: Config,
}

impl BridgeBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Instantiates every configured backend and wires the primary ones
	/// into an engine.
	pub fn build<SF, DF>(self, factories: BridgeFactories<SF, DF>) -> Result<BridgeEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		DF: Fn(&toml::Value) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let mut delivery_impls = HashMap::new();
		for (name, config) in &self.config.delivery.implementations {
			let Some(factory) = factories.delivery_factories.get(name) else {
				tracing::warn!(component = "delivery", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					delivery_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.delivery.primary == name;
					tracing::info!(component = "delivery", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "delivery",
						implementation = %name,
						error = %e,
						"Failed to create delivery implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create delivery implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary_delivery = &self.config.delivery.primary;
		let delivery_backend = delivery_impls.remove(primary_delivery).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary delivery '{}' failed to load or has invalid configuration",
				primary_delivery
			))
		})?;
		let delivery = Arc::new(DeliveryService::new(delivery_backend));

		Ok(BridgeEngine::new(self.config, storage, delivery))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use bridge_config::ConfigBuilder;

	fn factories() -> BridgeFactories<bridge_storage::StorageFactory, bridge_delivery::DeliveryFactory> {
		BridgeFactories {
			storage_factories: bridge_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			delivery_factories: bridge_delivery::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[test]
	fn test_build_with_defaults() {
		let config = ConfigBuilder::new().build();
		let engine = BridgeBuilder::new(config).build(factories()).unwrap();
		assert_eq!(engine.config().bridge.id, "test-bridge");
	}

	#[test]
	fn test_missing_primary_factory() {
		let config = ConfigBuilder::new()
			.delivery("carrier-pigeon", toml::Value::Table(toml::map::Map::new()))
			.build();
		let err = BridgeBuilder::new(config)
			.build(factories())
			.err()
			.unwrap();
		assert!(err.to_string().contains("carrier-pigeon"));
	}

	#[test]
	fn test_invalid_backend_config() {
		let telegram: toml::Value = toml::from_str("bot_token = \"nope\"").unwrap();
		let config = ConfigBuilder::new().delivery("telegram", telegram).build();
		let err = BridgeBuilder::new(config)
			.build(factories())
			.err()
			.unwrap();
		assert!(matches!(err, BuilderError::Config(ref msg) if msg.contains("telegram")));
	}
}
