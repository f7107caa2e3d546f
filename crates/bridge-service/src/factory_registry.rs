//! Factory registry for bridge backends.
//!
//! Collects every storage and delivery implementation compiled into the
//! binary so the configuration can select them by name.

use bridge_config::Config;
use bridge_core::{BridgeBuilder, BridgeEngine, BridgeFactories};
use bridge_delivery::DeliveryFactory;
use bridge_storage::StorageFactory;
use std::collections::HashMap;

/// Registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub delivery: HashMap<String, DeliveryFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
			delivery: HashMap::new(),
		}
	}

	/// Registry holding every backend this binary ships.
	pub fn with_all_implementations() -> Self {
		let mut registry = Self::new();

		for (name, factory) in bridge_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		for (name, factory) in bridge_delivery::get_all_implementations() {
			tracing::debug!("Registering delivery implementation: {}", name);
			registry.register_delivery(name, factory);
		}

		registry
	}

	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}

	pub fn register_delivery(&mut self, name: impl Into<String>, factory: DeliveryFactory) {
		self.delivery.insert(name.into(), factory);
	}
}

/// Picks the factories named in a config section, failing on unknown names.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build the bridge engine using the registry and config
pub fn build_bridge_from_config(config: Config) -> Result<BridgeEngine, Box<dyn std::error::Error>> {
	let registry = FactoryRegistry::with_all_implementations();

	let storage_factories =
		build_factories!(registry, config.storage.implementations, storage, "storage");
	let delivery_factories = build_factories!(
		registry,
		config.delivery.implementations,
		delivery,
		"delivery"
	);

	let factories = BridgeFactories {
		storage_factories,
		delivery_factories,
	};

	Ok(BridgeBuilder::new(config).build(factories)?)
}
