//! Storage module for the callback bridge.
//!
//! Order and payment documents, as well as the set of already processed
//! callback ids, live behind [`StorageInterface`], a keyed byte store with
//! optional expiry. [`StorageService`] layers JSON documents on top of it,
//! including the field-level writes the dispatcher relies on.

use async_trait::async_trait;
use bridge_types::{ConfigSchema, ImplementationRegistry};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface for storage backends.
///
/// Keys have the form `<namespace>:<id>`. An expired entry must behave
/// exactly like a missing one for every read operation.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes. `None` means the backend's default lifetime for the
	/// key's namespace (usually forever).
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries and returns how many were dropped.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// All storage backends this crate ships, as (config name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn storage_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// Typed JSON layer over a storage backend.
///
/// Read-modify-write operations ([`merge_fields`](Self::merge_fields),
/// [`update_fields`](Self::update_fields), [`store_if_absent`](Self::store_if_absent))
/// are serialized per key within one service instance.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
	key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self {
			backend,
			key_locks: DashMap::new(),
		}
	}

	pub async fn store_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&storage_key(namespace, id), bytes, ttl)
			.await
	}

	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&storage_key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&storage_key(namespace, id)).await
	}

	/// Overwrites an existing value; fails with [`StorageError::NotFound`]
	/// instead of creating it.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		if !self.exists(namespace, id).await? {
			return Err(StorageError::NotFound);
		}
		self.store(namespace, id, data).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&storage_key(namespace, id)).await
	}

	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}

	/// Stores `data` only when no live value exists under the key.
	///
	/// Returns `true` when this call wrote the value.
	pub async fn store_if_absent<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<bool, StorageError> {
		let key = storage_key(namespace, id);
		let lock = self.key_lock(&key);
		let result = {
			let _guard = lock.lock().await;
			if self.exists(namespace, id).await? {
				Ok(false)
			} else {
				self.store_with_ttl(namespace, id, data, ttl)
					.await
					.map(|_| true)
			}
		};
		drop(lock);
		self.release_key_lock(&key);
		result
	}

	/// Writes `fields` into the document, creating it when absent.
	///
	/// Fields already in the document and not named in `fields` are kept.
	pub async fn merge_fields(
		&self,
		namespace: &str,
		id: &str,
		fields: Map<String, Value>,
	) -> Result<(), StorageError> {
		let key = storage_key(namespace, id);
		let lock = self.key_lock(&key);
		let result = {
			let _guard = lock.lock().await;
			match self.load_document(namespace, id).await {
				Ok(document) => self.write_merged(namespace, id, document, fields).await,
				Err(StorageError::NotFound) => {
					self.write_merged(namespace, id, Map::new(), fields).await
				},
				Err(e) => Err(e),
			}
		};
		drop(lock);
		self.release_key_lock(&key);
		result
	}

	/// Writes `fields` into an existing document; fails with
	/// [`StorageError::NotFound`] when there is none.
	pub async fn update_fields(
		&self,
		namespace: &str,
		id: &str,
		fields: Map<String, Value>,
	) -> Result<(), StorageError> {
		let key = storage_key(namespace, id);
		let lock = self.key_lock(&key);
		let result = {
			let _guard = lock.lock().await;
			match self.load_document(namespace, id).await {
				Ok(document) => self.write_merged(namespace, id, document, fields).await,
				Err(e) => Err(e),
			}
		};
		drop(lock);
		self.release_key_lock(&key);
		result
	}

	fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
		self.key_locks.entry(key.to_string()).or_default().clone()
	}

	/// Drops the lock entry once no other caller holds or awaits it.
	fn release_key_lock(&self, key: &str) {
		self.key_locks
			.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
	}

	async fn load_document(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Map<String, Value>, StorageError> {
		match self.retrieve::<Value>(namespace, id).await? {
			Value::Object(document) => Ok(document),
			other => Err(StorageError::Serialization(format!(
				"Document {} is a JSON {} rather than an object",
				storage_key(namespace, id),
				json_type(&other)
			))),
		}
	}

	async fn write_merged(
		&self,
		namespace: &str,
		id: &str,
		mut document: Map<String, Value>,
		fields: Map<String, Value>,
	) -> Result<(), StorageError> {
		document.extend(fields);
		self.store(namespace, id, &Value::Object(document)).await
	}
}

fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde_json::json;

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	fn fields(value: Value) -> Map<String, Value> {
		value.as_object().cloned().unwrap()
	}

	#[tokio::test]
	async fn test_merge_fields_preserves_other_fields() {
		let storage = service();
		storage
			.store("orders", "o1", &json!({"status": "pending", "table": 4}))
			.await
			.unwrap();

		storage
			.merge_fields("orders", "o1", fields(json!({"status": "approved"})))
			.await
			.unwrap();

		let doc: Value = storage.retrieve("orders", "o1").await.unwrap();
		assert_eq!(doc, json!({"status": "approved", "table": 4}));
	}

	#[tokio::test]
	async fn test_merge_fields_creates_missing_document() {
		let storage = service();
		storage
			.merge_fields("payments", "p1", fields(json!({"status": "rejected"})))
			.await
			.unwrap();

		let doc: Value = storage.retrieve("payments", "p1").await.unwrap();
		assert_eq!(doc, json!({"status": "rejected"}));
	}

	#[tokio::test]
	async fn test_update_fields_requires_document() {
		let storage = service();
		let result = storage
			.update_fields("orders", "missing", fields(json!({"status": "approved"})))
			.await;
		assert!(matches!(result, Err(StorageError::NotFound)));
		assert!(!storage.exists("orders", "missing").await.unwrap());

		storage
			.store("orders", "o2", &json!({"barStatus": "pending"}))
			.await
			.unwrap();
		storage
			.update_fields("orders", "o2", fields(json!({"barStatus": "ready"})))
			.await
			.unwrap();
		let doc: Value = storage.retrieve("orders", "o2").await.unwrap();
		assert_eq!(doc["barStatus"], "ready");
	}

	#[tokio::test]
	async fn test_field_write_rejects_non_object_document() {
		let storage = service();
		storage.store("orders", "weird", &json!([1, 2])).await.unwrap();

		let result = storage
			.merge_fields("orders", "weird", fields(json!({"status": "approved"})))
			.await;
		assert!(matches!(result, Err(StorageError::Serialization(_))));
	}

	#[tokio::test]
	async fn test_update_and_remove() {
		let storage = service();
		assert!(matches!(
			storage.update("orders", "o3", &json!({})).await,
			Err(StorageError::NotFound)
		));

		storage.store("orders", "o3", &json!({"a": 1})).await.unwrap();
		storage.update("orders", "o3", &json!({"a": 2})).await.unwrap();
		let doc: Value = storage.retrieve("orders", "o3").await.unwrap();
		assert_eq!(doc, json!({"a": 2}));

		storage.remove("orders", "o3").await.unwrap();
		assert!(!storage.exists("orders", "o3").await.unwrap());
	}

	#[tokio::test]
	async fn test_store_if_absent_claims_once() {
		let storage = service();
		assert!(storage
			.store_if_absent("processed_callbacks", "cb-1", &json!({}), None)
			.await
			.unwrap());
		assert!(!storage
			.store_if_absent("processed_callbacks", "cb-1", &json!({}), None)
			.await
			.unwrap());
		assert!(storage.key_locks.is_empty());
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_concurrent_station_updates_keep_both_fields() {
		let dir = tempfile::tempdir().unwrap();
		let storage = Arc::new(StorageService::new(Box::new(
			implementations::file::FileStorage::new(
				dir.path().to_path_buf(),
				implementations::file::TtlConfig::default(),
			),
		)));

		for round in 0..50 {
			let id = format!("o{}", round);
			storage
				.store("orders", &id, &json!({"status": "approved"}))
				.await
				.unwrap();

			let kitchen = {
				let storage = Arc::clone(&storage);
				let id = id.clone();
				tokio::spawn(async move {
					storage
						.merge_fields("orders", &id, fields(json!({"kitchenStatus": "ready"})))
						.await
				})
			};
			let bar = {
				let storage = Arc::clone(&storage);
				let id = id.clone();
				tokio::spawn(async move {
					storage
						.merge_fields("orders", &id, fields(json!({"barStatus": "delayed"})))
						.await
				})
			};
			kitchen.await.unwrap().unwrap();
			bar.await.unwrap().unwrap();

			let doc: Value = storage.retrieve("orders", &id).await.unwrap();
			assert_eq!(
				doc,
				json!({"status": "approved", "kitchenStatus": "ready", "barStatus": "delayed"})
			);
		}
		assert!(storage.key_locks.is_empty());
	}

	#[test]
	fn test_all_implementations_registered() {
		let names: Vec<_> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["file", "memory"]);
	}
}
