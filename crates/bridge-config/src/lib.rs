//! Configuration module for the callback bridge.
//!
//! Configuration is read from TOML files. String values may reference
//! environment variables as `${VAR}` or `${VAR:-default}`, which keeps the bot
//! token and webhook secret out of the file itself.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

pub mod builders;
mod loader;

pub use builders::config::ConfigBuilder;

use bridge_types::SecretString;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only; the default rendering dumps the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub bridge: BridgeConfig,
	pub storage: StorageConfig,
	pub delivery: DeliveryConfig,
	/// Only needed by the `set-webhook` command and for secret-token checks.
	#[serde(default)]
	pub webhook: Option<WebhookConfig>,
	#[serde(default)]
	pub dispatcher: DispatcherConfig,
	#[serde(default)]
	pub api: ApiConfig,
}

/// Identity of this bridge instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
	/// Reported by the health endpoint and attached to startup logs.
	pub id: String,
}

/// Configuration for the record store backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for purging expired entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	300
}

/// Configuration for the chat platform client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of delivery implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Webhook registration and inbound authentication.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
	/// Public HTTPS URL the platform should post updates to.
	pub url: String,
	#[serde(default = "default_allowed_updates")]
	pub allowed_updates: Vec<String>,
	/// Echoed back by the platform in `X-Telegram-Bot-Api-Secret-Token`.
	#[serde(default)]
	pub secret_token: Option<SecretString>,
}

fn default_allowed_updates() -> Vec<String> {
	vec!["callback_query".to_string(), "message".to_string()]
}

/// How record writes treat documents that do not exist yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
	/// Create the document if absent, otherwise write only the given fields.
	#[default]
	Merge,
	/// Fail with not-found when the document is absent.
	Update,
}

/// What the dispatcher does when a record write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorMode {
	/// Answer the tap with an error alert and still return 200.
	#[default]
	Acknowledge,
	/// Abort the request and return 500 so the platform redelivers.
	Propagate,
}

/// Behaviour of the callback dispatcher.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
	#[serde(default)]
	pub write_mode: WriteMode,
	#[serde(default)]
	pub on_store_error: StoreErrorMode,
	/// Record who tapped approve/reject and when.
	#[serde(default = "default_record_actor")]
	pub record_actor: bool,
	/// Window in which a redelivered callback id is skipped. 0 disables.
	#[serde(default = "default_dedup_ttl_seconds")]
	pub dedup_ttl_seconds: u64,
	/// Parse mode for confirmation messages; empty sends plain text.
	#[serde(default = "default_parse_mode")]
	pub parse_mode: String,
}

impl DispatcherConfig {
	pub fn parse_mode(&self) -> Option<&str> {
		Some(self.parse_mode.as_str()).filter(|mode| !mode.is_empty())
	}
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			write_mode: WriteMode::default(),
			on_store_error: StoreErrorMode::default(),
			record_actor: default_record_actor(),
			dedup_ttl_seconds: default_dedup_ttl_seconds(),
			parse_mode: default_parse_mode(),
		}
	}
}

fn default_record_actor() -> bool {
	true
}

fn default_dedup_ttl_seconds() -> u64 {
	600
}

fn default_parse_mode() -> String {
	"HTML".to_string()
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Path the platform posts updates to.
	#[serde(default = "default_webhook_path")]
	pub webhook_path: String,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_api_host(),
			port: default_api_port(),
			webhook_path: default_webhook_path(),
			max_request_size: default_max_request_size(),
		}
	}
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_webhook_path() -> String {
	"/api/telegram-webhook".to_string()
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Paths served by the bridge itself that the webhook path must not shadow.
const RESERVED_PATHS: [&str; 3] = ["/health", "/api/orders", "/api/payments"];

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable and
/// `${VAR_NAME:-default}` with the default when the variable is unset.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		resolved.push_str(&input[last_end..full_match.start()]);
		resolved.push_str(&value);
		last_end = full_match.end();
	}
	resolved.push_str(&input[last_end..]);

	Ok(resolved)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Checks cross-field constraints serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.bridge.id.is_empty() {
			return Err(ConfigError::Validation("Bridge ID cannot be empty".into()));
		}

		// Storage
		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Delivery
		if self.delivery.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one delivery implementation required".into(),
			));
		}
		if !self
			.delivery
			.implementations
			.contains_key(&self.delivery.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary delivery '{}' not found in implementations",
				self.delivery.primary
			)));
		}

		if let Some(webhook) = &self.webhook {
			self.validate_webhook(webhook)?;
		}

		// Dispatcher
		if self.dispatcher.dedup_ttl_seconds > 7 * 86400 {
			return Err(ConfigError::Validation(
				"Dispatcher dedup_ttl_seconds cannot exceed 604800 (7 days)".into(),
			));
		}

		// API
		let path = &self.api.webhook_path;
		if !path.starts_with('/') || path.len() < 2 {
			return Err(ConfigError::Validation(format!(
				"API webhook_path '{}' must be an absolute path",
				path
			)));
		}
		if RESERVED_PATHS
			.iter()
			.any(|reserved| path == reserved || path.starts_with(&format!("{}/", reserved)))
		{
			return Err(ConfigError::Validation(format!(
				"API webhook_path '{}' collides with a built-in route",
				path
			)));
		}
		if self.api.max_request_size == 0 {
			return Err(ConfigError::Validation(
				"API max_request_size must be greater than 0".into(),
			));
		}

		Ok(())
	}

	fn validate_webhook(&self, webhook: &WebhookConfig) -> Result<(), ConfigError> {
		if !webhook.url.starts_with("https://") {
			return Err(ConfigError::Validation(format!(
				"Webhook url '{}' must use https",
				webhook.url
			)));
		}
		if webhook.allowed_updates.is_empty() {
			return Err(ConfigError::Validation(
				"Webhook allowed_updates cannot be empty".into(),
			));
		}
		if !webhook
			.allowed_updates
			.iter()
			.any(|kind| kind == "callback_query")
		{
			return Err(ConfigError::Validation(
				"Webhook allowed_updates must include 'callback_query'".into(),
			));
		}
		if let Some(token) = &webhook.secret_token {
			// Platform limit: 1-256 characters from A-Z, a-z, 0-9, '_' and '-'
			let re = Regex::new(r"^[A-Za-z0-9_-]{1,256}$")
				.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;
			if !re.is_match(token.expose_secret()) {
				return Err(ConfigError::Validation(
					"Webhook secret_token must be 1-256 characters of A-Z, a-z, 0-9, _ or -"
						.into(),
				));
			}
		}
		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
