//! Main entry point for the callback bridge service.
//!
//! Serves the chat platform webhook that turns order, payment and station
//! buttons into record updates, and offers a one-shot command to register
//! that webhook with the platform.

use bridge_config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the bridge service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
	/// Serve the webhook (default)
	Serve,
	/// Register the configured webhook URL with the chat platform and exit
	SetWebhook,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.bridge.id);

	let bridge = Arc::new(factory_registry::build_bridge_from_config(config)?);

	match args.command.unwrap_or(Command::Serve) {
		Command::SetWebhook => {
			bridge.register_webhook().await?;
			tracing::info!("Webhook registered");
		},
		Command::Serve => {
			bridge.initialize().await?;
			tracing::info!("Started bridge");

			tokio::select! {
				result = bridge.run() => {
					tracing::info!("Bridge engine finished");
					result?;
				}
				result = server::start_server(Arc::clone(&bridge)) => {
					tracing::info!("API server finished");
					result?;
				}
			}

			tracing::info!("Stopped bridge");
		},
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["bridge"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		assert_eq!(args.command, None);
	}

	#[test]
	fn test_args_set_webhook() {
		let args = Args::parse_from(["bridge", "-c", "prod.toml", "-l", "debug", "set-webhook"]);
		assert_eq!(args.config, PathBuf::from("prod.toml"));
		assert_eq!(args.log_level, "debug");
		assert_eq!(args.command, Some(Command::SetWebhook));
	}

	#[test]
	fn test_sample_config_requires_webhook_secret() {
		let sample = include_str!("../../../config.toml");
		let secret = sample
			.lines()
			.find(|line| line.starts_with("secret_token"))
			.unwrap();
		assert_eq!(secret, r#"secret_token = "${WEBHOOK_SECRET_TOKEN}""#);
	}
}
