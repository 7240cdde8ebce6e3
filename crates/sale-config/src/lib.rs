//! Configuration module for the sale backend.
//!
//! This module provides structures and utilities for managing the service
//! configuration. It supports loading configuration from TOML files and
//! validates that all required values are properly set before any component
//! is constructed.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the sale backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Ethereum node connection.
	pub node: NodeConfig,
	/// Sale contract parameters.
	pub sale: SaleConfig,
	/// Transaction queue tuning.
	#[serde(default)]
	pub queue: QueueConfig,
	/// Ledger/chart resync tuning.
	#[serde(default)]
	pub chart: ChartConfig,
	/// Persisted queue storage backend.
	pub storage: StorageConfig,
	/// HTTP API server.
	#[serde(default)]
	pub http: HttpConfig,
	/// Static values surfaced on `GET /api/config`.
	#[serde(default)]
	pub site: SiteConfig,
}

/// Ethereum node connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
	/// HTTP RPC endpoint of the node.
	pub http_url: String,
	/// Interval between new-block polls, in seconds.
	#[serde(default = "default_poll_interval_secs")]
	pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
	3
}

/// Sale contract parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaleConfig {
	/// Address of the SecondPriceAuction contract.
	pub contract_address: Address,
	/// Block the contract was mined at; log scans start here.
	pub start_block: u64,
	/// Gas price the frontend should use for contributions, in wei.
	pub gas_price: U256,
}

/// Transaction queue tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
	/// Upper bound on the wait for a submitted transaction's receipt, in
	/// seconds. A timeout rejects the queue entry.
	#[serde(default = "default_receipt_timeout_secs")]
	pub receipt_timeout_secs: u64,
	/// Interval between receipt polls, in seconds.
	#[serde(default = "default_receipt_poll_secs")]
	pub receipt_poll_secs: u64,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			receipt_timeout_secs: default_receipt_timeout_secs(),
			receipt_poll_secs: default_receipt_poll_secs(),
		}
	}
}

fn default_receipt_timeout_secs() -> u64 {
	300
}

fn default_receipt_poll_secs() -> u64 {
	5
}

/// Ledger/chart resync tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChartConfig {
	/// Interval between full log re-fetches, in seconds. Live event
	/// ingestion runs regardless; the cold resync guards against gaps.
	#[serde(default = "default_resync_interval_secs")]
	pub resync_interval_secs: u64,
}

impl Default for ChartConfig {
	fn default() -> Self {
		Self {
			resync_interval_secs: default_resync_interval_secs(),
		}
	}
}

fn default_resync_interval_secs() -> u64 {
	900
}

/// Persisted queue storage backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which backend to use.
	pub backend: StorageBackend,
	/// Directory for the file backend.
	pub path: Option<PathBuf>,
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
	/// In-memory map; queue is lost on restart.
	Memory,
	/// One JSON file per key under `storage.path`.
	File,
}

/// HTTP API server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
	/// Interface to bind.
	#[serde(default = "default_host")]
	pub host: String,
	/// Port to bind.
	#[serde(default = "default_port")]
	pub port: u16,
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
		}
	}
}

fn default_host() -> String {
	"127.0.0.1".to_string()
}

fn default_port() -> u16 {
	4000
}

/// Static values surfaced on `GET /api/config` for the frontend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SiteConfig {
	/// Chain id the frontend should sign for.
	pub chain_id: Option<u64>,
	/// Block explorer base URL.
	pub etherscan: Option<String>,
	/// Public sale website URL.
	pub sale_website: Option<String>,
}

impl Config {
	/// Loads and validates a configuration from a TOML file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path)?;
		let config: Config = toml::from_str(&raw)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates cross-field constraints that serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.node.http_url.starts_with("http://") && !self.node.http_url.starts_with("https://")
		{
			return Err(ConfigError::Validation(
				"node.http_url must start with http:// or https://".to_string(),
			));
		}

		if self.node.poll_interval_secs == 0 {
			return Err(ConfigError::Validation(
				"node.poll_interval_secs must be at least 1".to_string(),
			));
		}

		if self.queue.receipt_timeout_secs < self.queue.receipt_poll_secs {
			return Err(ConfigError::Validation(
				"queue.receipt_timeout_secs must not be below queue.receipt_poll_secs".to_string(),
			));
		}

		if self.storage.backend == StorageBackend::File && self.storage.path.is_none() {
			return Err(ConfigError::Validation(
				"storage.path is required for the file backend".to_string(),
			));
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const EXAMPLE: &str = r#"
[node]
http_url = "http://127.0.0.1:8545/"

[sale]
contract_address = "0x13440c889ccDAdfE9fA1A9325054f23Aa014472A"
start_block = 4305463
gas_price = "0x174876e800"

[storage]
backend = "memory"

[site]
chain_id = 42
etherscan = "https://kovan.etherscan.io"
"#;

	#[test]
	fn parses_example_with_defaults() {
		let config: Config = toml::from_str(EXAMPLE).unwrap();
		config.validate().unwrap();

		assert_eq!(config.node.poll_interval_secs, 3);
		assert_eq!(config.queue.receipt_timeout_secs, 300);
		assert_eq!(config.chart.resync_interval_secs, 900);
		assert_eq!(config.http.port, 4000);
		assert_eq!(config.sale.start_block, 4305463);
		assert_eq!(config.site.chain_id, Some(42));
	}

	#[test]
	fn rejects_file_backend_without_path() {
		let raw = EXAMPLE.replace("backend = \"memory\"", "backend = \"file\"");
		let config: Config = toml::from_str(&raw).unwrap();
		let err = config.validate().unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn rejects_non_http_node_url() {
		let raw = EXAMPLE.replace("http://127.0.0.1:8545/", "ws://127.0.0.1:8546/");
		let config: Config = toml::from_str(&raw).unwrap();
		assert!(config.validate().is_err());
	}

	#[test]
	fn loads_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(EXAMPLE.as_bytes()).unwrap();
		let config = Config::from_file(file.path()).unwrap();
		assert_eq!(config.http.host, "127.0.0.1");
	}
}
