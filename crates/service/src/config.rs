//! Service configuration.
//!
//! Loaded from TOML; every field has a default, so an empty document is valid:
//!
//! ```toml
//! seed = ["Sample Item 1", "Sample Item 2", "Sample Item 3"]
//! processed-prefix = "Processed: "
//! processing-delay-ms = 2000
//!
//! [ticker]
//! interval-ms = 5000
//!
//! [foreground]
//! interval-ms = 3000
//! max-ticks = 10
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("invalid config TOML: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("invalid config value: {0}")]
	Invalid(String),
}

/// Worker service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServiceConfig {
	/// Records the store starts with.
	pub seed: Vec<String>,
	/// Prepended to every record by the processing job.
	pub processed_prefix: String,
	/// Simulated work time before a processing job produces its result.
	pub processing_delay_ms: u64,
	/// Background ticker: runs until stopped.
	pub ticker: TickerConfig,
	/// Foreground ticker: stops itself after a fixed number of ticks.
	#[serde(deserialize_with = "foreground_table")]
	pub foreground: TickerConfig,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		Self {
			seed: vec!["Sample Item 1".into(), "Sample Item 2".into(), "Sample Item 3".into()],
			processed_prefix: "Processed: ".into(),
			processing_delay_ms: 0,
			ticker: TickerConfig::default(),
			foreground: TickerConfig::foreground(),
		}
	}
}

/// Periodic ticker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct TickerConfig {
	pub interval_ms: u64,
	/// Stop automatically after this many ticks.
	pub max_ticks: Option<u32>,
}

impl Default for TickerConfig {
	fn default() -> Self {
		Self {
			interval_ms: 5000,
			max_ticks: None,
		}
	}
}

impl TickerConfig {
	/// Defaults of the `[foreground]` table.
	pub fn foreground() -> Self {
		Self {
			interval_ms: 3000,
			max_ticks: Some(10),
		}
	}

	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}

	fn validate(&self, table: &str) -> Result<(), ConfigError> {
		if self.interval_ms == 0 {
			return Err(ConfigError::Invalid(format!("{table}.interval-ms must be > 0")));
		}
		if self.max_ticks == Some(0) {
			return Err(ConfigError::Invalid(format!("{table}.max-ticks must be > 0 when set")));
		}
		Ok(())
	}
}

/// Reads a `[foreground]` table; omitted keys keep the foreground defaults.
fn foreground_table<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TickerConfig, D::Error> {
	#[derive(Deserialize)]
	#[serde(rename_all = "kebab-case", deny_unknown_fields)]
	struct Table {
		interval_ms: Option<u64>,
		max_ticks: Option<u32>,
	}

	let table = Table::deserialize(deserializer)?;
	let base = TickerConfig::foreground();
	Ok(TickerConfig {
		interval_ms: table.interval_ms.unwrap_or(base.interval_ms),
		max_ticks: table.max_ticks.or(base.max_ticks),
	})
}

impl ServiceConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses the file at `path`.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&input)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.ticker.validate("ticker")?;
		self.foreground.validate("foreground")
	}

	pub fn processing_delay(&self) -> Duration {
		Duration::from_millis(self.processing_delay_ms)
	}
}
