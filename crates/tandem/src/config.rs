//! Catalog configuration.

use serde::Deserialize;

/// Default number of passes a restoration driver may take before giving up.
pub const DEFAULT_RESTORE_RETRY_LIMIT: usize = 200;

/// Settings fixed when a [`Catalog`](crate::Catalog) is constructed.
///
/// ```toml
/// root_name = "sim"
/// validation = true
/// generate_api = false
/// restore_retry_limit = 200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
	/// Name of the root tandem.
	pub root_name: String,
	/// Whether assertion-only checks run. Defaults on in debug builds.
	pub validation: bool,
	/// API-generation mode: dynamic containers build their archetypes.
	pub generate_api: bool,
	/// Pass limit for [`RetryBudget`](crate::restore::RetryBudget).
	pub restore_retry_limit: usize,
}

impl Default for CatalogConfig {
	fn default() -> Self {
		Self {
			root_name: "sim".to_string(),
			validation: cfg!(debug_assertions),
			generate_api: false,
			restore_retry_limit: DEFAULT_RESTORE_RETRY_LIMIT,
		}
	}
}

impl CatalogConfig {
	/// Parses a configuration from TOML, defaulting absent keys.
	pub fn from_toml_str(src: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(src)
	}

	/// Sets API-generation mode.
	pub fn with_generate_api(mut self, on: bool) -> Self {
		self.generate_api = on;
		self
	}

	/// Sets whether assertion-only checks run.
	pub fn with_validation(mut self, on: bool) -> Self {
		self.validation = on;
		self
	}

	/// Sets the restoration pass limit.
	pub fn with_restore_retry_limit(mut self, limit: usize) -> Self {
		self.restore_retry_limit = limit;
		self
	}
}
