//! Runtime configuration
//!
//! ```ignore
//! use reinhardt_reactive::{ReactiveConfig, runtime::configure};
//!
//! let config = ReactiveConfig::from_toml_str(r#"
//!     diagnostics = true
//!     max_update_count = 50
//! "#)?;
//! configure(config);
//! ```

extern crate alloc;
use alloc::string::ToString;

use serde::{Deserialize, Serialize};

use crate::error::ReactiveError;
use crate::scheduler::MAX_UPDATE_COUNT;

/// Settings for the observer system on one thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveConfig {
	/// Emit misuse warnings, run custom setter hooks, and guard against
	/// circular updates. Defaults to on in debug builds.
	pub diagnostics: bool,
	/// One-shot server rendering: `observe` wraps nothing
	pub server_rendering: bool,
	/// Re-queue budget per subscriber per flush before the flush is aborted
	pub max_update_count: usize,
	/// Deliver the "flush" signal to the installed flush listener
	pub devtools: bool,
}

impl Default for ReactiveConfig {
	fn default() -> Self {
		Self {
			diagnostics: cfg!(debug_assertions),
			server_rendering: false,
			max_update_count: MAX_UPDATE_COUNT,
			devtools: false,
		}
	}
}

impl ReactiveConfig {
	/// Parse a configuration from TOML. Missing keys take their defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, ReactiveError> {
		toml::from_str(source).map_err(|e| ReactiveError::InvalidConfig(e.to_string()))
	}

	pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
		self.diagnostics = diagnostics;
		self
	}

	pub fn with_server_rendering(mut self, server_rendering: bool) -> Self {
		self.server_rendering = server_rendering;
		self
	}

	pub fn with_max_update_count(mut self, max_update_count: usize) -> Self {
		self.max_update_count = max_update_count;
		self
	}

	pub fn with_devtools(mut self, devtools: bool) -> Self {
		self.devtools = devtools;
		self
	}
}
