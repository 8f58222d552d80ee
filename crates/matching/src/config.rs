// Copyright 2025 chenjjiaa
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "matching";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

// Engine configuration constants
/// Default number of tombstones kept by the dedup guard
pub const DEFAULT_DEDUP_CAPACITY: u64 = 1_000_000;

/// Default tombstone lifetime in seconds
pub const DEFAULT_DEDUP_TTL_SECS: u64 = 24 * 60 * 60;

/// Default capacity of the event buffer used by the binary
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 65_536;

/// Default number of redelivery attempts after a failed notification
pub const DEFAULT_DISPATCH_RETRIES: u32 = 3;

/// Granularity of the exclusive sections taken while matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockScope {
	/// One section per (symbol, price), taken per level touched
	///
	/// Opposite orders racing at different prices may both rest and leave
	/// the book briefly crossed; use `Symbol` when that is not acceptable.
	#[default]
	Level,
	/// A per-symbol section held for the whole operation, in addition to
	/// the level sections
	Symbol,
}

/// Matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
	pub lock_scope: LockScope,
	/// Maximum number of tombstones kept by the dedup guard
	pub dedup_capacity: u64,
	/// Lifetime of a tombstone in seconds
	pub dedup_ttl_secs: u64,
	/// Capacity of the event buffer between engine and consumer
	pub event_buffer_size: usize,
	/// Redelivery attempts after a failed notification
	pub dispatch_retries: u32,
	/// Log every fill at debug level
	pub verbose_logging: bool,
}

impl Default for MatchingConfig {
	fn default() -> Self {
		Self {
			lock_scope: LockScope::Level,
			dedup_capacity: DEFAULT_DEDUP_CAPACITY,
			dedup_ttl_secs: DEFAULT_DEDUP_TTL_SECS,
			event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
			dispatch_retries: DEFAULT_DISPATCH_RETRIES,
			verbose_logging: false,
		}
	}
}

impl MatchingConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("MATCHING"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("MATCHING"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Lifetime of a dedup tombstone
	pub fn dedup_ttl(&self) -> Duration {
		Duration::from_secs(self.dedup_ttl_secs)
	}

	/// Engine settings derived from this configuration
	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			lock_scope: self.lock_scope,
			dispatch_retries: self.dispatch_retries,
			verbose_logging: self.verbose_logging,
		}
	}
}

/// Configuration for one matching engine handle
#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub lock_scope: LockScope,
	pub dispatch_retries: u32,
	pub verbose_logging: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		MatchingConfig::default().engine_config()
	}
}
