// Copyright 2025 itscheems
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

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

/// Terminal state recorded for an order id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tombstone {
	Filled,
	Canceled,
}

/// Dedup guard for orders that reached a terminal state
///
/// A submission whose id carries a tombstone is a replay and is rejected.
/// Tombstones live in a bounded `moka` cache:
/// - **Bounded memory**: at most `max_capacity` ids are remembered
/// - **TTL**: tombstones expire after `ttl`
///
/// The guard is therefore a replay window, not a permanent record of every
/// id ever seen.
pub struct DedupGuard {
	cache: Cache<String, Tombstone>,
}

impl DedupGuard {
	pub fn new(max_capacity: u64, ttl: Duration) -> Self {
		let cache = Cache::builder()
			.max_capacity(max_capacity)
			.time_to_live(ttl)
			.build();

		Self { cache }
	}

	/// Tombstone recorded for `order_id`, if any
	pub fn tombstone(&self, order_id: &str) -> Option<Tombstone> {
		self.cache.get(order_id)
	}

	pub fn is_settled(&self, order_id: &str) -> bool {
		self.cache.contains_key(order_id)
	}

	/// Mark `order_id` as terminally handled
	pub fn settle(&self, order_id: &str, tombstone: Tombstone) {
		self.cache.insert(order_id.to_string(), tombstone);
	}

	pub fn clear(&self, order_id: &str) {
		self.cache.invalidate(order_id);
	}

	/// Number of remembered tombstones
	pub fn entry_count(&self) -> u64 {
		self.cache.run_pending_tasks();
		self.cache.entry_count()
	}
}

impl std::fmt::Debug for DedupGuard {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DedupGuard")
			.field("entries", &self.cache.entry_count())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn guard() -> DedupGuard {
		DedupGuard::new(1_000, Duration::from_secs(60))
	}

	#[test]
	fn test_settle_and_lookup() {
		let guard = guard();
		assert!(!guard.is_settled("order_1"));

		guard.settle("order_1", Tombstone::Canceled);
		assert!(guard.is_settled("order_1"));
		assert_eq!(guard.tombstone("order_1"), Some(Tombstone::Canceled));
		assert_eq!(guard.tombstone("order_2"), None);
	}

	#[test]
	fn test_settle_overwrites_and_clear() {
		let guard = guard();
		guard.settle("order_1", Tombstone::Filled);
		guard.settle("order_1", Tombstone::Canceled);
		assert_eq!(guard.tombstone("order_1"), Some(Tombstone::Canceled));
		assert_eq!(guard.entry_count(), 1);

		guard.clear("order_1");
		assert!(!guard.is_settled("order_1"));
	}

	#[test]
	fn test_tombstones_expire() {
		let guard = DedupGuard::new(1_000, Duration::from_millis(20));
		guard.settle("order_1", Tombstone::Filled);

		std::thread::sleep(Duration::from_millis(60));
		assert!(!guard.is_settled("order_1"));
	}
}
