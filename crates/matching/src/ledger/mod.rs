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

mod dedup;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::book::{LevelKey, NodeHandle};
use crate::types::Side;

pub use dedup::{DedupGuard, Tombstone};

/// Last known resting state of one order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
	pub symbol: String,
	pub side: Side,
	pub volume: Decimal,
	pub node: NodeHandle,
}

impl LedgerEntry {
	/// Key of the queue the order rests in
	pub fn level_key(&self) -> LevelKey {
		LevelKey::new(self.symbol.clone(), self.side, self.node.price)
	}
}

/// Volume ledger: order id -> last known resting volume
///
/// The ledger is the authoritative answer to "how much of this order is
/// still live". An entry exists exactly while the order has a node in a
/// price queue; both are updated inside the same level section.
///
/// Reads return owned copies so no map shard stays locked while the caller
/// goes on to take a level section.
#[derive(Debug, Default)]
pub struct VolumeLedger {
	entries: DashMap<String, LedgerEntry>,
}

impl VolumeLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record a resting order, returning any previous entry for the id
	pub fn insert(&self, order_id: &str, entry: LedgerEntry) -> Option<LedgerEntry> {
		self.entries.insert(order_id.to_string(), entry)
	}

	pub fn get(&self, order_id: &str) -> Option<LedgerEntry> {
		self.entries.get(order_id).map(|entry| entry.clone())
	}

	/// Resting volume of an order
	pub fn volume(&self, order_id: &str) -> Option<Decimal> {
		self.entries.get(order_id).map(|entry| entry.volume)
	}

	/// Overwrite the resting volume after a partial fill
	pub fn set_volume(&self, order_id: &str, volume: Decimal) -> bool {
		match self.entries.get_mut(order_id) {
			Some(mut entry) => {
				entry.volume = volume;
				true
			}
			None => false,
		}
	}

	pub fn remove(&self, order_id: &str) -> Option<LedgerEntry> {
		self.entries.remove(order_id).map(|(_, entry)| entry)
	}

	pub fn contains(&self, order_id: &str) -> bool {
		self.entries.contains_key(order_id)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Owned copy of every entry
	pub fn snapshot(&self) -> Vec<(String, LedgerEntry)> {
		self.entries
			.iter()
			.map(|entry| (entry.key().clone(), entry.value().clone()))
			.collect()
	}
}
