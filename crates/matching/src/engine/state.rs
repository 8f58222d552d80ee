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

use std::{
	collections::HashSet,
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EngineError, invariant, lock_section};
use crate::{
	book::{LevelKey, LevelLocks, NodeHandle, PriceIndex, QueueStore},
	config::MatchingConfig,
	event::SequenceNumber,
	ledger::{DedupGuard, LedgerEntry, VolumeLedger},
	types::{Order, Side},
};

/// Shared book state
///
/// This structure holds everything the matching core mutates:
/// - Price index (aggregate volume per level)
/// - Price queues (resting orders in time priority)
/// - Volume ledger (order id -> resting volume and position)
/// - Dedup guard (tombstones for settled order ids)
/// - Level sections serializing mutation of each (symbol, price)
/// - Sequence counter for events
///
/// Every engine handle works on the same `Arc<BookState>`.
#[derive(Debug)]
pub struct BookState {
	pub index: PriceIndex,
	pub queues: QueueStore,
	pub ledger: VolumeLedger,
	pub dedup: DedupGuard,
	pub locks: LevelLocks,
	/// Next event sequence number to assign
	next_sequence: AtomicU64,
}

/// Summary returned by a successful [`BookState::audit`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
	/// Non-empty price levels
	pub levels: usize,
	/// Resting orders
	pub orders: usize,
	/// Total resting volume over every level
	pub volume: Decimal,
}

impl BookState {
	pub fn new(dedup_capacity: u64, dedup_ttl: Duration) -> Self {
		Self {
			index: PriceIndex::new(),
			queues: QueueStore::new(),
			ledger: VolumeLedger::new(),
			dedup: DedupGuard::new(dedup_capacity, dedup_ttl),
			locks: LevelLocks::new(),
			next_sequence: AtomicU64::new(1),
		}
	}

	pub fn from_config(config: &MatchingConfig) -> Self {
		Self::new(config.dedup_capacity, config.dedup_ttl())
	}

	pub(crate) fn next_sequence(&self) -> SequenceNumber {
		self.next_sequence.fetch_add(1, Ordering::Relaxed)
	}

	/// Last sequence number handed out, 0 if none
	pub fn last_sequence(&self) -> SequenceNumber {
		self.next_sequence.load(Ordering::Relaxed) - 1
	}

	/// Number of resting orders
	pub fn order_count(&self) -> usize {
		self.ledger.len()
	}

	/// Append `order` to the tail of its price queue
	///
	/// Adds the volume to the level aggregate and records the order in the
	/// ledger. The caller must hold the level section for the order's price.
	pub(crate) fn insert_resting(&self, order: &Order) -> NodeHandle {
		let key = LevelKey::new(order.symbol.clone(), order.side, order.price);
		let slot = self.queues.with_queue(&key, |queue| queue.push_back(order));
		let node = NodeHandle {
			price: key.price,
			slot,
		};

		self.index.add(&key, order.volume);
		self.ledger.insert(
			&order.id,
			LedgerEntry {
				symbol: order.symbol.clone(),
				side: order.side,
				volume: order.volume,
				node,
			},
		);

		node
	}

	/// Run `f` inside the level section for (`symbol`, `price`)
	///
	/// Once released, the section leaves the registry if no other thread
	/// holds it and neither side has a queue at that price.
	pub(crate) fn with_level<R>(
		&self,
		symbol: &str,
		price: Decimal,
		f: impl FnOnce() -> R,
	) -> Result<R, EngineError> {
		let section = self.locks.level(symbol, price);
		let result = {
			let _guard = lock_section(&section)?;
			f()
		};
		self.locks
			.release(symbol, price, section, || self.level_is_vacant(symbol, price));
		Ok(result)
	}

	fn level_is_vacant(&self, symbol: &str, price: Decimal) -> bool {
		[Side::Buy, Side::Sell]
			.into_iter()
			.all(|side| !self.queues.contains(&LevelKey::new(symbol, side, price)))
	}

	/// Cross-check the index, the queues and the ledger
	///
	/// Each level is checked inside its own section, so the audit can run
	/// while orders are being processed. Checks:
	/// - the index aggregate of a level equals the sum of its queue
	/// - no resting node has a non-positive volume
	/// - every resting node has a ledger entry with the same volume and handle
	/// - every ledger entry points at a live node
	pub fn audit(&self) -> Result<AuditReport, EngineError> {
		let mut keys: HashSet<LevelKey> = self.queues.keys().into_iter().collect();
		for (symbol, side) in self.index.books() {
			for (price, _) in self.index.depth(&symbol, side, usize::MAX) {
				keys.insert(LevelKey::new(symbol.clone(), side, price));
			}
		}

		let mut report = AuditReport::default();
		let mut seen = HashSet::new();

		for key in keys {
			self.with_level(&key.symbol, key.price, || {
				self.audit_level(&key, &mut report, &mut seen)
			})??;
		}

		// Entries added after their level was scanned are re-checked under
		// their own section.
		for (order_id, _) in self.ledger.snapshot() {
			if seen.contains(&order_id) {
				continue;
			}
			self.verify_entry(&order_id)?;
		}

		Ok(report)
	}

	fn audit_level(
		&self,
		key: &LevelKey,
		report: &mut AuditReport,
		seen: &mut HashSet<String>,
	) -> Result<(), EngineError> {
		let nodes: Vec<(usize, String, Decimal)> = self
			.queues
			.read(key, |queue| {
				queue
					.iter()
					.map(|(slot, node)| (slot, node.order_id.clone(), node.volume))
					.collect()
			})
			.unwrap_or_default();

		let queue_total: Decimal = nodes.iter().map(|(_, _, volume)| *volume).sum();
		let aggregate = self.index.aggregate(key).unwrap_or(Decimal::ZERO);
		if aggregate != queue_total {
			return Err(invariant(format!(
				"{} {:?} @ {}: index aggregate {} != queue total {}",
				key.symbol, key.side, key.price, aggregate, queue_total
			)));
		}

		for (slot, order_id, volume) in &nodes {
			if *volume <= Decimal::ZERO {
				return Err(invariant(format!(
					"order {} rests with non-positive volume {}",
					order_id, volume
				)));
			}

			let entry = self
				.ledger
				.get(order_id)
				.ok_or_else(|| invariant(format!("resting order {} has no ledger entry", order_id)))?;
			let expected = NodeHandle {
				price: key.price,
				slot: *slot,
			};
			if entry.volume != *volume || entry.node != expected || entry.level_key() != *key {
				return Err(invariant(format!(
					"ledger entry for order {} does not match its queue node",
					order_id
				)));
			}

			seen.insert(order_id.clone());
		}

		if !nodes.is_empty() {
			report.levels += 1;
			report.orders += nodes.len();
			report.volume += queue_total;
		}
		Ok(())
	}

	fn verify_entry(&self, order_id: &str) -> Result<(), EngineError> {
		let Some(entry) = self.ledger.get(order_id) else {
			return Ok(());
		};

		let live = self.with_level(&entry.symbol, entry.node.price, || {
			// Re-read: the order may have been filled before the section was taken
			self.ledger.get(order_id).map(|entry| {
				self.queues
					.read(&entry.level_key(), |queue| {
						queue
							.get(entry.node.slot)
							.is_some_and(|node| node.order_id == order_id && node.volume == entry.volume)
					})
					.unwrap_or(false)
			})
		})?;

		match live {
			None | Some(true) => Ok(()),
			Some(false) => Err(invariant(format!(
				"ledger entry for order {} points at no live node",
				order_id
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn create_test_order(id: &str, side: Side, price: Decimal, volume: Decimal) -> Order {
		Order {
			id: id.to_string(),
			symbol: "BTC-USDT".to_string(),
			side,
			price,
			volume,
			node: None,
			timestamp: 1000,
		}
	}

	#[test]
	fn test_sequence_starts_at_one() {
		let state = BookState::from_config(&MatchingConfig::default());
		assert_eq!(state.last_sequence(), 0);
		assert_eq!(state.next_sequence(), 1);
		assert_eq!(state.next_sequence(), 2);
		assert_eq!(state.last_sequence(), 2);
	}

	#[test]
	fn test_insert_resting_updates_all_structures() {
		let state = BookState::from_config(&MatchingConfig::default());
		let node = state.insert_resting(&create_test_order("sell_1", Side::Sell, dec!(100.0), dec!(2)));
		state.insert_resting(&create_test_order("sell_2", Side::Sell, dec!(100), dec!(3)));

		let key = LevelKey::new("BTC-USDT", Side::Sell, dec!(100));
		assert_eq!(node.price, dec!(100));
		assert_eq!(state.index.aggregate(&key), Some(dec!(5)));
		assert_eq!(state.ledger.get("sell_1").map(|entry| entry.node), Some(node));
		assert_eq!(state.order_count(), 2);

		let report = state.audit().unwrap();
		assert_eq!(report.levels, 1);
		assert_eq!(report.orders, 2);
		assert_eq!(report.volume, dec!(5));
	}

	#[test]
	fn test_audit_detects_aggregate_drift() {
		let state = BookState::from_config(&MatchingConfig::default());
		state.insert_resting(&create_test_order("buy_1", Side::Buy, dec!(99), dec!(1)));
		state
			.index
			.add(&LevelKey::new("BTC-USDT", Side::Buy, dec!(99)), dec!(0.5));

		assert!(matches!(state.audit(), Err(EngineError::InvariantViolation(_))));
	}

	#[test]
	fn test_audit_detects_orphaned_ledger_entry() {
		let state = BookState::from_config(&MatchingConfig::default());
		let node = state.insert_resting(&create_test_order("buy_1", Side::Buy, dec!(99), dec!(1)));
		state.ledger.insert(
			"ghost",
			LedgerEntry {
				symbol: "BTC-USDT".to_string(),
				side: Side::Buy,
				volume: dec!(1),
				node: NodeHandle {
					price: node.price,
					slot: node.slot + 10,
				},
			},
		);

		assert!(matches!(state.audit(), Err(EngineError::InvariantViolation(_))));
	}
}
