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

mod fill;
mod state;

pub use fill::{AppliedFill, FillOutcome};
pub use state::{AuditReport, BookState};

pub use crate::config::EngineConfig;

use std::sync::{Arc, Mutex, MutexGuard};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
	book::{IndexError, LevelKey, NodeHandle, PriceQueue},
	config::LockScope,
	event::{MatchingEvent, NotificationSink},
	ledger::{LedgerEntry, Tombstone},
	types::{CancelCommand, CancelOutcome, Fill, MatchResult, Order, OrderCommand, Side, now_millis},
};

use fill::{FillContext, fill_equal, fill_greater, fill_less};

/// Error types for matching engine operations
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Invalid order: {0}")]
	InvalidOrder(String),
	#[error("Order already processed: {0}")]
	AlreadyProcessed(String),
	#[error("Identity mismatch for order {order_id}: {reason}")]
	IdentityMismatch { order_id: String, reason: String },
	#[error("Book invariant violated: {0}")]
	InvariantViolation(String),
	#[error("Lock poisoned: {0}")]
	LockPoisoned(String),
}

impl From<IndexError> for EngineError {
	fn from(e: IndexError) -> Self {
		invariant(e.to_string())
	}
}

/// Build an `InvariantViolation`, logging it on the way out
pub(crate) fn invariant(message: String) -> EngineError {
	error!("Book invariant violated: {}", message);
	EngineError::InvariantViolation(message)
}

pub(crate) fn lock_section(section: &Mutex<()>) -> Result<MutexGuard<'_, ()>, EngineError> {
	section
		.lock()
		.map_err(|e| EngineError::LockPoisoned(e.to_string()))
}

type Emit<'a> = dyn FnMut(Vec<MatchingEvent>) + 'a;

/// Matching engine handle
///
/// The engine matches incoming limit orders against the opposite side of
/// the book with price-time priority and maintains the depth book:
/// - Price priority: better levels are consumed first
/// - Time priority: within a level, earlier orders are consumed first
/// - Fills happen at the resting level's price
/// - Arithmetic is exact decimal throughout
///
/// Concurrency:
/// - Handles are cheap to clone and may be used from any number of threads
/// - Each (symbol, price) level is mutated inside its own exclusive section
/// - Events are handed to the notification sink after the section is released
///
/// Emitted events are never rolled back: a failed delivery is retried and
/// then logged, the book keeps the mutation.
#[derive(Clone)]
pub struct MatchingEngine {
	config: EngineConfig,
	state: Arc<BookState>,
	sink: Arc<dyn NotificationSink>,
}

impl MatchingEngine {
	pub fn new(config: EngineConfig, state: Arc<BookState>, sink: Arc<dyn NotificationSink>) -> Self {
		info!(
			"Matching engine ready (lock scope: {:?}, dispatch retries: {})",
			config.lock_scope, config.dispatch_retries
		);
		Self {
			config,
			state,
			sink,
		}
	}

	pub fn state(&self) -> &Arc<BookState> {
		&self.state
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Live resting volume of an order, `None` once it is filled or canceled
	pub fn resting_volume(&self, order_id: &str) -> Option<Decimal> {
		self.state.ledger.volume(order_id)
	}

	/// Top `levels` price levels of one side, best price first
	pub fn depth(&self, symbol: &str, side: Side, levels: usize) -> Vec<(Decimal, Decimal)> {
		self.state.index.depth(symbol, side, levels)
	}

	pub fn best_price(&self, symbol: &str, side: Side) -> Option<Decimal> {
		self.state.index.best_price(symbol, side)
	}

	/// Submit a limit order
	///
	/// Matches the order against every crossable level of the opposite side,
	/// best price first, and rests the remainder. Fails with
	/// `AlreadyProcessed` for an order id that was filled or canceled before,
	/// or that is still resting.
	pub fn submit(&self, cmd: OrderCommand) -> Result<MatchResult, EngineError> {
		Self::validate(&cmd)?;

		if let Some(tombstone) = self.state.dedup.tombstone(&cmd.order_id) {
			warn!(
				"Rejecting order {}: already settled ({:?})",
				cmd.order_id, tombstone
			);
			return Err(EngineError::AlreadyProcessed(format!(
				"order {} was already {:?}",
				cmd.order_id, tombstone
			)));
		}

		if self.config.verbose_logging {
			debug!(
				"Processing order: {} {:?} {} @ {}",
				cmd.order_id, cmd.side, cmd.volume, cmd.price
			);
		}

		match self.config.lock_scope {
			LockScope::Level => self.submit_locked(cmd, &mut |events| self.dispatch(events)),
			LockScope::Symbol => {
				let mut deferred = Vec::new();
				let result = {
					let section = self.state.locks.symbol(&cmd.symbol);
					let _guard = lock_section(&section)?;
					self.submit_locked(cmd, &mut |events| deferred.extend(events))
				};
				self.dispatch(deferred);
				result
			}
		}
	}

	fn submit_locked(&self, cmd: OrderCommand, emit: &mut Emit<'_>) -> Result<MatchResult, EngineError> {
		self.clear_stale_entry(&cmd.order_id)?;

		let mut order: Order = cmd.into();
		let mut fills = Vec::new();
		let levels = self
			.state
			.index
			.crossable_levels(&order.symbol, order.side.opposite(), order.price);

		for price in levels {
			let mut events = Vec::new();
			let symbol = order.symbol.clone();
			let result = self.state.with_level(&symbol, price, || {
				self.consume_level(&mut order, price, &mut events)
			})?;

			fills.extend(events.iter().filter_map(Self::fill_from_event));
			emit(events);
			result?;

			if order.is_filled() {
				break;
			}
		}

		if order.is_filled() {
			self.state.dedup.settle(&order.id, Tombstone::Filled);
			info!("Order {} fully filled in {} fills", order.id, fills.len());
			return Ok(MatchResult {
				order,
				fills,
				fully_filled: true,
				partially_filled: false,
				rested: false,
			});
		}

		let symbol = order.symbol.clone();
		let event = self.state.with_level(&symbol, order.price, || {
			order.node = Some(self.state.insert_resting(&order));
			MatchingEvent::OrderRested {
				seq: self.state.next_sequence(),
				order: order.clone(),
				timestamp: now_millis(),
			}
		})?;
		emit(vec![event]);

		debug!(
			"Order {} rests {} @ {} after {} fills",
			order.id,
			order.volume,
			order.price,
			fills.len()
		);

		let partially_filled = !fills.is_empty();
		Ok(MatchResult {
			order,
			fills,
			fully_filled: false,
			partially_filled,
			rested: true,
		})
	}

	/// Net `order` against the queue at `price` on the opposite side
	///
	/// The caller holds the level section for (`order.symbol`, `price`).
	/// Events for every applied fill are pushed to `events`, including when
	/// a later fill on the level fails. The level is visited at most once per
	/// resting order present when the section was taken.
	pub(crate) fn consume_level(
		&self,
		order: &mut Order,
		price: Decimal,
		events: &mut Vec<MatchingEvent>,
	) -> Result<(), EngineError> {
		let key = LevelKey::new(order.symbol.clone(), order.side.opposite(), price);
		let result = self
			.state
			.queues
			.with_existing(&key, |queue| self.consume_queue(&key, queue, order, events));
		self.state.queues.remove_if_empty(&key);

		match result {
			Some(result) => result,
			// Emptied by another submission since the index was read
			None if self.state.index.aggregate(&key).is_none() => Ok(()),
			None => Err(invariant(format!(
				"{} {:?} @ {} is indexed but has no queue",
				key.symbol, key.side, key.price
			))),
		}
	}

	fn consume_queue(
		&self,
		key: &LevelKey,
		queue: &mut PriceQueue,
		order: &mut Order,
		events: &mut Vec<MatchingEvent>,
	) -> Result<(), EngineError> {
		let ctx = FillContext {
			state: &self.state,
			key,
		};

		for _ in 0..queue.len() {
			let Some((slot, resting_volume)) = queue.front().map(|(slot, node)| (slot, node.volume)) else {
				break;
			};

			let applied = match FillOutcome::classify(order.volume, resting_volume) {
				FillOutcome::Greater => fill_greater(&ctx, queue, slot, order)?,
				FillOutcome::Equal => fill_equal(&ctx, queue, slot, order)?,
				FillOutcome::Less => fill_less(&ctx, queue, slot, order)?,
			};

			if self.config.verbose_logging {
				debug!(
					"Fill {:?}: {} x {} @ {} ({} left on incoming)",
					applied.outcome, order.id, applied.resting_order.id, key.price, order.volume
				);
			}

			events.push(MatchingEvent::MatchOccurred {
				seq: self.state.next_sequence(),
				trade_id: Uuid::new_v4(),
				incoming_order: order.clone(),
				resting_order: applied.resting_order,
				price: key.price,
				trade_quantity: applied.trade_quantity,
				timestamp: now_millis(),
			});

			if order.is_filled() {
				return Ok(());
			}
		}

		if !queue.is_empty() {
			return Err(invariant(format!(
				"{} {:?} @ {} still holds {} orders after a full pass",
				key.symbol,
				key.side,
				key.price,
				queue.len()
			)));
		}

		Ok(())
	}

	/// Cancel a resting order
	///
	/// Returns `CancelOutcome::NotFound` when the order has no ledger entry,
	/// so repeating a cancel is harmless. Fails with `IdentityMismatch` when
	/// the order is still live but the request names a different symbol,
	/// side or node for it.
	pub fn cancel(&self, cmd: CancelCommand) -> Result<CancelOutcome, EngineError> {
		match self.config.lock_scope {
			LockScope::Level => self.cancel_locked(&cmd, &mut |events| self.dispatch(events)),
			LockScope::Symbol => {
				let mut deferred = Vec::new();
				let result = {
					let section = self.state.locks.symbol(&cmd.symbol);
					let _guard = lock_section(&section)?;
					self.cancel_locked(&cmd, &mut |events| deferred.extend(events))
				};
				self.dispatch(deferred);
				result
			}
		}
	}

	fn cancel_locked(&self, cmd: &CancelCommand, emit: &mut Emit<'_>) -> Result<CancelOutcome, EngineError> {
		let node = match cmd
			.node
			.or_else(|| self.state.ledger.get(&cmd.order_id).map(|entry| entry.node))
		{
			Some(node) => node,
			None => {
				debug!("Cancel of {}: no resting node", cmd.order_id);
				return Ok(CancelOutcome::NotFound);
			}
		};

		let key = LevelKey::new(cmd.symbol.clone(), cmd.side, node.price);
		let removed = self
			.state
			.with_level(&cmd.symbol, key.price, || self.cancel_at_level(&key, node, cmd))??;

		match removed {
			Some((order, canceled_quantity, event)) => {
				emit(vec![event]);
				info!("Order {} canceled ({} left unfilled)", order.id, canceled_quantity);
				Ok(CancelOutcome::Canceled {
					order,
					canceled_quantity,
				})
			}
			None => {
				debug!("Cancel of {}: node already gone", cmd.order_id);
				Ok(CancelOutcome::NotFound)
			}
		}
	}

	/// Remove the order named by `cmd` from the queue at `key`
	///
	/// The caller holds the level section for `key`. When the node does not
	/// hold the order, the ledger decides: no entry means the order already
	/// left the book, a live entry means the request names the wrong place.
	fn cancel_at_level(
		&self,
		key: &LevelKey,
		node: NodeHandle,
		cmd: &CancelCommand,
	) -> Result<Option<(Order, Decimal, MatchingEvent)>, EngineError> {
		let removed = self
			.state
			.queues
			.with_existing(key, |queue| self.remove_for_cancel(queue, key, node, cmd));
		self.state.queues.remove_if_empty(key);

		if let Some((order, canceled_quantity)) = removed.transpose()?.flatten() {
			let event = MatchingEvent::OrderCanceled {
				seq: self.state.next_sequence(),
				order: order.clone(),
				canceled_quantity,
				timestamp: now_millis(),
			};
			return Ok(Some((order, canceled_quantity, event)));
		}

		match self.state.ledger.get(&cmd.order_id) {
			None => Ok(None),
			Some(entry) => Err(Self::identity_mismatch(cmd, node, &entry)),
		}
	}

	fn identity_mismatch(cmd: &CancelCommand, node: NodeHandle, entry: &LedgerEntry) -> EngineError {
		let mut differences = Vec::new();
		if entry.symbol != cmd.symbol {
			differences.push(format!("symbol is {}, not {}", entry.symbol, cmd.symbol));
		}
		if entry.side != cmd.side {
			differences.push(format!("side is {:?}, not {:?}", entry.side, cmd.side));
		}
		if entry.node != node {
			differences.push(format!(
				"node is slot {} @ {}, not slot {} @ {}",
				entry.node.slot, entry.node.price, node.slot, node.price
			));
		}

		// The request matches the ledger yet the queue has no such node
		if differences.is_empty() {
			return invariant(format!(
				"ledger entry for order {} points at no live node",
				cmd.order_id
			));
		}

		let reason = differences.join("; ");
		warn!("Cancel of {} does not match the resting order: {}", cmd.order_id, reason);
		EngineError::IdentityMismatch {
			order_id: cmd.order_id.clone(),
			reason,
		}
	}

	fn remove_for_cancel(
		&self,
		queue: &mut PriceQueue,
		key: &LevelKey,
		node: NodeHandle,
		cmd: &CancelCommand,
	) -> Result<Option<(Order, Decimal)>, EngineError> {
		// Vacant, or reused after the order left the book
		let Some(queued) = queue
			.get(node.slot)
			.filter(|queued| queued.is_same_order(&cmd.order_id, &cmd.symbol, cmd.side))
		else {
			return Ok(None);
		};

		let entry = self
			.state
			.ledger
			.get(&cmd.order_id)
			.ok_or_else(|| invariant(format!("resting order {} has no ledger entry", cmd.order_id)))?;
		if entry.volume != queued.volume || entry.node.slot != node.slot {
			return Err(invariant(format!(
				"ledger entry for order {} disagrees with its queue node",
				cmd.order_id
			)));
		}

		let aggregate = self.state.index.aggregate(key).unwrap_or(Decimal::ZERO);
		if aggregate < entry.volume {
			return Err(invariant(format!(
				"index aggregate {} at {} {:?} @ {} is below resting volume {}",
				aggregate, key.symbol, key.side, key.price, entry.volume
			)));
		}

		let mut order = queued.to_order(node.slot);
		order.volume = entry.volume;
		order.node = None;

		queue.remove(node.slot);
		self.state.ledger.remove(&cmd.order_id);
		self.state.index.subtract(key, entry.volume)?;
		self.state.dedup.settle(&cmd.order_id, Tombstone::Canceled);

		Ok(Some((order, entry.volume)))
	}

	/// Drop a ledger entry whose order no longer rests in the book
	///
	/// An entry whose node is still live means the id is in use.
	fn clear_stale_entry(&self, order_id: &str) -> Result<(), EngineError> {
		let Some(entry) = self.state.ledger.get(order_id) else {
			return Ok(());
		};

		self.state.with_level(&entry.symbol, entry.node.price, || {
			let live = self
				.state
				.queues
				.read(&entry.level_key(), |queue| {
					queue
						.get(entry.node.slot)
						.is_some_and(|node| node.order_id == order_id)
				})
				.unwrap_or(false);

			if live {
				warn!("Rejecting order {}: already resting", order_id);
				return Err(EngineError::AlreadyProcessed(format!(
					"order {} is resting in the book",
					order_id
				)));
			}

			if self.state.ledger.remove(order_id).is_some() {
				warn!("Cleared stale ledger entry for order {}", order_id);
			}

			Ok(())
		})?
	}

	fn validate(cmd: &OrderCommand) -> Result<(), EngineError> {
		if cmd.order_id.is_empty() {
			return Err(EngineError::InvalidOrder("empty order id".to_string()));
		}
		if cmd.symbol.is_empty() {
			return Err(EngineError::InvalidOrder(format!(
				"order {} has an empty symbol",
				cmd.order_id
			)));
		}
		if cmd.price <= Decimal::ZERO {
			return Err(EngineError::InvalidOrder(format!(
				"order {} has non-positive price {}",
				cmd.order_id, cmd.price
			)));
		}
		if cmd.volume <= Decimal::ZERO {
			return Err(EngineError::InvalidOrder(format!(
				"order {} has non-positive volume {}",
				cmd.order_id, cmd.volume
			)));
		}
		Ok(())
	}

	fn fill_from_event(event: &MatchingEvent) -> Option<Fill> {
		match event {
			MatchingEvent::MatchOccurred {
				trade_id,
				resting_order,
				price,
				trade_quantity,
				..
			} => Some(Fill {
				trade_id: *trade_id,
				resting_order_id: resting_order.id.clone(),
				price: *price,
				quantity: *trade_quantity,
			}),
			_ => None,
		}
	}

	/// Hand events to the sink, retrying failed deliveries
	fn dispatch(&self, events: Vec<MatchingEvent>) {
		for event in events {
			let mut attempt = 0;
			loop {
				match self.sink.deliver(&event) {
					Ok(()) => break,
					Err(e) if attempt < self.config.dispatch_retries => {
						attempt += 1;
						warn!(
							"Delivery of event {} failed (attempt {}): {}",
							event.sequence(),
							attempt,
							e
						);
						std::thread::yield_now();
					}
					Err(e) => {
						error!(
							"Dropping event {} after {} attempts: {}",
							event.sequence(),
							attempt + 1,
							e
						);
						break;
					}
				}
			}
		}
	}
}
