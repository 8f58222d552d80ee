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

//! Fill policies
//!
//! Netting an incoming order against the resting order at the front of a
//! queue has three outcomes, decided by an exact decimal comparison of the
//! two volumes. Each outcome has its own policy function. All of them
//! validate the book before mutating it, so a failed fill leaves the queue,
//! the index and the ledger untouched.
//!
//! Callers must hold the level section of the resting queue.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::{BookState, EngineError, invariant};
use crate::book::{LevelKey, NodeHandle, PriceQueue, QueueNode};
use crate::ledger::Tombstone;
use crate::types::Order;

/// Comparison of the incoming volume against the resting volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
	/// Incoming is larger: the resting order is consumed, matching continues
	Greater,
	/// Volumes are equal: both orders are fully filled
	Equal,
	/// Incoming is smaller: the resting order shrinks and keeps its place
	Less,
}

impl FillOutcome {
	pub fn classify(incoming: Decimal, resting: Decimal) -> Self {
		match incoming.cmp(&resting) {
			Ordering::Greater => FillOutcome::Greater,
			Ordering::Equal => FillOutcome::Equal,
			Ordering::Less => FillOutcome::Less,
		}
	}

	/// Quantity traded by a fill with this outcome
	pub fn trade_quantity(self, incoming: Decimal, resting: Decimal) -> Decimal {
		match self {
			FillOutcome::Greater | FillOutcome::Equal => resting,
			FillOutcome::Less => incoming,
		}
	}
}

/// Result of applying one fill
#[derive(Debug, Clone)]
pub struct AppliedFill {
	pub outcome: FillOutcome,
	pub trade_quantity: Decimal,
	/// Resting order as it stands after the fill
	pub resting_order: Order,
}

/// The level a fill happens on
pub(crate) struct FillContext<'a> {
	pub state: &'a BookState,
	pub key: &'a LevelKey,
}

/// Incoming volume exceeds the resting volume: consume the resting order
pub(crate) fn fill_greater(
	ctx: &FillContext<'_>,
	queue: &mut PriceQueue,
	slot: usize,
	incoming: &mut Order,
) -> Result<AppliedFill, EngineError> {
	let (node, trade_quantity) = remove_resting(ctx, queue, slot)?;
	incoming.volume -= trade_quantity;

	Ok(AppliedFill {
		outcome: FillOutcome::Greater,
		trade_quantity,
		resting_order: filled_order(&node, slot),
	})
}

/// Volumes are equal: consume the resting order and finish the incoming one
pub(crate) fn fill_equal(
	ctx: &FillContext<'_>,
	queue: &mut PriceQueue,
	slot: usize,
	incoming: &mut Order,
) -> Result<AppliedFill, EngineError> {
	let (node, trade_quantity) = remove_resting(ctx, queue, slot)?;
	incoming.volume = Decimal::ZERO;

	Ok(AppliedFill {
		outcome: FillOutcome::Equal,
		trade_quantity,
		resting_order: filled_order(&node, slot),
	})
}

/// Incoming volume is below the resting volume: shrink the resting order in
/// place and finish the incoming one
pub(crate) fn fill_less(
	ctx: &FillContext<'_>,
	queue: &mut PriceQueue,
	slot: usize,
	incoming: &mut Order,
) -> Result<AppliedFill, EngineError> {
	let node = front_node(queue, slot)?;
	let trade_quantity = incoming.volume;
	validate(ctx, &node, slot, trade_quantity)?;

	let remaining = node.volume - trade_quantity;
	queue.set_volume(slot, remaining);
	ctx.state.ledger.set_volume(&node.order_id, remaining);
	ctx.state.index.subtract(ctx.key, trade_quantity)?;
	incoming.volume = Decimal::ZERO;

	let mut resting_order = node.to_order(slot);
	resting_order.volume = remaining;

	Ok(AppliedFill {
		outcome: FillOutcome::Less,
		trade_quantity,
		resting_order,
	})
}

/// Remove the resting node at `slot` from queue, ledger and index
fn remove_resting(
	ctx: &FillContext<'_>,
	queue: &mut PriceQueue,
	slot: usize,
) -> Result<(QueueNode, Decimal), EngineError> {
	let node = front_node(queue, slot)?;
	validate(ctx, &node, slot, node.volume)?;

	queue.remove(slot);
	ctx.state.ledger.remove(&node.order_id);
	ctx.state.index.subtract(ctx.key, node.volume)?;
	ctx.state.dedup.settle(&node.order_id, Tombstone::Filled);

	let volume = node.volume;
	Ok((node, volume))
}

fn front_node(queue: &PriceQueue, slot: usize) -> Result<QueueNode, EngineError> {
	queue
		.get(slot)
		.cloned()
		.ok_or_else(|| invariant(format!("no queue node at slot {}", slot)))
}

/// Check that the ledger and the index agree with the node before a fill
fn validate(
	ctx: &FillContext<'_>,
	node: &QueueNode,
	slot: usize,
	trade_quantity: Decimal,
) -> Result<(), EngineError> {
	if node.volume <= Decimal::ZERO {
		return Err(invariant(format!(
			"order {} rests with non-positive volume {}",
			node.order_id, node.volume
		)));
	}

	let entry = ctx
		.state
		.ledger
		.get(&node.order_id)
		.ok_or_else(|| invariant(format!("order {} has no ledger entry", node.order_id)))?;
	let expected_node = NodeHandle {
		price: ctx.key.price,
		slot,
	};
	if entry.volume != node.volume || entry.node != expected_node {
		return Err(invariant(format!(
			"ledger entry for order {} ({} at slot {}) disagrees with queue ({} at slot {})",
			node.order_id, entry.volume, entry.node.slot, node.volume, slot
		)));
	}

	let aggregate = ctx.state.index.aggregate(ctx.key).unwrap_or(Decimal::ZERO);
	if aggregate < trade_quantity {
		return Err(invariant(format!(
			"index aggregate {} at {} {:?} @ {} is below fill quantity {}",
			aggregate, ctx.key.symbol, ctx.key.side, ctx.key.price, trade_quantity
		)));
	}

	Ok(())
}

fn filled_order(node: &QueueNode, slot: usize) -> Order {
	let mut order = node.to_order(slot);
	order.volume = Decimal::ZERO;
	order.node = None;
	order
}
