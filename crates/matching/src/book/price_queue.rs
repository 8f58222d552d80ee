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

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slab::Slab;

use super::LevelKey;
use crate::types::{Order, Side};

/// Position of a resting order inside its price queue
///
/// Slots are reused once a node is removed, so a handle held by a client can
/// end up pointing at a different order. Every lookup by handle has to check
/// the node's identity before acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
	/// Price of the queue the node lives in
	pub price: Decimal,
	/// Slot inside that queue
	pub slot: usize,
}

/// A resting order inside a price queue
#[derive(Debug, Clone)]
pub struct QueueNode {
	pub order_id: String,
	pub symbol: String,
	pub side: Side,
	pub price: Decimal,
	pub volume: Decimal,
	pub timestamp: u64,
	prev: Option<usize>,
	next: Option<usize>,
}

impl QueueNode {
	/// Materialize the node as an order positioned at `slot`
	pub fn to_order(&self, slot: usize) -> Order {
		Order {
			id: self.order_id.clone(),
			symbol: self.symbol.clone(),
			side: self.side,
			price: self.price,
			volume: self.volume,
			node: Some(NodeHandle {
				price: self.price,
				slot,
			}),
			timestamp: self.timestamp,
		}
	}

	/// Whether this node belongs to the given order
	pub fn is_same_order(&self, order_id: &str, symbol: &str, side: Side) -> bool {
		self.order_id == order_id && self.symbol == symbol && self.side == side
	}
}

/// FIFO queue of resting orders at one (symbol, side, price)
///
/// Nodes live in a slab and are linked front to back, which gives O(1)
/// push-back, front access, pop-front and removal of an interior node by
/// its slot. Arrival order is time priority.
#[derive(Debug, Default)]
pub struct PriceQueue {
	nodes: Slab<QueueNode>,
	head: Option<usize>,
	tail: Option<usize>,
}

impl PriceQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append an order at the back of the queue, returning its slot
	pub fn push_back(&mut self, order: &Order) -> usize {
		let slot = self.nodes.insert(QueueNode {
			order_id: order.id.clone(),
			symbol: order.symbol.clone(),
			side: order.side,
			price: order.price,
			volume: order.volume,
			timestamp: order.timestamp,
			prev: self.tail,
			next: None,
		});

		match self.tail {
			Some(tail) => self.nodes[tail].next = Some(slot),
			None => self.head = Some(slot),
		}
		self.tail = Some(slot);

		slot
	}

	/// Oldest node in the queue
	pub fn front(&self) -> Option<(usize, &QueueNode)> {
		let head = self.head?;
		self.nodes.get(head).map(|node| (head, node))
	}

	pub fn pop_front(&mut self) -> Option<QueueNode> {
		let head = self.head?;
		self.remove(head)
	}

	/// Unlink and return the node at `slot`
	pub fn remove(&mut self, slot: usize) -> Option<QueueNode> {
		let node = self.nodes.try_remove(slot)?;

		match node.prev {
			Some(prev) => self.nodes[prev].next = node.next,
			None => self.head = node.next,
		}
		match node.next {
			Some(next) => self.nodes[next].prev = node.prev,
			None => self.tail = node.prev,
		}

		Some(node)
	}

	pub fn get(&self, slot: usize) -> Option<&QueueNode> {
		self.nodes.get(slot)
	}

	/// Overwrite the volume of the node at `slot` in place (keeps its position)
	pub fn set_volume(&mut self, slot: usize, volume: Decimal) -> bool {
		match self.nodes.get_mut(slot) {
			Some(node) => {
				node.volume = volume;
				true
			}
			None => false,
		}
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Sum of the volumes of all nodes
	pub fn total_volume(&self) -> Decimal {
		self.iter().map(|(_, node)| node.volume).sum()
	}

	/// Nodes in arrival order
	pub fn iter(&self) -> Iter<'_> {
		Iter {
			queue: self,
			cursor: self.head,
		}
	}
}

/// Front-to-back iterator over a [`PriceQueue`]
pub struct Iter<'a> {
	queue: &'a PriceQueue,
	cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
	type Item = (usize, &'a QueueNode);

	fn next(&mut self) -> Option<Self::Item> {
		let slot = self.cursor?;
		let node = self.queue.nodes.get(slot)?;
		self.cursor = node.next;
		Some((slot, node))
	}
}

/// All price queues of the book, keyed by (symbol, side, price)
///
/// The store only guards individual map shards. Callers must hold the level
/// lock for a key while mutating its queue so that a read-modify-write on the
/// queue, the ledger and the index happens as one step.
#[derive(Debug, Default)]
pub struct QueueStore {
	queues: DashMap<LevelKey, PriceQueue>,
}

impl QueueStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Run `f` against the queue at `key`, creating it if missing
	pub fn with_queue<R>(&self, key: &LevelKey, f: impl FnOnce(&mut PriceQueue) -> R) -> R {
		let mut queue = self.queues.entry(key.clone()).or_default();
		f(&mut queue)
	}

	/// Run `f` against the queue at `key` if it exists
	pub fn with_existing<R>(
		&self,
		key: &LevelKey,
		f: impl FnOnce(&mut PriceQueue) -> R,
	) -> Option<R> {
		self.queues.get_mut(key).map(|mut queue| f(&mut queue))
	}

	/// Read-only access to the queue at `key`
	pub fn read<R>(&self, key: &LevelKey, f: impl FnOnce(&PriceQueue) -> R) -> Option<R> {
		self.queues.get(key).map(|queue| f(&queue))
	}

	/// Drop the queue at `key` once it holds no nodes
	///
	/// Must not be called while a closure passed to `with_queue` /
	/// `with_existing` for the same shard is still running.
	pub fn remove_if_empty(&self, key: &LevelKey) {
		self.queues.remove_if(key, |_, queue| queue.is_empty());
	}

	pub fn contains(&self, key: &LevelKey) -> bool {
		self.queues.contains_key(key)
	}

	pub fn keys(&self) -> Vec<LevelKey> {
		self.queues.iter().map(|entry| entry.key().clone()).collect()
	}

	pub fn level_count(&self) -> usize {
		self.queues.len()
	}
}
