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

mod buffer;
mod sink;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Order;

pub use buffer::{EventBuffer, EventConsumer, EventProducer};
pub use sink::{MemoryEventSink, NotificationSink, SinkError};

/// Sequence number for event ordering
///
/// Assigned while the producing level section is held, so events touching
/// the same order are numbered in the order their mutations happened.
pub type SequenceNumber = u64;

/// Notifications produced by the matching core
///
/// Events are built while the book is being mutated and handed to the
/// notification sink only after the level section is released. Quantities
/// are exact; delivery may repeat an event (consumers dedupe on `seq` or
/// `trade_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchingEvent {
	/// One fill between an incoming order and a resting order
	///
	/// Both orders are reported in their state right after the fill.
	MatchOccurred {
		seq: SequenceNumber,
		trade_id: Uuid,
		incoming_order: Order,
		resting_order: Order,
		/// Price of the resting level
		price: Decimal,
		trade_quantity: Decimal,
		timestamp: u64,
	},

	/// A resting order was removed from the book by request
	OrderCanceled {
		seq: SequenceNumber,
		order: Order,
		canceled_quantity: Decimal,
		timestamp: u64,
	},

	/// The unfilled remainder of an order was added to the book
	OrderRested {
		seq: SequenceNumber,
		order: Order,
		timestamp: u64,
	},
}

impl MatchingEvent {
	/// Get the sequence number of this event
	pub fn sequence(&self) -> SequenceNumber {
		match self {
			MatchingEvent::MatchOccurred { seq, .. } => *seq,
			MatchingEvent::OrderCanceled { seq, .. } => *seq,
			MatchingEvent::OrderRested { seq, .. } => *seq,
		}
	}

	/// Get the symbol this event belongs to
	pub fn symbol(&self) -> &str {
		match self {
			MatchingEvent::MatchOccurred { incoming_order, .. } => &incoming_order.symbol,
			MatchingEvent::OrderCanceled { order, .. } => &order.symbol,
			MatchingEvent::OrderRested { order, .. } => &order.symbol,
		}
	}

	/// Whether the event concerns the given order id
	pub fn involves(&self, order_id: &str) -> bool {
		match self {
			MatchingEvent::MatchOccurred {
				incoming_order,
				resting_order,
				..
			} => incoming_order.id == order_id || resting_order.id == order_id,
			MatchingEvent::OrderCanceled { order, .. } => order.id == order_id,
			MatchingEvent::OrderRested { order, .. } => order.id == order_id,
		}
	}

	/// Traded quantity for fill events
	pub fn trade_quantity(&self) -> Option<Decimal> {
		match self {
			MatchingEvent::MatchOccurred { trade_quantity, .. } => Some(*trade_quantity),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Side;
	use rust_decimal_macros::dec;

	fn create_test_order(id: &str, side: Side, volume: Decimal) -> Order {
		Order {
			id: id.to_string(),
			symbol: "BTC-USDT".to_string(),
			side,
			price: dec!(50),
			volume,
			node: None,
			timestamp: 1000,
		}
	}

	#[test]
	fn test_event_accessors() {
		let event = MatchingEvent::MatchOccurred {
			seq: 7,
			trade_id: Uuid::new_v4(),
			incoming_order: create_test_order("buy_1", Side::Buy, dec!(0)),
			resting_order: create_test_order("sell_1", Side::Sell, dec!(6)),
			price: dec!(50),
			trade_quantity: dec!(4),
			timestamp: 1000,
		};

		assert_eq!(event.sequence(), 7);
		assert_eq!(event.symbol(), "BTC-USDT");
		assert!(event.involves("buy_1"));
		assert!(event.involves("sell_1"));
		assert!(!event.involves("sell_2"));
		assert_eq!(event.trade_quantity(), Some(dec!(4)));
	}

	#[test]
	fn test_event_json_is_tagged() {
		let event = MatchingEvent::OrderCanceled {
			seq: 1,
			order: create_test_order("sell_1", Side::Sell, dec!(6)),
			canceled_quantity: dec!(6),
			timestamp: 1000,
		};

		let json = serde_json::to_string(&event).unwrap();
		assert!(json.contains("\"type\":\"order_canceled\""));
		assert!(json.contains("\"canceled_quantity\":\"6\""));
		assert_eq!(event.trade_quantity(), None);
	}
}
