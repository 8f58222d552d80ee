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

use std::time::{SystemTime, UNIX_EPOCH};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::book::{LevelKey, NodeHandle};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// The side an incoming order of this side matches against
	pub fn opposite(self) -> Self {
		match self {
			Side::Buy => Side::Sell,
			Side::Sell => Side::Buy,
		}
	}
}

/// Order command submitted to the engine
///
/// Price and volume are exact decimals and are expected to be positive;
/// the engine rejects anything else before touching the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCommand {
	/// Unique order ID (serves as idempotency key)
	pub order_id: String,
	/// Symbol identifier (e.g. "BTC-USDT")
	pub symbol: String,
	pub side: Side,
	pub price: Decimal,
	pub volume: Decimal,
}

/// An order or order fragment as seen by the matching core
///
/// `volume` is the live (unfilled) quantity. Once the order rests in the
/// book it only ever decreases. `node` is the position of the order in its
/// price queue; together with `symbol`, `side` and the handle's price it
/// identifies the queue the order lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub id: String,
	pub symbol: String,
	pub side: Side,
	pub price: Decimal,
	pub volume: Decimal,
	/// Queue position while resting, `None` otherwise
	pub node: Option<NodeHandle>,
	/// Milliseconds since the Unix epoch when the engine accepted the order
	pub timestamp: u64,
}

impl From<OrderCommand> for Order {
	fn from(cmd: OrderCommand) -> Self {
		Self {
			id: cmd.order_id,
			symbol: cmd.symbol,
			side: cmd.side,
			price: cmd.price.normalize(),
			volume: cmd.volume,
			node: None,
			timestamp: now_millis(),
		}
	}
}

impl Order {
	/// Key of the price queue this order currently rests in
	pub fn queue_key(&self) -> Option<LevelKey> {
		self.node
			.map(|node| LevelKey::new(self.symbol.clone(), self.side, node.price))
	}

	pub fn is_filled(&self) -> bool {
		self.volume.is_zero()
	}
}

/// Cancel request
///
/// `volume` is advisory only: the engine reports the ledger's resting volume.
/// When `node` is omitted the engine resolves it from the volume ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelCommand {
	pub order_id: String,
	pub symbol: String,
	pub side: Side,
	#[serde(default)]
	pub node: Option<NodeHandle>,
	#[serde(default)]
	pub volume: Decimal,
}

impl CancelCommand {
	/// Build a cancel request for an order the caller knows to be resting
	pub fn for_order(order: &Order) -> Self {
		Self {
			order_id: order.id.clone(),
			symbol: order.symbol.clone(),
			side: order.side,
			node: order.node,
			volume: order.volume,
		}
	}
}

/// A single fill of an incoming order against one resting order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
	pub trade_id: Uuid,
	pub resting_order_id: String,
	/// Price of the resting level the fill happened at
	pub price: Decimal,
	pub quantity: Decimal,
}

/// Result of submitting an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
	/// The order after matching; carries its queue handle if it rested
	pub order: Order,
	/// Fills in the order they happened
	pub fills: Vec<Fill>,
	/// Whether the order was fully filled
	pub fully_filled: bool,
	/// Whether the order was partially filled and the remainder rests on the book
	pub partially_filled: bool,
	/// Whether a remainder was added to the book
	pub rested: bool,
}

impl MatchResult {
	/// Total quantity traded by this submission
	pub fn filled_volume(&self) -> Decimal {
		self.fills.iter().map(|fill| fill.quantity).sum()
	}
}

/// Result of a cancel request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CancelOutcome {
	/// The order was removed from the book
	Canceled {
		order: Order,
		canceled_quantity: Decimal,
	},
	/// No live node for the order: already filled or canceled
	NotFound,
}

impl CancelOutcome {
	pub fn is_canceled(&self) -> bool {
		matches!(self, CancelOutcome::Canceled { .. })
	}
}

pub(crate) fn now_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis() as u64)
		.unwrap_or_default()
}
