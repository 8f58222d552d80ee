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

//! Depth book structures
//!
//! The book for one symbol is spread over three structures that must stay
//! consistent with each other:
//! - [`PriceIndex`]: price -> aggregate resting volume, per (symbol, side)
//! - [`PriceQueue`]: FIFO of resting orders at one (symbol, side, price)
//! - the volume ledger (see [`crate::ledger`]): order id -> resting volume
//!
//! Mutation of a level is only allowed inside the exclusive section handed
//! out by [`LevelLocks`].

mod locks;
mod price_index;
mod price_queue;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Side;

pub use locks::LevelLocks;
pub use price_index::{IndexError, PriceIndex};
pub use price_queue::{NodeHandle, PriceQueue, QueueNode, QueueStore};

/// Identifies one price queue: (symbol, side, price)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LevelKey {
	pub symbol: String,
	pub side: Side,
	pub price: Decimal,
}

impl LevelKey {
	pub fn new(symbol: impl Into<String>, side: Side, price: Decimal) -> Self {
		Self {
			symbol: symbol.into(),
			side,
			price: price.normalize(),
		}
	}
}
