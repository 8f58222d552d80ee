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

use crucible_matching::{OrderCommand, Side};
use rust_decimal::Decimal;

#[derive(Clone, Copy)]
pub enum Scenario {
	/// Bids and asks far apart, every order rests
	NoCross,
	/// Everything at one price, orders keep netting against each other
	CrossHeavy,
	/// Many resting makers with an occasional taker sweeping several levels
	DeepBook,
}

const MID: i64 = 50_000;
const LEVELS: i64 = 2_000;

pub struct OrderGenerator {
	thread_id: usize,
	counter: u64,
	scenario: Scenario,
}

impl OrderGenerator {
	pub fn new(thread_id: usize, scenario: Scenario) -> Self {
		Self {
			thread_id,
			counter: 0,
			scenario,
		}
	}

	pub fn next_order(&mut self) -> OrderCommand {
		self.counter += 1;
		let order_id = format!("t{}-{}", self.thread_id, self.counter);
		let side = if self.counter.is_multiple_of(2) {
			Side::Buy
		} else {
			Side::Sell
		};

		let (side, price, volume) = match self.scenario {
			Scenario::NoCross => {
				let offset = (self.counter % 1000) as i64;
				let price = match side {
					Side::Buy => MID - 6_000 + offset,
					Side::Sell => MID + 6_000 + offset,
				};
				(side, price, Decimal::ONE)
			}
			Scenario::CrossHeavy => (side, MID, Decimal::TEN),
			Scenario::DeepBook if self.counter.is_multiple_of(100) => {
				// Extreme limit so the taker crosses many levels
				let side = if (self.counter / 100).is_multiple_of(2) {
					Side::Buy
				} else {
					Side::Sell
				};
				let price = match side {
					Side::Buy => MID * 2,
					Side::Sell => 1,
				};
				(side, price, Decimal::new(250_000, 0))
			}
			Scenario::DeepBook => {
				let offset = (self.counter % LEVELS as u64) as i64 - LEVELS / 2;
				(side, MID + offset, Decimal::new(1_000, 0))
			}
		};

		OrderCommand {
			order_id,
			symbol: "BTC-USDT".to_string(),
			side,
			price: Decimal::new(price, 0),
			volume,
		}
	}

	/// Two-sided book around the mid price that does not cross itself
	pub fn warmup_orders(&self, count: usize) -> Vec<OrderCommand> {
		let half = LEVELS / 2;

		(0..count)
			.map(|i| {
				let side = if i.is_multiple_of(2) {
					Side::Buy
				} else {
					Side::Sell
				};
				let level = (i as i64 / 2) % half;
				let price = match side {
					Side::Buy => MID - 1 - level,
					Side::Sell => MID + 1 + level,
				};

				OrderCommand {
					order_id: format!("warmup-{}", i),
					symbol: "BTC-USDT".to_string(),
					side,
					price: Decimal::new(price, 0),
					volume: Decimal::new(1_000, 0),
				}
			})
			.collect()
	}
}
