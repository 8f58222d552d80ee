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

use std::collections::BTreeMap;

use dashmap::DashMap;
use rust_decimal::Decimal;
use thiserror::Error;

use super::LevelKey;
use crate::types::Side;

/// Error types for price index updates
#[derive(Debug, Error)]
pub enum IndexError {
	#[error("Price level not found: {symbol} {side:?} @ {price}")]
	LevelNotFound {
		symbol: String,
		side: Side,
		price: Decimal,
	},
	#[error(
		"Aggregate underflow at {symbol} {side:?} @ {price}: available {available}, requested {requested}"
	)]
	Underflow {
		symbol: String,
		side: Side,
		price: Decimal,
		available: Decimal,
		requested: Decimal,
	},
}

/// Ordered depth index: price -> aggregate resting volume, per (symbol, side)
///
/// BTreeMap keeps levels sorted so crossable levels come out as a range scan.
/// Bids are walked from the highest price down, asks from the lowest up.
/// Levels whose aggregate reaches zero are removed.
#[derive(Debug, Default)]
pub struct PriceIndex {
	sides: DashMap<(String, Side), BTreeMap<Decimal, Decimal>>,
}

impl PriceIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add resting volume to a level, creating the level if needed
	pub fn add(&self, key: &LevelKey, volume: Decimal) {
		let mut levels = self
			.sides
			.entry((key.symbol.clone(), key.side))
			.or_default();
		*levels.entry(key.price).or_insert(Decimal::ZERO) += volume;
	}

	/// Remove volume from a level, dropping the level once it is empty
	///
	/// Returns the aggregate left at the level.
	pub fn subtract(&self, key: &LevelKey, volume: Decimal) -> Result<Decimal, IndexError> {
		let mut levels = self
			.sides
			.get_mut(&(key.symbol.clone(), key.side))
			.ok_or_else(|| Self::not_found(key))?;
		let aggregate = levels.get_mut(&key.price).ok_or_else(|| Self::not_found(key))?;

		if *aggregate < volume {
			return Err(IndexError::Underflow {
				symbol: key.symbol.clone(),
				side: key.side,
				price: key.price,
				available: *aggregate,
				requested: volume,
			});
		}

		*aggregate -= volume;
		let remaining = *aggregate;
		if remaining.is_zero() {
			levels.remove(&key.price);
		}

		Ok(remaining)
	}

	/// Aggregate volume at a level
	pub fn aggregate(&self, key: &LevelKey) -> Option<Decimal> {
		self.sides
			.get(&(key.symbol.clone(), key.side))
			.and_then(|levels| levels.get(&key.price).copied())
	}

	/// Levels on `resting_side` that an incoming order limited at `limit`
	/// crosses, in matching priority order
	///
	/// An incoming buy crosses asks at or below its price (lowest first); an
	/// incoming sell crosses bids at or above its price (highest first).
	pub fn crossable_levels(&self, symbol: &str, resting_side: Side, limit: Decimal) -> Vec<Decimal> {
		let Some(levels) = self.sides.get(&(symbol.to_string(), resting_side)) else {
			return Vec::new();
		};

		match resting_side {
			Side::Sell => levels.range(..=limit).map(|(price, _)| *price).collect(),
			Side::Buy => levels.range(limit..).rev().map(|(price, _)| *price).collect(),
		}
	}

	/// Top `depth` levels of one side, best price first
	pub fn depth(&self, symbol: &str, side: Side, depth: usize) -> Vec<(Decimal, Decimal)> {
		let Some(levels) = self.sides.get(&(symbol.to_string(), side)) else {
			return Vec::new();
		};

		match side {
			Side::Buy => levels
				.iter()
				.rev()
				.take(depth)
				.map(|(price, volume)| (*price, *volume))
				.collect(),
			Side::Sell => levels
				.iter()
				.take(depth)
				.map(|(price, volume)| (*price, *volume))
				.collect(),
		}
	}

	/// Best bid (highest) or best ask (lowest)
	pub fn best_price(&self, symbol: &str, side: Side) -> Option<Decimal> {
		self.depth(symbol, side, 1).first().map(|(price, _)| *price)
	}

	pub fn level_count(&self, symbol: &str, side: Side) -> usize {
		self.sides
			.get(&(symbol.to_string(), side))
			.map(|levels| levels.len())
			.unwrap_or(0)
	}

	/// Every (symbol, side) the index has seen
	pub fn books(&self) -> Vec<(String, Side)> {
		self.sides.iter().map(|entry| entry.key().clone()).collect()
	}

	fn not_found(key: &LevelKey) -> IndexError {
		IndexError::LevelNotFound {
			symbol: key.symbol.clone(),
			side: key.side,
			price: key.price,
		}
	}
}
