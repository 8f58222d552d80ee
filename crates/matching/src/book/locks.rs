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

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rust_decimal::Decimal;

/// Exclusive sections for the book
///
/// A level section covers both sides of one (symbol, price): consuming a
/// level and resting a remainder at that price are serialized by it. The
/// symbol section is coarser and only taken when the engine runs with
/// `LockScope::Symbol`.
///
/// Lock order is always symbol section, then level section.
#[derive(Debug, Default)]
pub struct LevelLocks {
	levels: DashMap<(String, Decimal), Arc<Mutex<()>>>,
	symbols: DashMap<String, Arc<Mutex<()>>>,
}

impl LevelLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Section for one (symbol, price)
	pub fn level(&self, symbol: &str, price: Decimal) -> Arc<Mutex<()>> {
		self.levels
			.entry((symbol.to_string(), price.normalize()))
			.or_default()
			.clone()
	}

	/// Hand back a section taken with [`LevelLocks::level`]
	///
	/// The registry entry is removed when the caller held the last clone
	/// and `vacant` reports no queue left at the price. A thread that clones
	/// the section concurrently keeps it alive, and one that arrives after
	/// removal gets a fresh section that nobody else can be holding.
	pub fn release(
		&self,
		symbol: &str,
		price: Decimal,
		section: Arc<Mutex<()>>,
		vacant: impl FnOnce() -> bool,
	) {
		drop(section);
		self.levels
			.remove_if(&(symbol.to_string(), price.normalize()), |_, section| {
				Arc::strong_count(section) == 1 && vacant()
			});
	}

	/// Section for a whole symbol
	pub fn symbol(&self, symbol: &str) -> Arc<Mutex<()>> {
		self.symbols.entry(symbol.to_string()).or_default().clone()
	}

	pub fn level_count(&self) -> usize {
		self.levels.len()
	}
}
