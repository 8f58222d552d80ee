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

//! Multi-threaded submission and cancel against one shared book
//!
//! Orders come from a small fixed price band so that threads keep colliding
//! on the same levels.

use std::{collections::HashSet, sync::Arc, thread};

use crucible_matching::{
	BookState, CancelCommand, CancelOutcome, EngineConfig, LockScope, MatchingConfig,
	MatchingEngine, MatchingEvent, MemoryEventSink, OrderCommand, Side,
};
use rust_decimal::Decimal;

const THREADS: usize = 8;
const ORDERS_PER_THREAD: usize = 400;

/// Small deterministic generator so each thread has its own reproducible flow
struct Lcg(u64);

impl Lcg {
	fn next(&mut self) -> u64 {
		self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
		self.0 >> 33
	}
}

fn create_engine(lock_scope: LockScope) -> (MatchingEngine, MemoryEventSink) {
	let sink = MemoryEventSink::new();
	let state = Arc::new(BookState::from_config(&MatchingConfig::default()));
	let config = EngineConfig {
		lock_scope,
		..EngineConfig::default()
	};
	(MatchingEngine::new(config, state, Arc::new(sink.clone())), sink)
}

/// Run the workload and return the total volume submitted
fn run_workload(engine: &MatchingEngine) -> Decimal {
	let handles: Vec<_> = (0..THREADS)
		.map(|t| {
			let engine = engine.clone();
			thread::spawn(move || {
				let mut rng = Lcg(t as u64 + 1);
				let mut submitted = Decimal::ZERO;
				let mut rested = Vec::new();

				for i in 0..ORDERS_PER_THREAD {
					let side = if rng.next() % 2 == 0 { Side::Buy } else { Side::Sell };
					let price = Decimal::new(995 + (rng.next() % 11) as i64, 1);
					let volume = Decimal::new(1 + (rng.next() % 50) as i64, 1);
					let cmd = OrderCommand {
						order_id: format!("t{}-{}", t, i),
						symbol: "BTC-USDT".to_string(),
						side,
						price,
						volume,
					};

					let result = engine.submit(cmd).expect("submit must succeed");
					submitted += volume;
					if result.rested {
						rested.push(result.order);
					}

					if rng.next() % 5 == 0
						&& let Some(order) = rested.pop()
					{
						let outcome = engine
							.cancel(CancelCommand::for_order(&order))
							.expect("cancel must succeed");
						if let CancelOutcome::Canceled {
							canceled_quantity, ..
						} = outcome
						{
							assert!(canceled_quantity > Decimal::ZERO);
							assert!(canceled_quantity <= order.volume);
						}
					}
				}

				submitted
			})
		})
		.collect();

	handles
		.into_iter()
		.map(|handle| handle.join().expect("worker panicked"))
		.sum()
}

fn assert_conserved(engine: &MatchingEngine, sink: &MemoryEventSink, submitted: Decimal) {
	let report = engine.state().audit().expect("book must be consistent");

	let mut traded = Decimal::ZERO;
	let mut canceled = Decimal::ZERO;
	let mut trade_ids = HashSet::new();
	let mut sequences = HashSet::new();
	for event in sink.events() {
		assert!(sequences.insert(event.sequence()), "duplicate sequence number");
		match event {
			MatchingEvent::MatchOccurred {
				trade_id,
				trade_quantity,
				..
			} => {
				assert!(trade_quantity > Decimal::ZERO);
				assert!(trade_ids.insert(trade_id));
				traded += trade_quantity;
			}
			MatchingEvent::OrderCanceled {
				canceled_quantity, ..
			} => canceled += canceled_quantity,
			MatchingEvent::OrderRested { .. } => {}
		}
	}

	// Every traded unit leaves both sides of the trade
	assert_eq!(submitted, traded * Decimal::TWO + canceled + report.volume);
	assert_eq!(report.orders, engine.state().order_count());
}

#[test]
fn test_concurrent_level_scope_conserves_volume() {
	let (engine, sink) = create_engine(LockScope::Level);
	let submitted = run_workload(&engine);
	assert_conserved(&engine, &sink, submitted);
}

#[test]
fn test_concurrent_symbol_scope_never_leaves_crossed_book() {
	let (engine, sink) = create_engine(LockScope::Symbol);
	let submitted = run_workload(&engine);
	assert_conserved(&engine, &sink, submitted);

	if let (Some(bid), Some(ask)) = (
		engine.best_price("BTC-USDT", Side::Buy),
		engine.best_price("BTC-USDT", Side::Sell),
	) {
		assert!(bid < ask, "crossed book: bid {} >= ask {}", bid, ask);
	}
}

#[test]
fn test_same_level_contention_preserves_fifo_per_thread() {
	let (engine, sink) = create_engine(LockScope::Level);
	let price = Decimal::new(100, 0);

	let handles: Vec<_> = (0..4)
		.map(|t| {
			let engine = engine.clone();
			thread::spawn(move || {
				for i in 0..100 {
					engine
						.submit(OrderCommand {
							order_id: format!("s{}-{:03}", t, i),
							symbol: "BTC-USDT".to_string(),
							side: Side::Sell,
							price,
							volume: Decimal::ONE,
						})
						.expect("submit must succeed");
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().expect("worker panicked");
	}

	sink.clear();
	engine
		.submit(OrderCommand {
			order_id: "sweep".to_string(),
			symbol: "BTC-USDT".to_string(),
			side: Side::Buy,
			price,
			volume: Decimal::new(400, 0),
		})
		.expect("sweep must succeed");

	// Orders from one thread rest in submission order, so they fill in that order
	let mut last_per_thread: Vec<Option<String>> = vec![None; 4];
	let mut fills = 0;
	for event in sink.events() {
		if let MatchingEvent::MatchOccurred { resting_order, .. } = event {
			let thread_index: usize = resting_order.id[1..2].parse().expect("thread index");
			if let Some(previous) = &last_per_thread[thread_index] {
				assert!(*previous < resting_order.id);
			}
			last_per_thread[thread_index] = Some(resting_order.id);
			fills += 1;
		}
	}

	assert_eq!(fills, 400);
	assert_eq!(engine.state().order_count(), 0);
}
