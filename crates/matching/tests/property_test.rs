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

use std::sync::Arc;

use crucible_matching::{
	BookState, CancelCommand, EngineConfig, MatchingConfig, MatchingEngine, MatchingEvent,
	MemoryEventSink, Order, OrderCommand, Side,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Op {
	Submit { side: Side, price: i64, volume: i64 },
	/// Cancel the n-th order that rested so far
	Cancel(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
	prop_oneof![
		4 => (any::<bool>(), 95i64..=105, 1i64..=250).prop_map(|(buy, price, volume)| Op::Submit {
			side: if buy { Side::Buy } else { Side::Sell },
			price,
			volume,
		}),
		1 => (0usize..64).prop_map(Op::Cancel),
	]
}

proptest! {
	#[test]
	fn prop_volume_is_conserved(ops in prop::collection::vec(op_strategy(), 1..120)) {
		let sink = MemoryEventSink::new();
		let state = Arc::new(BookState::from_config(&MatchingConfig::default()));
		let engine = MatchingEngine::new(EngineConfig::default(), state, Arc::new(sink.clone()));

		let mut submitted = Decimal::ZERO;
		let mut rested: Vec<Order> = Vec::new();

		for (i, op) in ops.into_iter().enumerate() {
			match op {
				Op::Submit { side, price, volume } => {
					// Volumes carry two decimal places
					let volume = Decimal::new(volume, 2);
					let result = engine.submit(OrderCommand {
						order_id: format!("order_{}", i),
						symbol: "BTC-USDT".to_string(),
						side,
						price: Decimal::new(price, 0),
						volume,
					}).unwrap();

					submitted += volume;
					prop_assert_eq!(result.filled_volume() + result.order.volume, volume);
					prop_assert_eq!(result.fully_filled, result.order.volume.is_zero());
					if result.rested {
						rested.push(result.order);
					}
				}
				Op::Cancel(n) => {
					if let Some(order) = rested.get(n) {
						engine.cancel(CancelCommand::for_order(order)).unwrap();
					}
				}
			}

			// Sequential flow never leaves the book crossed
			if let (Some(bid), Some(ask)) = (
				engine.best_price("BTC-USDT", Side::Buy),
				engine.best_price("BTC-USDT", Side::Sell),
			) {
				prop_assert!(bid < ask);
			}
		}

		let report = engine.state().audit().unwrap();
		let mut traded = Decimal::ZERO;
		let mut canceled = Decimal::ZERO;
		for event in sink.events() {
			match event {
				MatchingEvent::MatchOccurred { trade_quantity, .. } => traded += trade_quantity,
				MatchingEvent::OrderCanceled { canceled_quantity, .. } => canceled += canceled_quantity,
				MatchingEvent::OrderRested { .. } => {}
			}
		}

		prop_assert_eq!(submitted, traded * Decimal::TWO + canceled + report.volume);
	}
}
