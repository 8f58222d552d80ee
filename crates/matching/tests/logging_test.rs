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

//! Integration test for the logging setup
//!
//! A global subscriber can only be installed once per process, so this file
//! holds a single test.

use std::{fs, sync::Arc};

use crucible_matching::{
	BookState, EngineConfig, MatchingConfig, MatchingEngine, MemoryEventSink, OrderCommand, Side,
	logging,
};
use rust_decimal_macros::dec;

#[test]
fn test_logging_writes_daily_file_under_log_dir() {
	let log_root = std::env::temp_dir().join(format!("crucible-logs-{}", std::process::id()));
	unsafe {
		std::env::set_var("LOG_DIR", &log_root);
		std::env::set_var("LOG_TO_CONSOLE", "false");
	}

	logging::init_logging().unwrap();

	// A second install is refused instead of panicking
	assert!(logging::init_logging().is_err());

	let config = EngineConfig {
		verbose_logging: true,
		..EngineConfig::default()
	};
	let state = Arc::new(BookState::from_config(&MatchingConfig::default()));
	let engine = MatchingEngine::new(config, state, Arc::new(MemoryEventSink::new()));
	for (id, side) in [("sell_1", Side::Sell), ("buy_1", Side::Buy)] {
		engine
			.submit(OrderCommand {
				order_id: id.to_string(),
				symbol: "BTC-USDT".to_string(),
				side,
				price: dec!(100),
				volume: dec!(1),
			})
			.unwrap();
	}

	let log_dir = log_root.join("matching");
	let files: Vec<_> = fs::read_dir(&log_dir)
		.unwrap()
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.file_name().to_string_lossy().to_string())
		.collect();

	assert!(
		files
			.iter()
			.any(|name| name.starts_with("matching.") && name.ends_with(".log")),
		"no log file in {}: {:?}",
		log_dir.display(),
		files
	);

	fs::remove_dir_all(&log_root).ok();
}
