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

//! Matching core replay entry point
//!
//! Usage: `crucible-matching <script.jsonl> [config.toml]`
//!
//! Each script line is one command, decimals written as strings:
//! - `{"op":"submit","order_id":"b1","symbol":"BTC-USDT","side":"buy","price":"100","volume":"2"}`
//! - `{"op":"cancel","order_id":"b1","symbol":"BTC-USDT","side":"buy"}`
//!
//! Every event the engine produces is printed to stdout as one JSON line,
//! followed by the book audit.

use std::{
	fs::File,
	io::{BufRead, BufReader, Write},
	sync::Arc,
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crucible_matching::{
	BookState, CancelCommand, EventBuffer, EventConsumer, MatchingEngine, OrderCommand,
	config::MatchingConfig,
};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Command {
	Submit(OrderCommand),
	Cancel(CancelCommand),
}

fn main() -> Result<()> {
	crucible_matching::logging::init_logging()?;

	let mut args = std::env::args().skip(1);
	let Some(script) = args.next() else {
		bail!("usage: crucible-matching <script.jsonl> [config.toml]");
	};

	let config = match args.next() {
		Some(path) => MatchingConfig::from_file(&path)
			.with_context(|| format!("Failed to load configuration from {}", path))?,
		None => MatchingConfig::from_env().unwrap_or_else(|_| {
			info!(target: "server", "Using default configuration");
			MatchingConfig::default()
		}),
	};

	info!(target: "server", "Starting Crucible matching replay");
	info!(target: "server", "Script: {}", script);
	info!(target: "server", "Lock scope: {:?}", config.lock_scope);
	info!(target: "server", "Event buffer size: {}", config.event_buffer_size);

	let state = Arc::new(BookState::from_config(&config));
	let (producer, consumer) = EventBuffer::new(config.event_buffer_size).split();
	let engine = MatchingEngine::new(config.engine_config(), state.clone(), Arc::new(producer));

	let reader = BufReader::new(File::open(&script).with_context(|| format!("Failed to open {}", script))?);
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	let mut processed = 0usize;

	for (index, line) in reader.lines().enumerate() {
		let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
		let line = line.trim();
		if line.is_empty() || line.starts_with('#') {
			continue;
		}

		let command: Command = match serde_json::from_str(line) {
			Ok(command) => command,
			Err(e) => {
				warn!(target: "server", "Skipping line {}: {}", index + 1, e);
				writeln!(out, "{}", json!({ "line": index + 1, "error": e.to_string() }))?;
				continue;
			}
		};

		let result = match command {
			Command::Submit(cmd) => engine.submit(cmd).map(|_| ()),
			Command::Cancel(cmd) => engine.cancel(cmd).map(|_| ()),
		};
		if let Err(e) = result {
			warn!(target: "server", "Line {} rejected: {}", index + 1, e);
			writeln!(out, "{}", json!({ "line": index + 1, "error": e.to_string() }))?;
		}

		print_events(&consumer, &mut out)?;
		processed += 1;
	}

	let report = state.audit().context("Book audit failed")?;
	writeln!(out, "{}", json!({ "audit": report }))?;
	out.flush()?;

	info!(
		target: "server",
		"Replayed {} commands: {} levels, {} resting orders",
		processed, report.levels, report.orders
	);

	Ok(())
}

fn print_events(consumer: &EventConsumer, out: &mut impl Write) -> Result<()> {
	while let Some(event) = consumer.try_recv() {
		writeln!(out, "{}", serde_json::to_string(&event)?)?;
	}
	Ok(())
}
