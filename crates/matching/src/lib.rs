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

//! Crucible Matching Core
//!
//! This crate provides a concurrent matching core for limit order books
//! ("commission pools"). It matches incoming orders against resting orders
//! with price-time priority, maintains the depth book and reports every
//! fill, rest and cancel as an event.
//!
//! Architecture:
//! - Depth book split into a price index, per-level FIFO queues and a volume ledger
//! - Exact decimal arithmetic for prices and volumes
//! - One exclusive section per (symbol, price) level, taken only while that level is mutated
//! - Events handed to a notification sink after the section is released
//! - Tombstones for settled order ids so replays are rejected

pub mod book;
pub mod config;
pub mod engine;
pub mod event;
pub mod ledger;
pub mod logging;
pub mod types;

pub use book::{LevelKey, NodeHandle, PriceIndex, PriceQueue};
pub use config::{LockScope, MatchingConfig};
pub use engine::{AuditReport, BookState, EngineConfig, EngineError, FillOutcome, MatchingEngine};
pub use event::{
	EventBuffer, EventConsumer, EventProducer, MatchingEvent, MemoryEventSink, NotificationSink,
	SinkError,
};
pub use ledger::{DedupGuard, Tombstone, VolumeLedger};
pub use types::*;
