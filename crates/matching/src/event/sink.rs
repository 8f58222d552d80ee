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

use thiserror::Error;

use super::MatchingEvent;

/// Error types for notification delivery
#[derive(Debug, Error)]
pub enum SinkError {
	#[error("Notification sink is full")]
	Full,
	#[error("Notification sink disconnected")]
	Disconnected,
	#[error("Failed to deliver notification: {0}")]
	DeliveryFailed(String),
}

/// Notification sink trait - delivery boundary for matching events
///
/// The sink receives events after the book mutation that produced them is
/// complete and its level section has been released, so a slow sink never
/// holds up matching on a level.
///
/// Implementations decide where events go:
/// - In-memory Vec (testing, replay tooling)
/// - Bounded channel to a consumer thread
/// - External systems (trade ledger, market-data feed)
pub trait NotificationSink: Send + Sync {
	/// Deliver one event
	///
	/// A failed delivery may be retried by the engine, so implementations
	/// must tolerate seeing the same event more than once.
	fn deliver(&self, event: &MatchingEvent) -> Result<(), SinkError>;
}

/// In-memory sink that records every delivered event
///
/// Cloning shares the underlying buffer, which lets a test hand one clone
/// to the engine and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
	events: Arc<Mutex<Vec<MatchingEvent>>>,
}

impl MemoryEventSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Copy of all events delivered so far, in delivery order
	pub fn events(&self) -> Vec<MatchingEvent> {
		self.events
			.lock()
			.map(|events| events.clone())
			.unwrap_or_default()
	}

	/// Events that concern `order_id`
	pub fn events_for(&self, order_id: &str) -> Vec<MatchingEvent> {
		self.events()
			.into_iter()
			.filter(|event| event.involves(order_id))
			.collect()
	}

	pub fn len(&self) -> usize {
		self.events.lock().map(|events| events.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		if let Ok(mut events) = self.events.lock() {
			events.clear();
		}
	}
}

impl NotificationSink for MemoryEventSink {
	fn deliver(&self, event: &MatchingEvent) -> Result<(), SinkError> {
		let mut events = self
			.events
			.lock()
			.map_err(|e| SinkError::DeliveryFailed(e.to_string()))?;
		events.push(event.clone());
		Ok(())
	}
}
