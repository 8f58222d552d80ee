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

use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};

use super::{MatchingEvent, NotificationSink, SinkError};

/// Bounded event buffer between the matching core and a downstream consumer
///
/// Properties:
/// - Multiple producers (every engine handle sharing the sink)
/// - Single consumer (trade ledger / market-data publisher)
/// - Bounded capacity for backpressure
/// - Non-blocking send: a full buffer is reported, never waited on
pub struct EventBuffer {
	sender: Sender<MatchingEvent>,
	receiver: Receiver<MatchingEvent>,
}

impl EventBuffer {
	/// Create a new event buffer with the specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the buffer into producer and consumer ends
	///
	/// The producer end is handed to the engine as its notification sink.
	/// The consumer end is drained by whoever publishes the events.
	pub fn split(self) -> (EventProducer, EventConsumer) {
		(
			EventProducer {
				sender: self.sender,
			},
			EventConsumer {
				receiver: self.receiver,
			},
		)
	}
}

/// Producer end of the event buffer
#[derive(Clone)]
pub struct EventProducer {
	sender: Sender<MatchingEvent>,
}

impl EventProducer {
	/// Push an event to the buffer
	///
	/// Returns `SinkError::Full` when the consumer falls behind.
	pub fn push(&self, event: MatchingEvent) -> Result<(), SinkError> {
		self.sender.try_send(event).map_err(|e| match e {
			TrySendError::Full(_) => SinkError::Full,
			TrySendError::Disconnected(_) => SinkError::Disconnected,
		})
	}

	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

impl NotificationSink for EventProducer {
	fn deliver(&self, event: &MatchingEvent) -> Result<(), SinkError> {
		self.push(event.clone())
	}
}

/// Consumer end of the event buffer
pub struct EventConsumer {
	receiver: Receiver<MatchingEvent>,
}

impl EventConsumer {
	/// Try to receive an event (non-blocking)
	pub fn try_recv(&self) -> Option<MatchingEvent> {
		match self.receiver.try_recv() {
			Ok(event) => Some(event),
			Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
		}
	}

	/// Receive an event, waiting at most `timeout`
	pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<MatchingEvent>, SinkError> {
		match self.receiver.recv_timeout(timeout) {
			Ok(event) => Ok(Some(event)),
			Err(RecvTimeoutError::Timeout) => Ok(None),
			Err(RecvTimeoutError::Disconnected) => Err(SinkError::Disconnected),
		}
	}

	/// Drain up to `max_count` buffered events (non-blocking)
	pub fn drain(&self, max_count: usize) -> Vec<MatchingEvent> {
		self.receiver.try_iter().take(max_count).collect()
	}

	pub fn len(&self) -> usize {
		self.receiver.len()
	}

	pub fn is_empty(&self) -> bool {
		self.receiver.is_empty()
	}
}
