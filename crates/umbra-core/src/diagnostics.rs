// Copyright 2025 eraflo
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

//! A user-visible diagnostic message channel.
//!
//! Content problems (malformed terrain data, a patch blowing its render group
//! budget, ...) are published here in addition to the log, so a host
//! application can surface them in its UI.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Messages kept by a [`DiagnosticBus`] before the oldest are dropped.
pub const DIAGNOSTIC_CAPACITY: usize = 256;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Something was degraded but the frame or load went on.
    Warning,
    /// Something failed and a fallback was used.
    Error,
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity of the message.
    pub severity: Severity,
    /// The subsystem that raised it, e.g. `"terrain"`.
    pub source: &'static str,
    /// Human-readable text.
    pub message: String,
}

impl Diagnostic {
    /// Creates a warning.
    pub fn warning(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            source,
            message: message.into(),
        }
    }

    /// Creates an error.
    pub fn error(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.source, self.message)
    }
}

/// A bounded diagnostic channel.
///
/// Clones share the same queue. Publishing never blocks and never fails the
/// caller: when [`DIAGNOSTIC_CAPACITY`] messages are pending, the oldest one
/// is dropped to make room, so a host that never drains keeps a fixed
/// amount of memory.
#[derive(Debug, Clone)]
pub struct DiagnosticBus {
    sender: flume::Sender<Diagnostic>,
    receiver: flume::Receiver<Diagnostic>,
    dropped: Arc<AtomicU64>,
}

impl DiagnosticBus {
    /// Creates a new bus holding at most [`DIAGNOSTIC_CAPACITY`] messages.
    pub fn new() -> Self {
        Self::with_capacity(DIAGNOSTIC_CAPACITY)
    }

    /// Creates a new bus holding at most `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity.max(1));
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes a diagnostic and mirrors it to the log.
    pub fn publish(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Error => log::error!("{diagnostic}"),
        }
        let mut pending = diagnostic;
        loop {
            match self.sender.try_send(pending) {
                Ok(()) => return,
                Err(flume::TrySendError::Full(back)) => {
                    if self.receiver.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    pending = back;
                }
                Err(flume::TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Takes every pending diagnostic without blocking, oldest first.
    pub fn drain(&self) -> Vec<Diagnostic> {
        self.receiver.try_iter().collect()
    }

    /// Messages discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for DiagnosticBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_messages_in_order() {
        let bus = DiagnosticBus::new();
        bus.publish(Diagnostic::warning("terrain", "first"));
        bus.clone().publish(Diagnostic::error("terrain", "second"));

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "first");
        assert_eq!(drained[1].severity, Severity::Error);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn undrained_bus_keeps_only_the_newest_messages() {
        let bus = DiagnosticBus::with_capacity(4);
        for i in 0..10 {
            bus.publish(Diagnostic::warning("terrain", format!("message {i}")));
        }
        let drained = bus.drain();
        assert_eq!(drained.len(), 4);
        assert_eq!(drained[0].message, "message 6");
        assert_eq!(drained[3].message, "message 9");
        assert_eq!(bus.dropped(), 6);
    }

    #[test]
    fn display_includes_source() {
        let d = Diagnostic::warning("lighting", "budget");
        assert_eq!(d.to_string(), "[Warning] lighting: budget");
    }
}
