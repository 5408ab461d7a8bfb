use std::sync::{Arc, Mutex};
use std::time::Duration;

use ghost::logging::LogSink;
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub prefix: String,
    pub message: String,
}

/// Log sink that records every job line so tests can assert on them.
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().clone()
    }

    /// Messages only, in order.
    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.message).collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.message.contains(needle))
            .count()
    }

    /// Wait until at least `count` messages contain `needle`.
    pub async fn wait_for(&self, needle: &str, count: usize, within: Duration) -> bool {
        crate::eventually(within, || self.count_containing(needle) >= count).await
    }
}

impl LogSink for MemoryLog {
    fn record(&self, level: Level, prefix: &str, message: &str) {
        self.lines.lock().unwrap().push(LogLine {
            level,
            prefix: prefix.to_string(),
            message: message.to_string(),
        });
    }
}
