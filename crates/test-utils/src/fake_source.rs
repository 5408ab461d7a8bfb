use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;

use ghost::errors::{GhostError, Result};
use ghost::watch::{EventSource, RawEvent, RawKind, SourceError, SourceItem, Subscription};

/// An in-memory event source: tests push raw notifications by hand.
///
/// Every subscription receives the events emitted under its root.
#[derive(Debug, Default, Clone)]
pub struct FakeEventSource {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    subscribers: Vec<(PathBuf, mpsc::UnboundedSender<SourceItem>)>,
    fail_subscribe: Option<String>,
    refused_roots: Vec<PathBuf>,
    subscribe_calls: usize,
}

impl FakeEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `(path, kind)` to every live subscription whose root contains it.
    pub fn emit(&self, path: impl AsRef<Path>, kind: RawKind) {
        let path = path.as_ref();
        let state = self.state.lock().unwrap();
        for (root, tx) in &state.subscribers {
            if path.starts_with(root) {
                let _ = tx.send(Ok(RawEvent::new(path, kind)));
            }
        }
    }

    /// Report a source error to every live subscription.
    pub fn fail(&self, message: &str) {
        let state = self.state.lock().unwrap();
        for (_, tx) in &state.subscribers {
            let _ = tx.send(Err(SourceError(message.to_string())));
        }
    }

    /// Close every subscription's channel.
    pub fn close(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }

    /// Make future `subscribe` calls fail with `message`.
    pub fn fail_subscribe(&self, message: Option<&str>) {
        self.state.lock().unwrap().fail_subscribe = message.map(str::to_string);
    }

    /// Make `subscribe` fail for this root only.
    pub fn refuse_root(&self, root: impl Into<PathBuf>) {
        self.state.lock().unwrap().refused_roots.push(root.into());
    }

    /// Subscriptions whose receiving side is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(_, tx)| !tx.is_closed());
        state.subscribers.len()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.state.lock().unwrap().subscribe_calls
    }
}

impl EventSource for FakeEventSource {
    fn subscribe(&self, root: &Path) -> Result<Subscription> {
        let mut state = self.state.lock().unwrap();
        state.subscribe_calls += 1;
        let refusal = match &state.fail_subscribe {
            Some(message) => Some(message.clone()),
            None if state.refused_roots.iter().any(|r| r == root) => {
                Some("root refused".to_string())
            }
            None => None,
        };
        if let Some(message) = refusal {
            return Err(GhostError::Subscribe {
                root: root.to_path_buf(),
                source: anyhow!("{message}"),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push((root.to_path_buf(), tx));
        Ok(Subscription::new(rx, ()))
    }
}
