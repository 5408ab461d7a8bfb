// src/watch/source.rs

//! Filesystem event sources.
//!
//! A watch job asks an [`EventSource`] for a [`Subscription`] on its root and
//! reads raw `(absolute path, kind)` notifications from it until the job is
//! closed. Production uses [`NotifySource`]; tests plug in their own source.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind as NotifyKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::errors::{GhostError, Result};

/// Structural kind of a raw notification, before file/dir expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Create,
    Write,
    Remove,
    Rename,
}

/// One raw notification for one absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: RawKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: RawKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// The source failed mid-subscription; the consuming job stops watching.
#[derive(Debug, Clone, Error)]
#[error("event source error: {0}")]
pub struct SourceError(pub String);

pub type SourceItem = std::result::Result<RawEvent, SourceError>;

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SourceItem>,
    _guard: Box<dyn Send>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl Subscription {
    /// Wrap a channel; `guard` is kept alive for as long as the subscription.
    pub fn new(events: mpsc::UnboundedReceiver<SourceItem>, guard: impl Send + 'static) -> Self {
        Self {
            events,
            _guard: Box::new(guard),
        }
    }

    /// Next notification, or `None` once the source has closed.
    pub async fn recv(&mut self) -> Option<SourceItem> {
        self.events.recv().await
    }
}

/// Subscription API consumed by watch jobs.
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Start delivering notifications for everything under `root`.
    fn subscribe(&self, root: &Path) -> Result<Subscription>;
}

/// `notify`-backed recursive watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

impl EventSource for NotifySource {
    fn subscribe(&self, root: &Path) -> Result<Subscription> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<SourceItem>();

        let subscribe_err = |e: notify::Error| GhostError::Subscribe {
            root: root.to_path_buf(),
            source: e.into(),
        };

        // Closure called synchronously by notify whenever an event arrives.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for raw in raw_events(event) {
                        // Receiver gone means the job already unsubscribed.
                        let _ = event_tx.send(Ok(raw));
                    }
                }
                Err(err) => {
                    let _ = event_tx.send(Err(SourceError(err.to_string())));
                }
            },
            Config::default(),
        )
        .map_err(subscribe_err)?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(subscribe_err)?;

        info!("file watcher started on {:?}", root);

        Ok(Subscription::new(event_rx, watcher))
    }
}

/// Map a notify event onto one [`RawEvent`] per affected path.
fn raw_events(event: Event) -> Vec<RawEvent> {
    let Some(kind) = raw_kind(&event.kind) else {
        return Vec::new();
    };
    event
        .paths
        .into_iter()
        .map(|path| RawEvent { path, kind })
        .collect()
}

fn raw_kind(kind: &NotifyKind) -> Option<RawKind> {
    match kind {
        NotifyKind::Create(_) => Some(RawKind::Create),
        NotifyKind::Remove(_) => Some(RawKind::Remove),
        NotifyKind::Modify(ModifyKind::Name(_)) => Some(RawKind::Rename),
        NotifyKind::Modify(ModifyKind::Metadata(_)) => None,
        NotifyKind::Modify(_) => Some(RawKind::Write),
        NotifyKind::Access(_) | NotifyKind::Any | NotifyKind::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RenameMode};

    #[test]
    fn notify_kinds_map_to_raw_kinds() {
        assert_eq!(raw_kind(&NotifyKind::Create(CreateKind::File)), Some(RawKind::Create));
        assert_eq!(
            raw_kind(&NotifyKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(RawKind::Write)
        );
        assert_eq!(
            raw_kind(&NotifyKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(RawKind::Rename)
        );
        assert_eq!(
            raw_kind(&NotifyKind::Modify(ModifyKind::Metadata(MetadataKind::Any))),
            None
        );
        assert_eq!(raw_kind(&NotifyKind::Any), None);
    }

    #[test]
    fn one_raw_event_per_path() {
        let event = Event::new(NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/r/old.txt"))
            .add_path(PathBuf::from("/r/new.txt"));
        let raws = raw_events(event);
        assert_eq!(
            raws,
            vec![
                RawEvent::new("/r/old.txt", RawKind::Rename),
                RawEvent::new("/r/new.txt", RawKind::Rename),
            ]
        );
    }
}
