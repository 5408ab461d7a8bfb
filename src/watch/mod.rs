// src/watch/mod.rs

//! Filesystem watching: event sources, path matching, debouncing and event
//! admission for watch jobs.

pub mod debounce;
pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod source;

pub use debounce::{DebounceState, Debouncer};
pub use event_handler::triggers_for_event;
pub use path_utils::WatchRoot;
pub use patterns::Matchers;
pub use source::{EventSource, NotifySource, RawEvent, RawKind, SourceError, SourceItem, Subscription};
