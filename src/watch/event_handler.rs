// src/watch/event_handler.rs

//! Event admission: turn one raw notification into the triggers a watch job
//! should buffer.

use tracing::trace;

use crate::config::WatchSpec;
use crate::trigger::{EventKind, Trigger};
use crate::watch::path_utils::WatchRoot;
use crate::watch::source::{RawEvent, RawKind};

/// Event kinds a structural change may represent.
///
/// Sources do not say whether the path was a file or a directory, so both
/// variants are produced and the allow-set decides.
pub fn kinds_for(kind: RawKind) -> &'static [EventKind] {
    match kind {
        RawKind::Create => &[EventKind::Add, EventKind::AddDir],
        RawKind::Write => &[EventKind::Change],
        RawKind::Remove => &[EventKind::Unlink, EventKind::UnlinkDir],
        RawKind::Rename => &[EventKind::Rename, EventKind::RenameDir],
    }
}

/// Triggers for `raw`, or nothing when the path is outside the root, fails
/// every matcher, or maps only to kinds the watcher does not allow.
pub fn triggers_for_event(spec: &WatchSpec, root: &WatchRoot, raw: &RawEvent) -> Vec<Trigger> {
    let Some(rel) = root.relative_str(&raw.path) else {
        trace!(path = ?raw.path, root = ?root.path(), "event outside watch root");
        return Vec::new();
    };

    if !spec.matchers.matches(&rel) {
        trace!(rel = %rel, "event path did not match");
        return Vec::new();
    }

    kinds_for(raw.kind)
        .iter()
        .copied()
        .filter(|kind| spec.allows(*kind))
        .map(|kind| Trigger::new(kind, rel.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::watch::Matchers;

    fn spec(patterns: &[&str], events: &[EventKind]) -> WatchSpec {
        WatchSpec {
            name: "t".into(),
            watch_root: PathBuf::from("/w"),
            single_file: None,
            matchers: Matchers::new(patterns.iter().copied()).unwrap(),
            events: events.iter().copied().collect::<BTreeSet<_>>(),
            program: "true".into(),
            args: Vec::new(),
            command_display: "true".into(),
            cwd: PathBuf::from("/w"),
            env: BTreeMap::new(),
            restart: false,
            run_on_start: false,
            debounce: Duration::from_millis(10),
            restart_delay: Duration::from_millis(10),
            kill_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn write_becomes_change_with_relative_path() {
        let spec = spec(&["**/*.rs"], &[EventKind::Change]);
        let root = WatchRoot::new("/w");
        let out = triggers_for_event(&spec, &root, &RawEvent::new("/w/src/a.rs", RawKind::Write));
        assert_eq!(out, vec![Trigger::new(EventKind::Change, "src/a.rs")]);
    }

    #[test]
    fn create_expands_to_both_kinds_filtered_by_allow_set() {
        let root = WatchRoot::new("/w");
        let raw = RawEvent::new("/w/x", RawKind::Create);

        let both = spec(&[], &EventKind::FILESYSTEM);
        assert_eq!(
            triggers_for_event(&both, &root, &raw),
            vec![
                Trigger::new(EventKind::Add, "x"),
                Trigger::new(EventKind::AddDir, "x"),
            ]
        );

        let files_only = spec(&[], &[EventKind::Add]);
        assert_eq!(
            triggers_for_event(&files_only, &root, &raw),
            vec![Trigger::new(EventKind::Add, "x")]
        );
    }

    #[test]
    fn disallowed_kind_produces_nothing() {
        let spec = spec(&[], &[EventKind::Change]);
        let root = WatchRoot::new("/w");
        let raw = RawEvent::new("/w/gone.txt", RawKind::Remove);
        assert!(triggers_for_event(&spec, &root, &raw).is_empty());
    }

    #[test]
    fn unmatched_or_outside_paths_produce_nothing() {
        let spec = spec(&["*.txt"], &[EventKind::Change]);
        let root = WatchRoot::new("/w");
        for path in ["/w/a.json", "/w/sub/a.txt", "/elsewhere/a.txt"] {
            let raw = RawEvent::new(path, RawKind::Write);
            assert!(triggers_for_event(&spec, &root, &raw).is_empty(), "{path}");
        }
    }
}
