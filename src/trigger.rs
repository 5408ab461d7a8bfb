// src/trigger.rs

//! Triggers: the immutable "why did this run start" records.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Kind of change that produced a trigger.
///
/// The first seven variants come from the filesystem; `Startup`, `Manual`
/// and `Restart` are synthetic reasons produced by the jobs themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Add,
    AddDir,
    Change,
    Rename,
    RenameDir,
    Unlink,
    UnlinkDir,
    Startup,
    Manual,
    Restart,
}

impl EventKind {
    /// All kinds a watcher may list in its `events` setting.
    pub const FILESYSTEM: [EventKind; 7] = [
        EventKind::Add,
        EventKind::AddDir,
        EventKind::Change,
        EventKind::Rename,
        EventKind::RenameDir,
        EventKind::Unlink,
        EventKind::UnlinkDir,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::AddDir => "addDir",
            EventKind::Change => "change",
            EventKind::Rename => "rename",
            EventKind::RenameDir => "renameDir",
            EventKind::Unlink => "unlink",
            EventKind::UnlinkDir => "unlinkDir",
            EventKind::Startup => "startup",
            EventKind::Manual => "manual",
            EventKind::Restart => "restart",
        }
    }

    pub fn is_synthetic(self) -> bool {
        matches!(
            self,
            EventKind::Startup | EventKind::Manual | EventKind::Restart
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "add" => EventKind::Add,
            "addDir" => EventKind::AddDir,
            "change" => EventKind::Change,
            "rename" => EventKind::Rename,
            "renameDir" => EventKind::RenameDir,
            "unlink" => EventKind::Unlink,
            "unlinkDir" => EventKind::UnlinkDir,
            "startup" => EventKind::Startup,
            "manual" => EventKind::Manual,
            "restart" => EventKind::Restart,
            other => return Err(format!("unsupported event {other:?}")),
        };
        Ok(kind)
    }
}

/// One qualifying change (or synthetic reason) behind a run.
///
/// Synthetic triggers carry an empty path. Equality on `(event, path)` is
/// the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trigger {
    pub event: EventKind,
    pub path: String,
}

impl Trigger {
    pub fn new(event: EventKind, path: impl Into<String>) -> Self {
        Self {
            event,
            path: path.into(),
        }
    }

    pub fn synthetic(event: EventKind) -> Self {
        Self {
            event,
            path: String::new(),
        }
    }

    pub fn startup() -> Self {
        Self::synthetic(EventKind::Startup)
    }

    pub fn manual() -> Self {
        Self::synthetic(EventKind::Manual)
    }

    pub fn restart() -> Self {
        Self::synthetic(EventKind::Restart)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.event)
        } else {
            write!(f, "{}:{}", self.event, self.path)
        }
    }
}

/// Drop repeated `(event, path)` pairs, keeping first-seen order.
pub fn dedupe_triggers(triggers: Vec<Trigger>) -> Vec<Trigger> {
    if triggers.len() <= 1 {
        return triggers;
    }
    let mut seen = HashSet::with_capacity(triggers.len());
    triggers
        .into_iter()
        .filter(|t| seen.insert((t.event, t.path.clone())))
        .collect()
}

const SUMMARY_LIMIT: usize = 4;

/// Human-readable summary used in job log lines, e.g.
/// `change:a.txt, change:b.txt … (+3 more)`.
pub fn format_triggers(triggers: &[Trigger]) -> String {
    if triggers.is_empty() {
        return "manual trigger".to_string();
    }

    let mut seen = HashSet::new();
    let labels: Vec<String> = triggers
        .iter()
        .map(Trigger::to_string)
        .filter(|label| seen.insert(label.clone()))
        .collect();

    if labels.len() > SUMMARY_LIMIT {
        format!(
            "{} … (+{} more)",
            labels[..SUMMARY_LIMIT].join(", "),
            labels.len() - SUMMARY_LIMIT
        )
    } else {
        labels.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str) -> Trigger {
        Trigger::new(EventKind::Change, path)
    }

    #[test]
    fn dedupe_keeps_first_seen_order() {
        let input = vec![
            change("b.txt"),
            change("a.txt"),
            change("b.txt"),
            Trigger::new(EventKind::Add, "b.txt"),
            change("a.txt"),
        ];
        let out = dedupe_triggers(input);
        assert_eq!(
            out,
            vec![
                change("b.txt"),
                change("a.txt"),
                Trigger::new(EventKind::Add, "b.txt"),
            ]
        );
    }

    #[test]
    fn summary_truncates_after_four_labels() {
        let triggers: Vec<Trigger> = (0..6).map(|i| change(&format!("{i}.txt"))).collect();
        assert_eq!(
            format_triggers(&triggers),
            "change:0.txt, change:1.txt, change:2.txt, change:3.txt … (+2 more)"
        );
    }

    #[test]
    fn synthetic_triggers_print_without_path() {
        assert_eq!(format_triggers(&[Trigger::restart()]), "restart");
        assert_eq!(format_triggers(&[]), "manual trigger");
    }

    #[test]
    fn event_kind_round_trips_through_str() {
        for kind in EventKind::FILESYSTEM {
            assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
            assert!(!kind.is_synthetic());
        }
        assert!("bogus".parse::<EventKind>().is_err());
    }
}
