#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ghost::config::{ServerSpec, WatchSpec};
use ghost::jobs::JobContext;
use ghost::trigger::EventKind;
use ghost::watch::Matchers;

use crate::fake_source::FakeEventSource;
use crate::memory_log::MemoryLog;

/// A job context wired to in-memory collaborators.
pub fn fake_context() -> (JobContext, FakeEventSource, MemoryLog) {
    let source = FakeEventSource::new();
    let log = MemoryLog::new();
    let ctx = JobContext::new(Arc::new(log.clone()), Arc::new(source.clone()));
    (ctx, source, log)
}

/// Builder for a `WatchSpec` running `sh -c <script>` in `root`.
pub struct WatchSpecBuilder {
    spec: WatchSpec,
}

impl WatchSpecBuilder {
    pub fn new(name: &str, root: &Path, script: &str) -> Self {
        Self {
            spec: WatchSpec {
                name: name.to_string(),
                watch_root: root.to_path_buf(),
                single_file: None,
                matchers: Matchers::default(),
                events: BTreeSet::from([EventKind::Change]),
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                command_display: script.to_string(),
                cwd: root.to_path_buf(),
                env: BTreeMap::new(),
                restart: false,
                run_on_start: false,
                debounce: Duration::from_millis(50),
                restart_delay: Duration::from_millis(50),
                kill_timeout: Duration::from_secs(2),
            },
        }
    }

    pub fn matches(mut self, patterns: &[&str]) -> Self {
        self.spec.matchers = Matchers::new(patterns).expect("valid test patterns");
        self
    }

    pub fn events(mut self, events: &[EventKind]) -> Self {
        self.spec.events = events.iter().copied().collect();
        self
    }

    pub fn restart(mut self, val: bool) -> Self {
        self.spec.restart = val;
        self
    }

    pub fn run_on_start(mut self, val: bool) -> Self {
        self.spec.run_on_start = val;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.spec.debounce = Duration::from_millis(ms);
        self
    }

    pub fn kill_timeout_ms(mut self, ms: u64) -> Self {
        self.spec.kill_timeout = Duration::from_millis(ms);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.spec.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> WatchSpec {
        self.spec
    }
}

/// Builder for a `ServerSpec` running `sh -c <script>` with piped output.
pub struct ServerSpecBuilder {
    spec: ServerSpec,
}

impl ServerSpecBuilder {
    pub fn new(name: &str, log_path: impl Into<PathBuf>, script: &str) -> Self {
        let log_path = log_path.into();
        let cwd = log_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            spec: ServerSpec {
                name: name.to_string(),
                program: "sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                command_display: script.to_string(),
                cwd,
                env: BTreeMap::new(),
                restart: false,
                restart_delay: Duration::from_millis(100),
                kill_timeout: Duration::from_secs(2),
                pty: false,
                log_path,
            },
        }
    }

    pub fn restart(mut self, val: bool) -> Self {
        self.spec.restart = val;
        self
    }

    pub fn restart_delay_ms(mut self, ms: u64) -> Self {
        self.spec.restart_delay = Duration::from_millis(ms);
        self
    }

    pub fn kill_timeout_ms(mut self, ms: u64) -> Self {
        self.spec.kill_timeout = Duration::from_millis(ms);
        self
    }

    pub fn pty(mut self, val: bool) -> Self {
        self.spec.pty = val;
        self
    }

    pub fn build(self) -> ServerSpec {
        self.spec
    }
}
