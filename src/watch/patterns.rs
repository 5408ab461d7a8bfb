// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled path matchers for one watcher.
///
/// Patterns are globs evaluated against the root-relative, forward-slash
/// path of a change (e.g. `"src/main.rs"`). `*` and `?` never cross a `/`;
/// `**` does. An empty matcher list accepts every path.
#[derive(Clone)]
pub struct Matchers {
    patterns: Vec<String>,
    set: Option<GlobSet>,
}

impl fmt::Debug for Matchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matchers")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl Default for Matchers {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            set: None,
        }
    }
}

impl Matchers {
    /// Compile the given patterns. Blank entries are skipped.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if patterns.is_empty() {
            return Ok(Self::default());
        }

        let set = build_globset(&patterns)?;
        Ok(Self {
            patterns,
            set: Some(set),
        })
    }

    /// Matchers for a watcher: the configured patterns, or the watched file's
    /// basename when the watcher targets a single file and lists none.
    pub fn for_watcher(patterns: &[String], single_file: Option<&str>) -> Result<Self> {
        let configured = Self::new(patterns)?;
        match single_file {
            Some(file) if configured.is_empty() => Self::new([file]),
            _ => Ok(configured),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if `rel_path` is accepted by any pattern.
    pub fn matches(&self, rel_path: &str) -> bool {
        match &self.set {
            Some(set) => set.is_match(rel_path),
            None => true,
        }
    }
}

/// Build a GlobSet whose `*` stops at path separators.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("compile match pattern {pat:?}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matchers_accept_everything() -> Result<()> {
        let m = Matchers::new(Vec::<String>::new())?;
        assert!(m.matches("anything/at/all.bin"));
        Ok(())
    }

    #[test]
    fn single_star_does_not_cross_directories() -> Result<()> {
        let m = Matchers::new(["*.txt"])?;
        assert!(m.matches("a.txt"));
        assert!(!m.matches("nested/a.txt"));
        assert!(!m.matches("a.json"));
        Ok(())
    }

    #[test]
    fn double_star_crosses_directories() -> Result<()> {
        let m = Matchers::new(["src/**/*.rs"])?;
        assert!(m.matches("src/main.rs"));
        assert!(m.matches("src/a/b/lib.rs"));
        assert!(!m.matches("tests/x.rs"));
        Ok(())
    }

    #[test]
    fn single_file_defaults_to_basename() -> Result<()> {
        let m = Matchers::for_watcher(&[], Some("app.toml"))?;
        assert_eq!(m.patterns(), ["app.toml".to_string()]);
        assert!(m.matches("app.toml"));
        assert!(!m.matches("other.toml"));

        let explicit = Matchers::for_watcher(&["*.toml".to_string()], Some("app.toml"))?;
        assert!(explicit.matches("other.toml"));
        Ok(())
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(Matchers::new(["a[b"]).is_err());
    }
}
