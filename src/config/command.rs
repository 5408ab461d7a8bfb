// src/config/command.rs

//! Command-line splitting and display quoting for configured commands.

use crate::config::model::StringOrList;
use crate::errors::{GhostError, Result};

/// Resolve `command` + `args` into an argv.
///
/// A string command is split shell-style; an array is taken verbatim (blank
/// entries dropped). When `command` is empty, the first arg is promoted to
/// the program.
pub fn parse_command_spec(
    command: Option<&StringOrList>,
    args: Option<&StringOrList>,
) -> Result<Vec<String>> {
    let mut parts = value_to_parts(command)?;
    let args = value_to_parts(args)?;
    parts.extend(args);
    Ok(parts)
}

fn value_to_parts(value: Option<&StringOrList>) -> Result<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(StringOrList::One(s)) => split_command_line(s),
        Some(StringOrList::Many(items)) => Ok(items
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
    }
}

/// Split a command line on whitespace, honouring single/double quotes and
/// backslash escapes.
pub fn split_command_line(input: &str) -> Result<Vec<String>> {
    let input = input.trim();
    let mut result = Vec::new();
    let mut buf = String::new();
    let mut quote: Option<char> = None;
    let mut escape = false;

    for c in input.chars() {
        if escape {
            buf.push(c);
            escape = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => escape = true,
            (c, Some(q)) if c == q => quote = None,
            (c, Some(_)) => buf.push(c),
            ('"' | '\'', None) => quote = Some(c),
            (' ' | '\t' | '\n' | '\r', None) => {
                if !buf.is_empty() {
                    result.push(std::mem::take(&mut buf));
                }
            }
            (c, None) => buf.push(c),
        }
    }

    if escape {
        buf.push('\\');
    }
    if quote.is_some() {
        return Err(GhostError::config("unterminated quoted string"));
    }
    if !buf.is_empty() {
        result.push(buf);
    }
    Ok(result)
}

/// Join argv for display, double-quoting parts that need it.
pub fn join_display_parts(parts: &[String]) -> String {
    parts
        .iter()
        .map(|part| {
            if needs_quoting(part) {
                format!("{part:?}")
            } else {
                part.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':'))
}

/// Render argv as a single POSIX shell command.
pub fn build_shell_command(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| shell_quote(p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(value: &str) -> String {
    const SPECIAL: &[char] = &[
        ' ', '\t', '\n', '"', '\'', '`', '$', '&', '|', ';', '<', '>', '\\', '!',
    ];
    if value.is_empty() {
        return "''".to_string();
    }
    if !value.contains(SPECIAL) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// `$SHELL`, falling back to `/bin/sh`.
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".to_string())
}

/// Final `(program, args, display)` for a job, wrapping in a login shell
/// when `shell = true`.
pub fn resolve_invocation(parts: Vec<String>, use_shell: bool) -> Result<(String, Vec<String>, String)> {
    if parts.is_empty() {
        return Err(GhostError::config("command must not be empty"));
    }

    if use_shell {
        let script = build_shell_command(&parts);
        return Ok((default_shell(), vec!["-lc".to_string(), script.clone()], script));
    }

    let display = join_display_parts(&parts);
    let mut parts = parts.into_iter();
    let program = parts.next().unwrap_or_default();
    Ok((program, parts.collect(), display))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_quotes_and_escapes() -> Result<()> {
        assert_eq!(
            split_command_line(r#"npm run "dev server" --port=3000 it\'s"#)?,
            strings(&["npm", "run", "dev server", "--port=3000", "it's"])
        );
        assert_eq!(split_command_line("  ")?, Vec::<String>::new());
        Ok(())
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(split_command_line("echo 'oops").is_err());
    }

    #[test]
    fn args_are_appended_and_promoted() -> Result<()> {
        let cmd = StringOrList::One("cargo test".into());
        let args = StringOrList::Many(strings(&["--quiet", ""]));
        assert_eq!(
            parse_command_spec(Some(&cmd), Some(&args))?,
            strings(&["cargo", "test", "--quiet"])
        );

        let only_args = StringOrList::One("make build".into());
        assert_eq!(
            parse_command_spec(None, Some(&only_args))?,
            strings(&["make", "build"])
        );
        Ok(())
    }

    #[test]
    fn display_quotes_unusual_parts() {
        assert_eq!(
            join_display_parts(&strings(&["echo", "hello world", "a/b.txt"])),
            r#"echo "hello world" a/b.txt"#
        );
    }

    #[test]
    fn shell_mode_wraps_in_login_shell() -> Result<()> {
        let (program, args, display) =
            resolve_invocation(strings(&["echo", "it's"]), true)?;
        assert!(!program.is_empty());
        assert_eq!(args[0], "-lc");
        assert_eq!(display, r"echo 'it'\''s'");
        assert_eq!(args[1], display);
        Ok(())
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(resolve_invocation(Vec::new(), false).is_err());
    }
}
