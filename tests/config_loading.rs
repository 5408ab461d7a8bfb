// tests/config_loading.rs

use std::error::Error;
use std::fs;
use std::time::Duration;

use ghost::config::load_and_validate;
use ghost::trigger::EventKind;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn loads_watchers_and_servers_with_defaults() -> TestResult {
    let dir = TempDir::new()?;
    let project = dir.path().join("project");
    fs::create_dir_all(&project)?;
    let config_path = dir.path().join("ghost.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[defaults]
debounce_ms = 75
events = ["change", "add"]

[[watchers]]
name = "tests"
path = "{project}"
command = "cargo test --quiet"
match = ["**/*.rs"]
matches = "Cargo.toml"

[[watchers]]
path = "{project}"
command = ["make", "serve"]
restart = true
events = ["change"]
debounce_ms = 0

[watchers.env]
PORT = 8080

[[servers]]
name = "api"
command = "npm run dev"
cwd = "{project}"
log_path = "{log}"
restart_delay_ms = 500
pty = false
"#,
            project = project.display(),
            log = dir.path().join("api.log").display(),
        ),
    )?;

    let config = load_and_validate(&config_path)?;
    assert_eq!(config.watchers.len(), 2);
    assert_eq!(config.servers.len(), 1);

    let tests = &config.watchers[0];
    assert_eq!(tests.name, "tests");
    assert_eq!(tests.watch_root, project);
    assert_eq!(tests.program, "cargo");
    assert_eq!(tests.args, vec!["test", "--quiet"]);
    assert_eq!(tests.cwd, project);
    assert_eq!(tests.matchers.patterns(), ["**/*.rs", "Cargo.toml"]);
    assert!(tests.matchers.matches("src/deep/lib.rs"));
    assert!(!tests.matchers.matches("README.md"));
    assert_eq!(tests.debounce, Duration::from_millis(75));
    assert!(tests.allows(EventKind::Add));
    assert!(!tests.restart);
    assert!(!tests.run_on_start);

    let serve = &config.watchers[1];
    assert_eq!(serve.name, "watcher-2");
    assert!(serve.restart);
    assert!(serve.run_on_start);
    assert_eq!(serve.debounce, Duration::ZERO);
    assert_eq!(serve.events.len(), 1);
    assert_eq!(serve.env["PORT"], "8080");

    let api = &config.servers[0];
    assert_eq!(api.name, "api");
    assert_eq!(api.program, "npm");
    assert!(api.restart);
    assert!(!api.pty);
    assert_eq!(api.restart_delay, Duration::from_millis(500));
    assert_eq!(api.log_path, dir.path().join("api.log"));
    Ok(())
}

#[test]
fn single_file_watch_uses_parent_dir_and_basename() -> TestResult {
    let dir = TempDir::new()?;
    let file = dir.path().join("notes.md");
    fs::write(&file, "# notes")?;
    let config_path = dir.path().join("ghost.toml");
    fs::write(
        &config_path,
        format!(
            "[[watchers]]\npath = \"{}\"\ncommand = \"echo hi\"\n",
            file.display()
        ),
    )?;

    let config = load_and_validate(&config_path)?;
    let w = &config.watchers[0];
    assert_eq!(w.watch_root, dir.path());
    assert_eq!(w.single_file.as_deref(), Some("notes.md"));
    assert!(w.matchers.matches("notes.md"));
    assert!(!w.matchers.matches("other.md"));
    Ok(())
}

#[test]
fn errors_name_the_offending_entry() -> TestResult {
    let dir = TempDir::new()?;
    let config_path = dir.path().join("ghost.toml");

    fs::write(&config_path, "[[watchers]]\ncommand = \"echo hi\"\n")?;
    let err = load_and_validate(&config_path).err().ok_or("missing path")?;
    assert!(err.to_string().contains("watchers[0]"));
    assert!(err.to_string().contains("\"path\" must be provided"));

    fs::write(
        &config_path,
        format!(
            "[[servers]]\nname = \"x\"\ncommand = \"\"\nlog_path = \"{}\"\n",
            dir.path().join("x.log").display()
        ),
    )?;
    let err = load_and_validate(&config_path).err().ok_or("empty command")?;
    assert!(err.to_string().contains("servers[0]"));

    fs::write(&config_path, "watchers = 3")?;
    assert!(load_and_validate(&config_path).is_err());

    assert!(load_and_validate(dir.path().join("missing.toml")).is_err());
    Ok(())
}

#[test]
fn server_cwd_defaults_to_the_process_directory() -> TestResult {
    let dir = TempDir::new()?;
    let config_path = dir.path().join("ghost.toml");
    fs::write(
        &config_path,
        format!(
            "[[servers]]\nname = \"api\"\ncommand = \"npm start\"\nlog_path = \"{}\"\n",
            dir.path().join("api.log").display()
        ),
    )?;

    let config = load_and_validate(&config_path)?;
    let api = &config.servers[0];
    assert!(api.cwd.is_absolute());
    assert_eq!(api.cwd, std::env::current_dir()?);
    Ok(())
}

#[test]
fn empty_file_is_a_valid_config() -> TestResult {
    let dir = TempDir::new()?;
    let config_path = dir.path().join("ghost.toml");
    fs::write(&config_path, "")?;
    let config = load_and_validate(&config_path)?;
    assert!(config.watchers.is_empty());
    assert!(config.servers.is_empty());
    Ok(())
}
