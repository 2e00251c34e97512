use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A `probe` command whose data, cache and config live under `home`.
fn probe(home: &TempDir) -> Command {
    let root = home.path();
    let mut cmd = Command::cargo_bin("probe").unwrap();
    cmd.env("HOME", root)
        .env("XDG_CONFIG_HOME", root.join("config"))
        .env("XDG_DATA_HOME", root.join("data"))
        .env("XDG_CACHE_HOME", root.join("cache"))
        .env("XDG_STATE_HOME", root.join("state"))
        .env_remove("IDEAPROBE_RESEARCH_URL")
        .env_remove("IDEAPROBE_API_BASE")
        .env_remove("IDEAPROBE_API_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    probe(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ask")
                .and(predicate::str::contains("history"))
                .and(predicate::str::contains("files"))
                .and(predicate::str::contains("config")),
        );
}

#[test]
fn blank_query_is_rejected() {
    let home = TempDir::new().unwrap();
    probe(&home)
        .args(["ask", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Query must not be empty"));

    // Nothing was opened, so no database was created.
    assert!(!home.path().join("data/ideaprobe/ideaprobe.db").exists());
}

#[test]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    probe(&home)
        .args(["config", "set", "research_url", "wss://research.example.com/ws"])
        .assert()
        .success();

    probe(&home)
        .args(["config", "get", "research_url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wss://research.example.com/ws"));
}

#[test]
fn config_rejects_bad_values() {
    let home = TempDir::new().unwrap();
    probe(&home)
        .args(["config", "set", "research_url", "http://not-a-socket"])
        .assert()
        .failure();

    probe(&home)
        .args(["config", "set", "favorite_color", "blue"])
        .assert()
        .failure();
}

#[test]
fn history_on_fresh_install() {
    let home = TempDir::new().unwrap();
    probe(&home)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversations yet"));
}

#[test]
fn files_report_tracks_status() {
    let home = TempDir::new().unwrap();
    probe(&home)
        .args(["files", "report", "file-1", "--job", "extraction", "extracting"])
        .assert()
        .success();

    probe(&home)
        .args(["files", "status", "file-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("extracting"));
}
