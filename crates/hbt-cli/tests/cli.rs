use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hbt(cache: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hbt").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("HBT_PORT")
        .env("HBT_CACHE_PATH", cache.path());
    cmd
}

#[test]
fn track_then_hint_without_daemon() {
    let cache = TempDir::new().unwrap();

    for cmd in ["cargo test", "cargo test", "cargo build"] {
        hbt(&cache)
            .args(["cli", "track", "1", "/home/me/app", cmd])
            .assert()
            .success()
            .stdout("");
    }
    assert!(cache.path().join(".hbtcache").exists());

    hbt(&cache)
        .args(["cli", "hint", "1", "/home/me/app"])
        .assert()
        .success()
        .stdout("cargo test");
}

#[test]
fn hint_with_hyphenated_command() {
    let cache = TempDir::new().unwrap();

    hbt(&cache)
        .args(["cli", "track", "1", "/srv", "ls -la"])
        .assert()
        .success();
    hbt(&cache)
        .args(["cli", "hint", "2", "/srv"])
        .assert()
        .success()
        .stdout("ls -la");
}

#[test]
fn hint_on_empty_cache_prints_sentinel() {
    let cache = TempDir::new().unwrap();

    hbt(&cache)
        .args(["cli", "hint", "1", "/nowhere"])
        .assert()
        .success()
        .stdout(hbt_graph::NO_SUGGESTION);
}

#[test]
fn wrong_arity_fails() {
    let cache = TempDir::new().unwrap();

    hbt(&cache)
        .args(["cli", "track", "1", "/srv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "wrong number of arguments for track, expected 4, got 3",
        ));
}

#[test]
fn unknown_command_fails() {
    let cache = TempDir::new().unwrap();

    hbt(&cache)
        .args(["cli", "stop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command"));
}

#[test]
fn corrupt_cache_fails() {
    let cache = TempDir::new().unwrap();
    std::fs::write(cache.path().join(".hbtcache"), "not json").unwrap();

    hbt(&cache)
        .args(["cli", "hint", "1", "/srv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load cache"));
}

#[test]
fn prune_reports_removed_directories() {
    let cache = TempDir::new().unwrap();

    hbt(&cache)
        .args(["cli", "track", "1", "/a", "cd src"])
        .assert()
        .success();
    hbt(&cache)
        .args(["cli", "track", "1", "/a/src", "make"])
        .assert()
        .success();

    hbt(&cache)
        .arg("prune")
        .assert()
        .success()
        .stdout(predicate::str::contains("pruned 1 of 2 directories"));

    hbt(&cache)
        .args(["cli", "hint", "1", "/a/src"])
        .assert()
        .success()
        .stdout("make");
}

#[test]
fn remote_command_without_daemon_fails() {
    let cache = TempDir::new().unwrap();
    // Reserve a port and release it so nothing is listening there.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    hbt(&cache)
        .args(["--port", &port.to_string(), "hint", "1", "/srv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to connect"));
}
