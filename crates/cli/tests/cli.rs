//! CLI smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn bookshelf(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bookshelf").unwrap();
    cmd.current_dir(dir.path())
        .env("BOOKSHELF_CONFIG_DIR", dir.path().join("config"))
        .env("BOOKSHELF_DATABASE__PATH", dir.path().join("books.sqlite3"))
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    bookshelf(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("lookup"));
}

#[test]
fn migrate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();

    bookshelf(&dir)
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("applied 1 migration(s)"));

    bookshelf(&dir)
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("applied 0 migration(s)"));

    assert!(dir.path().join("books.sqlite3").exists());
}

#[test]
fn lookup_rejects_malformed_isbn() {
    let dir = tempfile::tempdir().unwrap();
    bookshelf(&dir)
        .args(["lookup", "978-4834000825"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid ISBN"));
}

#[test]
fn lookup_requires_an_isbn() {
    let dir = tempfile::tempdir().unwrap();
    bookshelf(&dir).arg("lookup").assert().failure();
}
