use clap::Parser;
use neardupe::cli::Cli;
use neardupe::duplicates::Document;
use neardupe::error::ExitCode;
use neardupe::run_app;
use neardupe::store::{DupeStore, SqliteStore};
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["neardupe", "-q"];
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

fn seed_canonical_pair(db: &Path) {
    let store = SqliteStore::open(db).unwrap();
    for id in [1, 2] {
        let doc = Document::new(id, format!("/scans/{id}.png"), 500, "image").with_canonical("pixels");
        store.insert_document(&doc).unwrap();
    }
}

#[test]
fn test_group_then_list() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("dupes.db");
    let config = dir.path().join("missing.toml");
    seed_canonical_pair(&db);
    let (db, config) = (db.to_str().unwrap(), config.to_str().unwrap());

    let code = run(&["--config", config, "group", "--database", db, "--output", "json"]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let code = run(&["--config", config, "groups", "--database", db]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let store = SqliteStore::open(Path::new(db)).unwrap();
    assert_eq!(store.count_groups().unwrap(), 1);
}

#[test]
fn test_empty_database_reports_no_groups() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("empty.db");
    let config = dir.path().join("missing.toml");
    let (db, config) = (db.to_str().unwrap(), config.to_str().unwrap());

    assert_eq!(
        run(&["--config", config, "group", "--database", db]).unwrap(),
        ExitCode::NoGroups
    );
    assert_eq!(
        run(&["--config", config, "groups", "--database", db, "--output", "json"]).unwrap(),
        ExitCode::NoGroups
    );
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "partial_threshold = 3.0").unwrap();
    let db = dir.path().join("dupes.db");

    let err = run(&[
        "--config",
        config.to_str().unwrap(),
        "group",
        "--database",
        db.to_str().unwrap(),
    ])
    .unwrap_err();
    assert!(format!("{err:#}").contains("partial_threshold"));
}

#[test]
fn test_cli_flag_repairs_out_of_range_file_value() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "visual_threshold = 70").unwrap();
    let db = dir.path().join("dupes.db");
    seed_canonical_pair(&db);

    let code = run(&[
        "--config",
        config.to_str().unwrap(),
        "group",
        "--database",
        db.to_str().unwrap(),
        "--visual-threshold",
        "8",
    ])
    .unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_fingerprint_command() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("note.txt");
    std::fs::write(&file, "a short note about near duplicate detection").unwrap();
    let config = dir.path().join("missing.toml");

    let code = run(&[
        "--config",
        config.to_str().unwrap(),
        "fingerprint",
        file.to_str().unwrap(),
        "--output",
        "json",
    ])
    .unwrap();
    assert_eq!(code, ExitCode::Success);
}
