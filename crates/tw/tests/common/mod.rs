//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Output};

use tw::service::IssueService;
use tw::storage::{create_storage, StorageBackend};

/// Service over a SQLite file inside `dir`, prefix `TW`.
pub async fn sqlite_service(dir: &Path) -> IssueService {
    let storage = create_storage(StorageBackend::Sqlite(dir.join("tw.db")))
        .await
        .expect("open sqlite store");
    IssueService::new(storage, "TW")
}

/// Run the tw binary against a database in `dir`, isolated from the
/// caller's configuration.
pub fn run_tw_in_dir(dir: &Path, args: &[&str]) -> Output {
    let db = dir.join("tw.db");
    Command::new(env!("CARGO_BIN_EXE_tw"))
        .arg("--db")
        .arg(&db)
        .args(["--prefix", "TW"])
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1")
        .env_remove("TW_CONFIG")
        .env_remove("TW_BACKEND")
        .env_remove("TW_DB_PATH")
        .output()
        .expect("Failed to execute tw binary")
}

/// Stdout of a run that must succeed.
pub fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "tw failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}
