#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use assert_cmd::Command;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use tempfile::TempDir;

/// Scratch data directory plus a preconfigured `taskmaster` command.
pub struct TestDataDir {
    dir: TempDir,
}

impl TestDataDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel_path: &str) -> PathBuf {
        self.dir.path().join(rel_path)
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.file(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read_file(&self, rel_path: &str) -> String {
        fs::read_to_string(self.file(rel_path)).expect("read file")
    }

    /// `taskmaster --data-dir <tmp>` with tracing disabled.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskmaster").expect("binary");
        cmd.env_remove("RUST_LOG")
            .env_remove("TASKMASTER_DIR")
            .arg("--data-dir")
            .arg(self.path());
        cmd
    }

    /// Run with `--json`, require success, and return the envelope.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self
            .cmd()
            .arg("--json")
            .args(args)
            .output()
            .expect("run taskmaster");
        assert!(
            output.status.success(),
            "taskmaster {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("json envelope")
    }

    /// Create a task and return its id.
    pub fn add(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let envelope = self.json(&full);
        envelope["data"]["id"]
            .as_str()
            .expect("task id")
            .to_string()
    }

    pub fn list_titles(&self, args: &[&str]) -> Vec<String> {
        let mut full = vec!["list"];
        full.extend_from_slice(args);
        self.json(&full)["data"]["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .map(|task| task["title"].as_str().expect("title").to_string())
            .collect()
    }
}

/// Clock that advances by a fixed step on every read.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(step: Duration) -> Self {
        Self {
            next: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            step,
        }
    }

    /// A clock that never moves.
    pub fn frozen() -> Self {
        Self::new(Duration::zero())
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap();
        let current = *next;
        *next = current + self.step;
        current
    }
}
