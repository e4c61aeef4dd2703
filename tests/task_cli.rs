mod support;

use chrono::DateTime;
use predicates::str::contains;
use support::TestDataDir;

#[test]
fn add_search_sort_delete_flow() {
    let data = TestDataDir::new();
    let milk = data.add(&["Buy milk", "--priority", "low"]);
    let taxes = data.add(&["File taxes", "--priority", "high", "--due", "2024-04-15"]);
    assert!(milk.starts_with("task_"));
    assert_ne!(milk, taxes);

    assert_eq!(data.list_titles(&["--search", "tax"]), vec!["File taxes"]);
    assert_eq!(
        data.list_titles(&["--sort", "priority"]),
        vec!["File taxes", "Buy milk"]
    );

    data.cmd().args(["delete", milk.as_str()]).assert().success();
    assert_eq!(data.list_titles(&[]), vec!["File taxes"]);
}

#[test]
fn snapshot_is_versioned_on_disk() {
    let data = TestDataDir::new();
    data.add(&["Water plants"]);

    let raw = data.read_file("taskmaster_tasks.json");
    let snapshot: serde_json::Value = serde_json::from_str(&raw).expect("snapshot json");
    assert_eq!(snapshot["schemaVersion"], "taskmaster.tasks.v1");
    assert_eq!(snapshot["tasks"][0]["title"], "Water plants");
    assert_eq!(snapshot["tasks"][0]["priority"], "medium");
    assert_eq!(snapshot["tasks"][0]["status"], "active");
    assert_eq!(snapshot["tasks"][0]["completed"], false);
}

#[test]
fn list_envelope_reports_view_and_overdue() {
    let data = TestDataDir::new();
    data.add(&["File taxes", "--priority", "high", "--due", "2024-04-15"]);

    let envelope = data.json(&["list"]);
    assert_eq!(envelope["schema_version"], "taskmaster.v1");
    assert_eq!(envelope["command"], "list");
    assert_eq!(envelope["status"], "success");
    assert_eq!(envelope["data"]["total"], 1);
    assert_eq!(envelope["data"]["visible"], 1);
    assert_eq!(envelope["data"]["sort_by"], "createdDate");
    assert_eq!(envelope["data"]["filter"]["status"], "all");
    assert_eq!(envelope["data"]["tasks"][0]["overdue"], true);
}

#[test]
fn human_list_formats_due_dates() {
    let data = TestDataDir::new();
    data.add(&["File taxes", "--due", "2024-04-15", "--category", "finance"]);

    data.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("File taxes (due: Apr 15, 2024, overdue) (category: finance)"));
}

#[test]
fn toggle_completes_and_reopens() {
    let data = TestDataDir::new();
    let id = data.add(&["Walk dog"]);

    let completed = data.json(&["toggle", id.as_str()]);
    assert_eq!(completed["data"]["status"], "completed");
    assert_eq!(completed["data"]["completed"], true);

    let reopened = data.json(&["toggle", id.as_str()]);
    assert_eq!(reopened["data"]["status"], "active");
    assert_eq!(reopened["data"]["completed"], false);
    let stamp = |value: &serde_json::Value| {
        DateTime::parse_from_rfc3339(value["data"]["updatedAt"].as_str().expect("updatedAt"))
            .expect("rfc3339")
    };
    assert!(stamp(&reopened) > stamp(&completed));
}

#[test]
fn edit_patches_and_clears_fields() {
    let data = TestDataDir::new();
    let id = data.add(&[
        "Draft report",
        "--description",
        "first pass",
        "--category",
        "work",
    ]);

    let edited = data.json(&[
        "edit",
        id.as_str(),
        "--title",
        "Final report",
        "--clear-description",
        "--priority",
        "high",
        "--status",
        "archived",
    ]);
    let task = &edited["data"];
    assert_eq!(task["id"], id.as_str());
    assert_eq!(task["title"], "Final report");
    assert_eq!(task["priority"], "high");
    assert_eq!(task["category"], "work");
    assert_eq!(task["status"], "archived");
    assert_eq!(task["completed"], false);
    assert!(task.get("description").is_none());
}

#[test]
fn edit_without_changes_is_a_user_error() {
    let data = TestDataDir::new();
    let id = data.add(&["Nothing to change"]);
    data.cmd()
        .args(["edit", id.as_str()])
        .assert()
        .code(2)
        .stderr(contains("nothing to edit"));
}

#[test]
fn invalid_input_reports_field_errors() {
    let data = TestDataDir::new();
    data.cmd()
        .args(["add", "   "])
        .assert()
        .code(2)
        .stderr(contains("Title is required"));

    data.cmd()
        .args(["add", "Call mom", "--priority", "urgent", "--due", "someday"])
        .assert()
        .code(2)
        .stderr(contains("Invalid priority"))
        .stderr(contains("Invalid date format"));

    assert!(data.list_titles(&[]).is_empty());
}

#[test]
fn invalid_input_json_lists_every_field() {
    let data = TestDataDir::new();
    let output = data
        .cmd()
        .args(["--json", "add", "", "--priority", "urgent"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));

    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["command"], "add");
    assert_eq!(envelope["error"]["kind"], "user_error");
    assert_eq!(envelope["error"]["details"]["errors"]["title"], "Title is required");
    assert_eq!(envelope["error"]["details"]["errors"]["priority"], "Invalid priority");
}

#[test]
fn unknown_task_exits_with_not_found() {
    let data = TestDataDir::new();
    for command in ["toggle", "delete"] {
        data.cmd()
            .args([command, "task_missing"])
            .assert()
            .code(3)
            .stderr(contains("Task not found: task_missing"))
            .stderr(contains("hint: taskmaster list"));
    }

    let output = data
        .cmd()
        .args(["--json", "edit", "task_missing", "--title", "x"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(3));
    let envelope: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(envelope["error"]["kind"], "not_found");
    assert_eq!(envelope["error"]["details"]["id"], "task_missing");
}

#[test]
fn bulk_actions_report_counts_and_unknown_ids() {
    let data = TestDataDir::new();
    let a = data.add(&["A"]);
    let b = data.add(&["B"]);
    let c = data.add(&["C"]);

    let completed = data.json(&["bulk", "complete", a.as_str(), b.as_str(), "task_nope"]);
    assert_eq!(completed["command"], "bulk complete");
    assert_eq!(completed["data"]["action"], "complete");
    assert_eq!(completed["data"]["requested"], 3);
    assert_eq!(completed["data"]["affected"], 2);
    assert_eq!(completed["data"]["unknown"][0], "task_nope");

    assert_eq!(data.list_titles(&["--status", "completed"]).len(), 2);

    let archived = data.json(&["bulk", "archive", c.as_str()]);
    assert_eq!(archived["data"]["affected"], 1);
    assert_eq!(data.list_titles(&["--status", "archived"]), vec!["C"]);

    let deleted = data.json(&["bulk", "delete", a.as_str(), b.as_str(), c.as_str()]);
    assert_eq!(deleted["data"]["affected"], 3);
    assert!(data.list_titles(&[]).is_empty());
}

#[test]
fn bad_list_arguments_are_user_errors() {
    let data = TestDataDir::new();
    data.cmd()
        .args(["list", "--sort", "title"])
        .assert()
        .code(2)
        .stderr(contains("invalid sort key"));
    data.cmd()
        .args(["list", "--status", "done"])
        .assert()
        .code(2)
        .stderr(contains("invalid status filter"));
}

#[test]
fn corrupt_snapshot_blocks_writes_but_not_reads() {
    let data = TestDataDir::new();
    data.write_file("taskmaster_tasks.json", "[]");

    data.cmd()
        .args(["add", "Should not clobber"])
        .assert()
        .code(4)
        .stderr(contains("refusing to overwrite unreadable task data"))
        .stderr(contains("hint: inspect or move aside the task file"));
    assert_eq!(data.read_file("taskmaster_tasks.json"), "[]");

    data.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("warning: "))
        .stdout(contains("stored tasks ignored"));
}

#[test]
fn config_sets_default_view() {
    let data = TestDataDir::new();
    let done = data.add(&["Done already"]);
    data.add(&["Still open"]);
    data.cmd().args(["toggle", done.as_str()]).assert().success();

    data.write_file("config.toml", "[view]\nstatus = \"active\"\nsort_by = \"priority\"\n");
    assert_eq!(data.list_titles(&[]), vec!["Still open"]);
    assert_eq!(data.list_titles(&["--status", "all"]).len(), 2);
}

#[test]
fn config_can_rename_the_task_slot() {
    let data = TestDataDir::new();
    data.write_file("config.toml", "[storage]\ntasks_key = \"work\"\n");
    data.add(&["Quarterly review"]);
    assert!(data.file("work.json").exists());
    assert!(!data.file("taskmaster_tasks.json").exists());
}

#[test]
fn invalid_config_is_a_user_error() {
    let data = TestDataDir::new();
    data.write_file("config.toml", "[storage]\nlock_timeout_ms = 0\n");
    data.cmd()
        .arg("list")
        .assert()
        .code(2)
        .stderr(contains("Invalid configuration"));
}

#[test]
fn events_file_receives_json_lines() {
    let data = TestDataDir::new();
    let events = data.file("events.jsonl");
    let id = data.add(&["Observed"]);

    data.cmd()
        .arg("--events")
        .arg(&events)
        .args(["toggle", id.as_str()])
        .assert()
        .success();

    let contents = data.read_file("events.jsonl");
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("event line"))
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["schema_version"], "taskmaster.event.v1");
    assert_eq!(lines[0]["event"], "task_completion_toggled");
    assert_eq!(lines[0]["task_ids"][0], id.as_str());
    assert_eq!(lines[0]["visible"], 1);
}

#[test]
fn events_to_stdout_replace_human_output() {
    let data = TestDataDir::new();
    let output = data
        .cmd()
        .args(["--events", "-", "add", "Streamed"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    let event: serde_json::Value = serde_json::from_str(lines[0]).expect("event json");
    assert_eq!(event["event"], "task_created");
}

#[test]
fn data_dir_can_come_from_environment() {
    let data = TestDataDir::new();
    let mut cmd = assert_cmd::Command::cargo_bin("taskmaster").expect("binary");
    cmd.env_remove("RUST_LOG")
        .env("TASKMASTER_DIR", data.path())
        .args(["add", "From env"])
        .assert()
        .success()
        .stdout(contains("Task created"));
    assert!(data.file("taskmaster_tasks.json").exists());
}

#[test]
fn quiet_suppresses_human_output() {
    let data = TestDataDir::new();
    data.cmd()
        .args(["--quiet", "add", "Silent"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn dark_mode_preference_round_trips() {
    let data = TestDataDir::new();
    let shown = data.json(&["prefs", "show"]);
    assert_eq!(shown["command"], "prefs show");
    assert_eq!(shown["data"]["darkMode"], false);

    let toggled = data.json(&["prefs", "dark-mode", "toggle"]);
    assert_eq!(toggled["data"]["darkMode"], true);

    let stored: serde_json::Value =
        serde_json::from_str(&data.read_file("ui-storage.json")).expect("prefs json");
    assert_eq!(stored["state"]["darkMode"], true);

    data.cmd()
        .args(["prefs", "dark-mode", "off"])
        .assert()
        .success()
        .stdout(contains("Dark mode: off"));

    data.cmd()
        .args(["prefs", "dark-mode", "maybe"])
        .assert()
        .code(2);
}
