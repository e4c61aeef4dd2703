//! Command output: the JSON envelope and the plain-text rendering.
//!
//! Every command produces one envelope on stdout when `--json` is set:
//!
//! ```text
//! { "schema_version": "taskmaster.v1", "command": "list", "status": "success", "data": {...} }
//! ```
//!
//! Failures use the same envelope with `"status": "error"` and an `error`
//! object in place of `data`.

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};

pub const SCHEMA_VERSION: &str = "taskmaster.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Plain-text form of a command result: a header, labelled fields, one row
/// per listed task, then warnings and suggested follow-up commands.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    fields: Vec<(&'static str, String)>,
    rows: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            fields: Vec::new(),
            rows: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_field(&mut self, label: &'static str, value: impl Into<String>) {
        self.fields.push((label, value.into()));
    }

    pub fn push_row(&mut self, row: impl Into<String>) {
        self.rows.push(row.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_next_step(&mut self, command: impl Into<String>) {
        self.next_steps.push(command.into());
    }

    pub fn render(&self) -> String {
        let mut lines = vec![self.header.clone()];

        let width = self
            .fields
            .iter()
            .map(|(label, _)| label.len() + 1)
            .max()
            .unwrap_or(0);
        for (label, value) in &self.fields {
            lines.push(format!("  {:<width$} {value}", format!("{label}:")));
        }

        if !self.rows.is_empty() {
            lines.push(String::new());
            lines.extend(self.rows.iter().map(|row| format!("  {row}")));
        }

        if !self.warnings.is_empty() || !self.next_steps.is_empty() {
            lines.push(String::new());
        }
        lines.extend(self.warnings.iter().map(|warning| format!("warning: {warning}")));
        lines.extend(self.next_steps.iter().map(|step| format!("next: {step}")));

        lines.join("\n")
    }
}

#[derive(Serialize)]
struct Envelope<'a, D: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: &HumanOutput,
) -> Result<()> {
    if options.json {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            warnings: &human.warnings,
            next_steps: &human.next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if !options.quiet {
        println!("{}", human.render());
    }
    Ok(())
}

/// Print an error as `error: ...` on stderr, or as an error envelope on
/// stdout when `json` is set.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        let envelope: Envelope<'_, ()> = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(ErrorBody {
                message: err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            }),
            warnings: &[],
            next_steps: &next_steps,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Name of the command being run, for error envelopes produced before or
/// after clap has parsed the arguments.
pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// Global flags that consume the following argument.
const VALUE_FLAGS: [&str; 2] = ["--data-dir", "--events"];

fn next_positional(args: &mut impl Iterator<Item = String>) -> Option<String> {
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

fn infer_command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    let Some(command) = next_positional(&mut args) else {
        return "taskmaster".to_string();
    };

    if matches!(command.as_str(), "bulk" | "prefs") {
        if let Some(sub) = next_positional(&mut args) {
            return format!("{command} {sub}");
        }
    }
    command
}

fn error_kind(err: &Error) -> &'static str {
    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::NOT_FOUND => "not_found",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &Error) -> Vec<String> {
    let step = match err {
        Error::TaskNotFound(_) => "taskmaster list",
        Error::InvalidConfig(_) => "fix config.toml then retry",
        Error::DataDirUnavailable => "taskmaster --data-dir <path> ...",
        Error::LockFailed(_) => "retry once the other taskmaster process finishes",
        Error::PersistenceRead(_) => "inspect or move aside the task file in the data directory",
        _ => return Vec::new(),
    };
    vec![step.to_string()]
}
