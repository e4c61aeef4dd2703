//! taskmaster - Task State Engine
//!
//! This library holds the task collection, the filter/sort pipeline that
//! derives the visible list, and durable storage for both tasks and UI
//! preferences. The `taskmaster` binary is a thin front end over it.
//!
//! # Core Concepts
//!
//! - **Canonical collection**: every task, in insertion order, owned by
//!   [`store::TaskStore`]
//! - **Derived view**: `sort(filter(tasks))`, recomputed after every change
//! - **Snapshots**: the whole collection saved as one versioned blob
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `events`: Change events and the JSONL event sink
//! - `lock`: File locking and atomic writes
//! - `output`: JSON envelope and human output
//! - `preferences`: Dark-mode preference slot
//! - `query`: Filter and sort pipeline
//! - `storage`: Key-value slots and the task snapshot format
//! - `store`: The task store
//! - `task`: Task records, drafts and patches
//! - `validation`: Form validation for task input

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod lock;
pub mod output;
pub mod preferences;
pub mod query;
pub mod storage;
pub mod store;
pub mod task;
pub mod validation;

pub use error::{Error, Result};
