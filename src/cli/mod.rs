//! Command-line interface for taskmaster
//!
//! This module defines the CLI structure using clap derive macros.
//! Task commands live in `task`, preference commands in `prefs`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod prefs;
mod task;

/// taskmaster - local-first task manager
///
/// Create, edit, filter and sort tasks stored as a versioned snapshot in a
/// data directory.
#[derive(Parser, Debug)]
#[command(name = "taskmaster")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding tasks, preferences and config.toml
    #[arg(long, global = true, env = "TASKMASTER_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write change events as JSON lines to a file, or `-` for stdout
    #[arg(long, global = true)]
    pub events: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a task
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Priority: low, medium, high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Free-text category label
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Edit fields of an existing task
    Edit {
        /// Task ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        /// Remove the description
        #[arg(long)]
        clear_description: bool,

        /// New priority: low, medium, high
        #[arg(long)]
        priority: Option<String>,

        /// New due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// New category
        #[arg(long, conflicts_with = "clear_category")]
        category: Option<String>,

        /// Remove the category
        #[arg(long)]
        clear_category: bool,

        /// New status: active, completed, archived
        #[arg(long)]
        status: Option<String>,
    },

    /// Flip a task between active and completed
    Toggle {
        /// Task ID
        id: String,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },

    /// List tasks through the filter and sort pipeline
    List {
        /// Status filter: all, active, completed, archived
        #[arg(long)]
        status: Option<String>,

        /// Case-insensitive text matched against title and description
        #[arg(short, long)]
        search: Option<String>,

        /// Sort key: createdDate, priority, dueDate
        #[arg(long)]
        sort: Option<String>,
    },

    /// Apply one action to several tasks at once
    #[command(subcommand)]
    Bulk(BulkCommands),

    /// UI preferences
    #[command(subcommand)]
    Prefs(PrefsCommands),
}

/// Bulk subcommands
#[derive(Subcommand, Debug)]
pub enum BulkCommands {
    /// Mark tasks completed
    Complete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Archive tasks
    Archive {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete tasks
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Preference subcommands
#[derive(Subcommand, Debug)]
pub enum PrefsCommands {
    /// Show current preferences
    Show,

    /// Set dark mode: on, off, toggle
    DarkMode {
        setting: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let common = task::CommonOptions {
            data_dir: self.data_dir,
            events: self.events,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Add {
                title,
                description,
                priority,
                due,
                category,
            } => task::run_add(task::AddOptions {
                title,
                description,
                priority,
                due,
                category,
                common,
            }),
            Commands::Edit {
                id,
                title,
                description,
                clear_description,
                priority,
                due,
                clear_due,
                category,
                clear_category,
                status,
            } => task::run_edit(task::EditOptions {
                id,
                title,
                description: clearable(description, clear_description),
                priority,
                due: clearable(due, clear_due),
                category: clearable(category, clear_category),
                status,
                common,
            }),
            Commands::Toggle { id } => task::run_toggle(task::IdOptions { id, common }),
            Commands::Delete { id } => task::run_delete(task::IdOptions { id, common }),
            Commands::List {
                status,
                search,
                sort,
            } => task::run_list(task::ListOptions {
                status,
                search,
                sort,
                common,
            }),
            Commands::Bulk(cmd) => {
                let (action, ids) = match cmd {
                    BulkCommands::Complete { ids } => (task::BulkAction::Complete, ids),
                    BulkCommands::Archive { ids } => (task::BulkAction::Archive, ids),
                    BulkCommands::Delete { ids } => (task::BulkAction::Delete, ids),
                };
                task::run_bulk(task::BulkOptions {
                    action,
                    ids,
                    common,
                })
            }
            Commands::Prefs(cmd) => match cmd {
                PrefsCommands::Show => prefs::run_show(common),
                PrefsCommands::DarkMode { setting } => prefs::run_dark_mode(&setting, common),
            },
        }
    }
}

/// `--clear-x` wins over an absent `--x`; clap rejects passing both.
fn clearable(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}
