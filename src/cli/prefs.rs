//! Preference command implementations.

use std::sync::Arc;

use crate::cli::task::CommonOptions;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::preferences::{PreferenceStore, Preferences};
use crate::storage::FileStorage;

enum DarkModeSetting {
    On,
    Off,
    Toggle,
}

impl DarkModeSetting {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" | "true" => Ok(DarkModeSetting::On),
            "off" | "false" => Ok(DarkModeSetting::Off),
            "toggle" => Ok(DarkModeSetting::Toggle),
            other => Err(Error::InvalidArgument(format!(
                "invalid dark mode setting '{other}' (expected on|off|toggle)"
            ))),
        }
    }
}

pub fn run_show(common: CommonOptions) -> Result<()> {
    let mut store = open_preferences(&common)?;
    let prefs = store.load();
    emit_preferences(&common, "prefs show", "Preferences", prefs)
}

pub fn run_dark_mode(setting: &str, common: CommonOptions) -> Result<()> {
    let setting = DarkModeSetting::parse(setting)?;
    let mut store = open_preferences(&common)?;
    store.load();

    let prefs = match setting {
        DarkModeSetting::On => store.set_dark_mode(true)?,
        DarkModeSetting::Off => store.set_dark_mode(false)?,
        DarkModeSetting::Toggle => store.toggle_dark_mode()?,
    };
    emit_preferences(&common, "prefs dark-mode", "Preferences updated", prefs)
}

fn open_preferences(common: &CommonOptions) -> Result<PreferenceStore> {
    let (data_dir, config) = common.load_config()?;
    let storage = FileStorage::new(data_dir).with_lock_timeout(config.storage.lock_timeout_ms);
    Ok(PreferenceStore::new(
        Arc::new(storage),
        config.storage.preferences_key,
    ))
}

fn emit_preferences(
    common: &CommonOptions,
    command: &str,
    header: &str,
    prefs: Preferences,
) -> Result<()> {
    let mut human = HumanOutput::new(header);
    human.push_field("Dark mode", if prefs.dark_mode { "on" } else { "off" });

    emit_success(
        OutputOptions {
            json: common.json,
            quiet: common.quiet,
        },
        command,
        &prefs,
        &human,
    )
}
