//! UI preferences kept in their own storage slot.
//!
//! The slot holds a small envelope, `{"state": {"darkMode": bool}, "version": 0}`,
//! independent of the task snapshot.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::storage::Storage;

const PREFERENCES_VERSION: u32 = 0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub dark_mode: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct PreferencesEnvelope {
    state: Preferences,
    #[serde(default)]
    version: u32,
}

#[derive(Debug)]
pub struct PreferenceStore {
    storage: Arc<dyn Storage>,
    key: String,
    prefs: Preferences,
}

impl PreferenceStore {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            prefs: Preferences::default(),
        }
    }

    pub fn prefs(&self) -> Preferences {
        self.prefs
    }

    /// Read the stored preferences. A missing or unreadable slot falls back
    /// to defaults.
    pub fn load(&mut self) -> Preferences {
        self.prefs = match self.storage.read(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<PreferencesEnvelope>(&raw) {
                Ok(envelope) => envelope.state,
                Err(err) => {
                    warn!(key = %self.key, error = %err, "ignoring unreadable preferences");
                    Preferences::default()
                }
            },
            Ok(None) => Preferences::default(),
            Err(err) => {
                warn!(key = %self.key, error = %err, "error reading preferences");
                Preferences::default()
            }
        };
        self.prefs
    }

    pub fn save(&self) -> Result<()> {
        let envelope = PreferencesEnvelope {
            state: self.prefs,
            version: PREFERENCES_VERSION,
        };
        let payload = serde_json::to_string(&envelope)?;
        self.storage
            .write(&self.key, &payload)
            .map_err(|err| Error::PersistenceWrite(err.to_string()))
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<Preferences> {
        self.prefs.dark_mode = enabled;
        debug!(dark_mode = enabled, "updating preferences");
        self.save()?;
        Ok(self.prefs)
    }

    pub fn toggle_dark_mode(&mut self) -> Result<Preferences> {
        self.set_dark_mode(!self.prefs.dark_mode)
    }
}
