//! Per-user identity supplied before composition begins.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::Authorship;
use crate::palette::Swatch;

/// Why settings were rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("Name must not be empty")]
    EmptyName,
    #[error("Channel must not be empty")]
    EmptyChannel,
}

/// Name, channel and colour of the local user. Fixed once joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub name: String,
    pub channel: String,
    #[serde(default)]
    pub color: Swatch,
}

impl UserSettings {
    /// Build settings, trimming surrounding whitespace from name and channel.
    pub fn new(
        name: impl AsRef<str>,
        channel: impl AsRef<str>,
        color: Swatch,
    ) -> Result<Self, SettingsError> {
        let name = name.as_ref().trim();
        let channel = channel.as_ref().trim();
        if name.is_empty() {
            return Err(SettingsError::EmptyName);
        }
        if channel.is_empty() {
            return Err(SettingsError::EmptyChannel);
        }
        Ok(Self {
            name: name.to_string(),
            channel: channel.to_string(),
            color,
        })
    }

    /// Attribution stamped on outgoing messages.
    pub fn authorship(&self) -> Authorship {
        Authorship {
            author: self.name.clone(),
            color: self.color,
        }
    }
}
