//! Connection settings persisted across runs

use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

/// The only state that survives a restart: where the radio agent lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "de1-simulator.local".to_string(),
            port: de1_proto::DEFAULT_PORT,
        }
    }
}

/// Get the settings directory, creating it if needed.
fn settings_dir() -> Option<PathBuf> {
    let dir = std::env::var("DE1_SIM_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join(".de1-sim"));
    if !dir.as_os_str().is_empty() && !dir.exists() {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("cannot create {}: {e}", dir.display());
            return None;
        }
    }
    Some(dir)
}

fn settings_path() -> Option<PathBuf> {
    settings_dir().map(|dir| dir.join("settings.json"))
}

impl Settings {
    /// Load persisted settings, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = settings_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("ignoring unreadable {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist the current settings; failures only warn.
    pub fn save(&self) {
        let Some(path) = settings_path() else {
            return;
        };
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    warn!("cannot write {}: {e}", path.display());
                }
            }
            Err(e) => warn!("cannot serialize settings: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_usual_agent() {
        let settings = Settings::default();
        assert_eq!(settings.port, 12345);
        assert!(!settings.host.is_empty());
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = Settings {
            host: "192.168.1.20".into(),
            port: 23456,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
