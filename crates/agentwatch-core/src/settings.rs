//! User settings schema and merge rules.
//!
//! Settings persist as a single JSON object. Loading merges the file over
//! the defaults: every missing key falls back individually, unknown keys
//! are ignored, and a file that fails to parse at all is the caller's cue
//! to run with pure defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Floor for the scan interval; lower values would hammer lsof and ps.
pub const MIN_SCAN_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    Menubar,
    Standalone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Recognized for the GUI shell; no daemon-side behavior.
    pub launch_at_login: bool,
    pub notification_sound: bool,
    /// Scan tick period in milliseconds.
    pub scan_interval: u64,
    /// Ports surfaced by the port scanner; empty means all.
    pub port_whitelist: Vec<u16>,
    /// Recognized for the GUI shell; no daemon-side behavior.
    pub window_mode: WindowMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            launch_at_login: true,
            notification_sound: true,
            scan_interval: 3_000,
            port_whitelist: vec![3000, 4000],
            window_mode: WindowMode::Menubar,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown settings key: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {detail}")]
    InvalidValue { key: String, detail: String },
    #[error("settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Settings {
    /// Parse a settings file body, merging present keys over defaults.
    pub fn from_json_str(data: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = serde_json::from_str(data)?;
        settings.clamp();
        Ok(settings)
    }

    pub fn to_json_pretty(&self) -> String {
        // Serialization of this struct cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Update one key from an untyped JSON value, validating its type.
    pub fn set(&mut self, key: &str, value: &Value) -> Result<(), SettingsError> {
        match key {
            "launchAtLogin" => self.launch_at_login = expect_bool(key, value)?,
            "notificationSound" => self.notification_sound = expect_bool(key, value)?,
            "scanInterval" => {
                let ms = value.as_u64().ok_or_else(|| invalid(key, "expected integer"))?;
                self.scan_interval = ms;
            }
            "portWhitelist" => {
                let list = value
                    .as_array()
                    .ok_or_else(|| invalid(key, "expected array of ports"))?;
                let mut ports = Vec::with_capacity(list.len());
                for item in list {
                    let port = item
                        .as_u64()
                        .and_then(|p| u16::try_from(p).ok())
                        .ok_or_else(|| invalid(key, "ports must be 0-65535"))?;
                    ports.push(port);
                }
                self.port_whitelist = ports;
            }
            "windowMode" => {
                self.window_mode = serde_json::from_value(value.clone())
                    .map_err(|_| invalid(key, "expected \"menubar\" or \"standalone\""))?;
            }
            other => return Err(SettingsError::UnknownKey(other.to_owned())),
        }
        self.clamp();
        Ok(())
    }

    /// Scan tick period as a duration, floor applied.
    pub fn scan_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scan_interval.max(MIN_SCAN_INTERVAL_MS))
    }

    fn clamp(&mut self) {
        if self.scan_interval < MIN_SCAN_INTERVAL_MS {
            self.scan_interval = MIN_SCAN_INTERVAL_MS;
        }
    }
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, SettingsError> {
    value.as_bool().ok_or_else(|| invalid(key, "expected boolean"))
}

fn invalid(key: &str, detail: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_owned(),
        detail: detail.to_owned(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert!(s.launch_at_login);
        assert!(s.notification_sound);
        assert_eq!(s.scan_interval, 3_000);
        assert_eq!(s.port_whitelist, vec![3000, 4000]);
        assert_eq!(s.window_mode, WindowMode::Menubar);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let s = Settings::from_json_str(r#"{"scanInterval": 5000}"#).unwrap();
        assert_eq!(s.scan_interval, 5_000);
        // Untouched keys keep their defaults.
        assert!(s.notification_sound);
        assert_eq!(s.port_whitelist, vec![3000, 4000]);
    }

    #[test]
    fn unknown_keys_ignored() {
        let s = Settings::from_json_str(r#"{"theme": "dark", "windowMode": "standalone"}"#)
            .unwrap();
        assert_eq!(s.window_mode, WindowMode::Standalone);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Settings::from_json_str("{not json").is_err());
    }

    #[test]
    fn scan_interval_floored_on_load() {
        let s = Settings::from_json_str(r#"{"scanInterval": 200}"#).unwrap();
        assert_eq!(s.scan_interval, MIN_SCAN_INTERVAL_MS);
        assert_eq!(
            s.scan_period(),
            std::time::Duration::from_millis(MIN_SCAN_INTERVAL_MS)
        );
    }

    #[test]
    fn set_known_keys() {
        let mut s = Settings::default();
        s.set("notificationSound", &json!(false)).unwrap();
        assert!(!s.notification_sound);
        s.set("portWhitelist", &json!([8080])).unwrap();
        assert_eq!(s.port_whitelist, vec![8080]);
        s.set("portWhitelist", &json!([])).unwrap();
        assert!(s.port_whitelist.is_empty());
        s.set("windowMode", &json!("standalone")).unwrap();
        assert_eq!(s.window_mode, WindowMode::Standalone);
        s.set("scanInterval", &json!(500)).unwrap();
        assert_eq!(s.scan_interval, MIN_SCAN_INTERVAL_MS);
    }

    #[test]
    fn set_rejects_bad_types() {
        let mut s = Settings::default();
        assert!(matches!(
            s.set("scanInterval", &json!("fast")),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            s.set("portWhitelist", &json!([70000])),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            s.set("nope", &json!(1)),
            Err(SettingsError::UnknownKey(_))
        ));
    }

    #[test]
    fn round_trips_through_pretty_json() {
        let mut s = Settings::default();
        s.set("windowMode", &json!("standalone")).unwrap();
        let text = s.to_json_pretty();
        let back = Settings::from_json_str(&text).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn wire_names_are_camel_case() {
        let v: Value = serde_json::from_str(&Settings::default().to_json_pretty()).unwrap();
        assert!(v.get("launchAtLogin").is_some());
        assert!(v.get("portWhitelist").is_some());
        assert_eq!(v["windowMode"], "menubar");
    }
}
