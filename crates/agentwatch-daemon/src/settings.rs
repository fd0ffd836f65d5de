//! Settings persistence: one JSON file merged over defaults on load.

use std::path::{Path, PathBuf};

use agentwatch_core::settings::Settings;

/// `~/.config/agentwatch/settings.json`.
pub fn default_settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_owned());
    Path::new(&home)
        .join(".config")
        .join("agentwatch")
        .join("settings.json")
}

/// Load settings from `path`, falling back to defaults.
///
/// A missing file is the normal first-run case and stays quiet; an
/// unreadable or unparseable file is logged and the defaults run instead.
pub async fn load_settings(path: &Path) -> Settings {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read settings, using defaults");
            return Settings::default();
        }
    };
    match Settings::from_json_str(&data) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed settings file, using defaults");
            Settings::default()
        }
    }
}

/// Write settings to `path`, creating parent directories as needed.
pub async fn save_settings(path: &Path, settings: &Settings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, settings.to_json_pretty()).await
}

// ─── Tests ───────────────────────────────────────────────────────
