use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use editor_core::AutosaveSettings;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "pagectl.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub settle_delay_ms: u64,
    pub saved_reset_ms: u64,
    pub error_reset_ms: u64,
    pub user_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/pages.db".into(),
            settle_delay_ms: 600,
            saved_reset_ms: 3_000,
            error_reset_ms: 3_000,
            user_id: None,
        }
    }
}

impl Settings {
    pub fn autosave(&self) -> AutosaveSettings {
        AutosaveSettings {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            saved_reset: Duration::from_millis(self.saved_reset_ms),
            error_reset: Duration::from_millis(self.error_reset_ms),
        }
    }
}

pub fn load_settings() -> Settings {
    let raw = fs::read_to_string(CONFIG_FILE).ok();
    resolve_settings(raw.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `key = "value"` file, then environment.
pub fn resolve_settings(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) {
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("user_id") {
                settings.user_id = Some(v.clone());
            }
            apply_millis(&mut settings.settle_delay_ms, file_cfg.get("settle_delay_ms"));
            apply_millis(&mut settings.saved_reset_ms, file_cfg.get("saved_reset_ms"));
            apply_millis(&mut settings.error_reset_ms, file_cfg.get("error_reset_ms"));
        }
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__USER_ID") {
        settings.user_id = Some(v);
    }
    apply_millis(&mut settings.settle_delay_ms, env("APP__SETTLE_DELAY_MS").as_ref());
    apply_millis(&mut settings.saved_reset_ms, env("APP__SAVED_RESET_MS").as_ref());
    apply_millis(&mut settings.error_reset_ms, env("APP__ERROR_RESET_MS").as_ref());

    settings
}

fn apply_millis(target: &mut u64, raw: Option<&String>) {
    if let Some(parsed) = raw.and_then(|v| v.trim().parse::<u64>().ok()) {
        *target = parsed;
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}
