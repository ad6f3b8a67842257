use std::{collections::HashMap, fs};

pub const DEFAULT_BASE_URL: &str = "https://api.vivahmilan.example.com";
const DEFAULT_SESSION_DATABASE_URL: &str = "sqlite://./data/client_state.sqlite3";

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub session_database_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            session_database_url: DEFAULT_SESSION_DATABASE_URL.into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("base_url") {
                settings.base_url = v.clone();
            }
            if let Some(v) = file_cfg.get("session_database_url") {
                settings.session_database_url = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("BASE_URL") {
        settings.base_url = v;
    }
    if let Ok(v) = std::env::var("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Ok(v) = std::env::var("SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }
    if let Ok(v) = std::env::var("APP__SESSION_DATABASE_URL") {
        settings.session_database_url = v;
    }

    settings.base_url = normalize_base_url(&settings.base_url);
    settings
}

/// Trims whitespace and trailing slashes; an empty value falls back to the
/// hardcoded default.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_BASE_URL.trim_end_matches('/').to_string();
    }
    trimmed.to_string()
}
