use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "quantumscribe.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub projects_table: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".into(),
            supabase_anon_key: String::new(),
            projects_table: "projects".into(),
        }
    }
}

/// Defaults, then `path` if it exists, then the process environment.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string(path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("supabase_url") {
        settings.supabase_url = v.clone();
    }
    if let Some(v) = file_cfg.get("supabase_anon_key") {
        settings.supabase_anon_key = v.clone();
    }
    if let Some(v) = file_cfg.get("projects_table") {
        settings.projects_table = v.clone();
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SUPABASE_URL") {
        settings.supabase_url = v;
    }
    if let Some(v) = var("APP__SUPABASE_URL") {
        settings.supabase_url = v;
    }

    if let Some(v) = var("SUPABASE_ANON_KEY") {
        settings.supabase_anon_key = v;
    }
    if let Some(v) = var("APP__SUPABASE_ANON_KEY") {
        settings.supabase_anon_key = v;
    }

    if let Some(v) = var("APP__PROJECTS_TABLE") {
        settings.projects_table = v;
    }
}

/// Trims the url and drops trailing slashes; only http(s) urls are accepted.
pub fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).with_context(|| format!("invalid supabase url '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported supabase url scheme '{}'", parsed.scheme());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
