use super::{apply_env, apply_file, load_settings, normalize_base_url, Settings};

use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
supabase_url = "https://abc.supabase.co"
supabase_anon_key = "anon"
"#,
    );
    assert_eq!(settings.supabase_url, "https://abc.supabase.co");
    assert_eq!(settings.supabase_anon_key, "anon");
    assert_eq!(settings.projects_table, "projects");
}

#[test]
fn malformed_file_is_ignored() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "supabase_url = [not a string");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_plain_env() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        lookup(&[
            ("SUPABASE_URL", "https://plain.supabase.co"),
            ("APP__SUPABASE_URL", "https://app.supabase.co"),
            ("SUPABASE_ANON_KEY", "plain-key"),
            ("APP__PROJECTS_TABLE", "workspace_projects"),
        ]),
    );
    assert_eq!(settings.supabase_url, "https://app.supabase.co");
    assert_eq!(settings.supabase_anon_key, "plain-key");
    assert_eq!(settings.projects_table, "workspace_projects");
}

#[test]
fn load_settings_reads_config_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("quantumscribe_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("quantumscribe.toml");
    fs::write(&path, "projects_table = \"team_projects\"\n").expect("write config");

    let settings = load_settings(&path);
    if env::var("APP__PROJECTS_TABLE").is_err() {
        assert_eq!(settings.projects_table, "team_projects");
    }

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn normalizes_trailing_slashes() {
    assert_eq!(
        normalize_base_url(" https://abc.supabase.co// ").expect("valid"),
        "https://abc.supabase.co"
    );
}

#[test]
fn rejects_non_http_urls() {
    assert!(normalize_base_url("ftp://abc.supabase.co").is_err());
    assert!(normalize_base_url("not a url").is_err());
}
