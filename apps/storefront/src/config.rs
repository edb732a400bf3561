use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "storefront.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub featured_limit: usize,
    pub carousel_interval_ms: u64,
    pub batch_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            request_timeout_secs: 10,
            featured_limit: 3,
            carousel_interval_ms: 5000,
            batch_timeout_secs: 15,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn carousel_interval(&self) -> Duration {
        Duration::from_millis(self.carousel_interval_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

/// Defaults, then `config_path` (or `storefront.toml`), then the environment.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw),
        Err(err) if config_path.is_some() => {
            warn!("config: could not read {}: {err}", path.display());
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.api_url = normalize_api_url(&settings.api_url);
    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("config: ignoring malformed config file: {err}");
            return;
        }
    };

    let text = |key: &str| {
        file_cfg.get(key).map(|value| match value {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    };

    if let Some(v) = text("api_url") {
        settings.api_url = v;
    }
    if let Some(v) = text("request_timeout_secs").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = text("featured_limit").and_then(|v| v.parse().ok()) {
        settings.featured_limit = v;
    }
    if let Some(v) = text("carousel_interval_ms").and_then(|v| v.parse().ok()) {
        settings.carousel_interval_ms = v;
    }
    if let Some(v) = text("batch_timeout_secs").and_then(|v| v.parse().ok()) {
        settings.batch_timeout_secs = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("STOREFRONT_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = var("APP__FEATURED_LIMIT").and_then(|v| v.parse().ok()) {
        settings.featured_limit = v;
    }
    if let Some(v) = var("APP__CAROUSEL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.carousel_interval_ms = v;
    }
    if let Some(v) = var("APP__BATCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.batch_timeout_secs = v;
    }
}

pub fn normalize_api_url(raw_api_url: &str) -> String {
    let trimmed = raw_api_url.trim().trim_end_matches('/');

    if trimmed.is_empty() {
        return Settings::default().api_url;
    }

    if trimmed.contains("://") {
        return trimmed.to_string();
    }

    format!("http://{trimmed}")
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn normalizes_bare_host_to_http_url() {
        assert_eq!(normalize_api_url("store.local:8000/"), "http://store.local:8000");
        assert_eq!(normalize_api_url(" https://api.example.com// "), "https://api.example.com");
        assert_eq!(normalize_api_url(""), "http://localhost:8000");
    }

    #[test]
    fn file_values_accept_strings_and_integers() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            r#"
api_url = "http://catalog.internal:9000"
featured_limit = 5
carousel_interval_ms = "2500"
"#,
        );
        assert_eq!(settings.api_url, "http://catalog.internal:9000");
        assert_eq!(settings.featured_limit, 5);
        assert_eq!(settings.carousel_interval_ms, 2500);
        assert_eq!(settings.request_timeout_secs, 10);
    }

    #[test]
    fn malformed_file_keeps_defaults() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "api_url = ");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn env_overrides_file_and_ignores_bad_numbers() {
        let mut settings = Settings::default();
        apply_file(&mut settings, "featured_limit = 7");
        apply_env(
            &mut settings,
            env_from(&[
                ("STOREFRONT_API_URL", "http://a"),
                ("APP__API_URL", "http://b"),
                ("APP__FEATURED_LIMIT", "4"),
                ("APP__BATCH_TIMEOUT_SECS", "soon"),
            ]),
        );
        assert_eq!(settings.api_url, "http://b");
        assert_eq!(settings.featured_limit, 4);
        assert_eq!(settings.batch_timeout_secs, 15);
    }

    #[test]
    fn loads_explicit_config_path() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("storefront_config_test_{suffix}.toml"));
        fs::write(&path, "request_timeout_secs = 3\n").expect("write config");

        let settings = load_settings(Some(&path));
        assert_eq!(settings.request_timeout(), Duration::from_secs(3));

        fs::remove_file(path).expect("cleanup");
    }
}
