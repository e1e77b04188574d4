//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`DuneSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `DUNE_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! The file only needs the keys it changes; see [`merge_layer`].

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::DuneSettings;

/// Env var naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "DUNE_SETTINGS";

/// Resolve the settings file path: `$DUNE_SETTINGS`, else `~/.dune/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(explicit) = std::env::var(SETTINGS_PATH_ENV)
        .ok()
        .filter(|v| !v.is_empty())
    {
        return PathBuf::from(explicit);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".dune").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DuneSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a settings value that
/// fails [`DuneSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<DuneSettings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// [`load_settings_from_path`] with an explicit environment lookup.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<DuneSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(DuneSettings::default())?;

    let mut merged = defaults;
    if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&content)?;
        merge_layer(&mut merged, file);
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let mut settings: DuneSettings = serde_json::from_value(merged)?;
    apply_overrides_with(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Lay a settings file over the serialized defaults, in place.
///
/// Sections (`endpoints`, `http`, `query`, `polling`) merge key by key, so a
/// file naming only `polling.intervalMs` keeps every other default. A `null`
/// in the file leaves the default untouched. Non-object values replace.
pub fn merge_layer(base: &mut Value, layer: Value) {
    let entries = match layer {
        Value::Object(entries) => entries,
        other => {
            *base = other;
            return;
        }
    };
    let Value::Object(base_map) = &mut *base else {
        *base = Value::Object(entries);
        return;
    };
    for (key, value) in entries.into_iter().filter(|(_, v)| !v.is_null()) {
        match base_map.get_mut(&key) {
            Some(slot) => merge_layer(slot, value),
            None => {
                let _ = base_map.insert(key, value);
            }
        }
    }
}

/// Apply `DUNE_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut DuneSettings) {
    apply_overrides_with(settings, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; invalid values are ignored
/// with a warning and the file/default value stays.
pub fn apply_overrides_with<F>(settings: &mut DuneSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Endpoints ───────────────────────────────────────────────────
    if let Some(v) = env.string("DUNE_GRAPHQL_URL") {
        settings.endpoints.graphql_url = v;
    }
    if let Some(v) = env.string("DUNE_AUTH_URL") {
        settings.endpoints.auth_base_url = v;
    }
    if let Some(v) = env.string("DUNE_ORIGIN") {
        settings.endpoints.login_referer = format!("{}/auth/login", v.trim_end_matches('/'));
        settings.endpoints.origin = v;
    }
    if let Some(v) = env.string("DUNE_LOGIN_REFERER") {
        settings.endpoints.login_referer = v;
    }

    // ── HTTP ────────────────────────────────────────────────────────
    if let Some(v) = env.u64("DUNE_HTTP_TIMEOUT_MS", 100, 3_600_000) {
        settings.http.timeout_ms = v;
    }

    // ── Query ───────────────────────────────────────────────────────
    if let Some(v) = env.u64("DUNE_DATASET_ID", 1, i64::MAX.unsigned_abs()) {
        settings.query.dataset_id = i64::try_from(v).unwrap_or(settings.query.dataset_id);
    }

    // ── Polling ─────────────────────────────────────────────────────
    if let Some(v) = env.u64("DUNE_POLL_INTERVAL_MS", 1, 600_000) {
        settings.polling.interval_ms = v;
    }
    if let Some(v) = env.u64("DUNE_POLL_MAX_ATTEMPTS", 1, u64::from(u32::MAX)) {
        settings.polling.max_attempts = u32::try_from(v).ok();
    }
    if let Some(v) = env.u64("DUNE_POLL_DEADLINE_MS", 1, 86_400_000) {
        settings.polling.deadline_ms = Some(v);
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid integer env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── merge_layer ─────────────────────────────────────────────────

    fn defaults() -> Value {
        serde_json::to_value(DuneSettings::default()).unwrap()
    }

    #[test]
    fn layer_changes_only_named_keys() {
        let mut base = defaults();
        merge_layer(
            &mut base,
            serde_json::json!({"endpoints": {"graphqlUrl": "http://localhost:8080/v1/graphql"}}),
        );
        assert_eq!(base["endpoints"]["graphqlUrl"], "http://localhost:8080/v1/graphql");
        assert_eq!(base["endpoints"]["origin"], "https://duneanalytics.com");
        assert_eq!(base["polling"]["intervalMs"], 1000);
    }

    #[test]
    fn layer_null_keeps_default() {
        let mut base = defaults();
        merge_layer(
            &mut base,
            serde_json::json!({"query": {"name": null, "datasetId": 6}}),
        );
        assert_eq!(base["query"]["name"], "Scratch Query");
        assert_eq!(base["query"]["datasetId"], 6);
    }

    #[test]
    fn layer_adds_unset_optional_keys() {
        let mut base = defaults();
        assert!(base["polling"].get("maxAttempts").is_none());
        merge_layer(&mut base, serde_json::json!({"polling": {"maxAttempts": 5}}));
        assert_eq!(base["polling"]["maxAttempts"], 5);
        assert_eq!(base["polling"]["intervalMs"], 1000);
    }

    #[test]
    fn layer_scalar_replaces_section() {
        let mut base = serde_json::json!({"http": {"timeoutMs": 60000}});
        merge_layer(&mut base, serde_json::json!({"http": 42}));
        assert_eq!(base["http"], 42);
    }

    // ── load_settings_with ──────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let path = Path::new("/nonexistent/settings.json");
        let settings = load_settings_with(path, no_env).unwrap();
        assert_eq!(settings, DuneSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"query": {"name": "Adhoc"}, "polling": {"intervalMs": 250, "deadlineMs": null}}"#,
        )
        .unwrap();

        let settings = load_settings_with(&path, no_env).unwrap();
        assert_eq!(settings.query.name, "Adhoc");
        assert_eq!(settings.query.dataset_id, 4);
        assert_eq!(settings.polling.interval_ms, 250);
        assert!(settings.polling.deadline_ms.is_none());
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_with(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"endpoints": {"graphqlUrl": ""}}"#).unwrap();

        let result = load_settings_with(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"polling": {"intervalMs": 250}}"#).unwrap();

        let settings =
            load_settings_with(&path, env(&[("DUNE_POLL_INTERVAL_MS", "50")])).unwrap();
        assert_eq!(settings.polling.interval_ms, 50);
    }

    // ── apply_overrides_with ────────────────────────────────────────

    #[test]
    fn overrides_apply_every_known_key() {
        let mut s = DuneSettings::default();
        apply_overrides_with(
            &mut s,
            env(&[
                ("DUNE_GRAPHQL_URL", "http://localhost:1/v1/graphql"),
                ("DUNE_AUTH_URL", "http://localhost:2"),
                ("DUNE_ORIGIN", "http://localhost:2"),
                ("DUNE_HTTP_TIMEOUT_MS", "5000"),
                ("DUNE_DATASET_ID", "7"),
                ("DUNE_POLL_INTERVAL_MS", "10"),
                ("DUNE_POLL_MAX_ATTEMPTS", "3"),
                ("DUNE_POLL_DEADLINE_MS", "9000"),
            ]),
        );
        assert_eq!(s.endpoints.graphql_url, "http://localhost:1/v1/graphql");
        assert_eq!(s.endpoints.auth_base_url, "http://localhost:2");
        assert_eq!(s.endpoints.origin, "http://localhost:2");
        assert_eq!(s.http.timeout_ms, 5000);
        assert_eq!(s.query.dataset_id, 7);
        assert_eq!(s.polling.interval_ms, 10);
        assert_eq!(s.polling.max_attempts, Some(3));
        assert_eq!(s.polling.deadline_ms, Some(9000));
    }

    #[test]
    fn origin_override_moves_login_referer() {
        let mut s = DuneSettings::default();
        apply_overrides_with(&mut s, env(&[("DUNE_ORIGIN", "http://localhost:3000/")]));
        assert_eq!(s.endpoints.origin, "http://localhost:3000/");
        assert_eq!(s.endpoints.login_referer, "http://localhost:3000/auth/login");

        apply_overrides_with(
            &mut s,
            env(&[
                ("DUNE_ORIGIN", "http://localhost:3000"),
                ("DUNE_LOGIN_REFERER", "http://localhost:3000/signin"),
            ]),
        );
        assert_eq!(s.endpoints.login_referer, "http://localhost:3000/signin");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut s = DuneSettings::default();
        apply_overrides_with(
            &mut s,
            env(&[
                ("DUNE_POLL_INTERVAL_MS", "0"),
                ("DUNE_POLL_MAX_ATTEMPTS", "lots"),
                ("DUNE_GRAPHQL_URL", ""),
            ]),
        );
        assert_eq!(s, DuneSettings::default());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("10", 1, 10), Some(10));
        assert_eq!(parse_u64_range(" 5 ", 1, 10), Some(5));
        assert_eq!(parse_u64_range("11", 1, 10), None);
        assert_eq!(parse_u64_range("-1", 1, 10), None);
    }
}
