//! # dune-settings
//!
//! Configuration for the Dune client, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`DuneSettings::default()`]
//! 2. **Settings file**: `$DUNE_SETTINGS` or `~/.dune/settings.json`,
//!    deep-merged over defaults
//! 3. **Environment variables**: `DUNE_*` overrides (highest priority)
//!
//! Nothing is cached globally; callers load settings once and hand them to
//! the client builder.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_with, load_settings, load_settings_from_path,
    load_settings_with, merge_layer, settings_path,
};
pub use types::{DuneSettings, EndpointSettings, HttpSettings, PollSettings, QuerySettings};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = DuneSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_path_ends_in_settings_json() {
        if std::env::var_os(loader::SETTINGS_PATH_ENV).is_none() {
            assert!(settings_path().ends_with(".dune/settings.json"));
        }
    }
}
