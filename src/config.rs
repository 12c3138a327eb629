use std::path::PathBuf;

use chrono::Duration;

/// Application-level constants
pub const APP_NAME: &str = "DoseKeeper";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides `app_data_dir()` when set.
pub const DATA_DIR_ENV: &str = "DOSEKEEPER_DATA_DIR";
/// Overrides the post-reconciliation cooldown, in milliseconds.
pub const COOLDOWN_ENV: &str = "DOSEKEEPER_RECONCILE_COOLDOWN_MS";

/// Alarms due sooner than this after a pass are suppressed.
pub const MIN_LEAD_SECS: i64 = 30;
/// Upper bound on how far ahead an alarm may be scheduled.
pub const MAX_LEAD_SECS: i64 = 86_400;
/// How long delivered callbacks are ignored after a pass completes.
pub const DEFAULT_RECONCILE_COOLDOWN_MS: i64 = 2_000;
/// Upper bound accepted from `DOSEKEEPER_RECONCILE_COOLDOWN_MS`.
pub const MAX_RECONCILE_COOLDOWN_MS: i64 = 60_000;

/// Get the application data directory
/// `$DOSEKEEPER_DATA_DIR`, else the platform local data dir, else the working dir.
pub fn app_data_dir() -> PathBuf {
    app_data_dir_from(|key| std::env::var(key).ok())
}

fn app_data_dir_from(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the reminder database path
pub fn database_path() -> PathBuf {
    app_data_dir().join("reminders.db")
}

/// Fallback filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "dosekeeper=info,warn"
}

/// Tunables for the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub min_lead_secs: i64,
    pub max_lead_secs: i64,
    pub reconcile_cooldown: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_lead_secs: MIN_LEAD_SECS,
            max_lead_secs: MAX_LEAD_SECS,
            reconcile_cooldown: Duration::milliseconds(DEFAULT_RECONCILE_COOLDOWN_MS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(COOLDOWN_ENV) {
            match raw.trim().parse::<i64>() {
                Ok(ms) if ms > MAX_RECONCILE_COOLDOWN_MS => {
                    tracing::warn!(value = %raw, "Capping {COOLDOWN_ENV} at {MAX_RECONCILE_COOLDOWN_MS} ms");
                    config.reconcile_cooldown = Duration::milliseconds(MAX_RECONCILE_COOLDOWN_MS);
                }
                Ok(ms) if ms >= 0 => config.reconcile_cooldown = Duration::milliseconds(ms),
                _ => tracing::warn!(value = %raw, "Ignoring invalid {COOLDOWN_ENV}"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_env_override_wins() {
        let dir = app_data_dir_from(|_| Some("/tmp/dk-test".into()));
        assert_eq!(dir, PathBuf::from("/tmp/dk-test"));
    }

    #[test]
    fn blank_override_falls_back_to_platform_dir() {
        let dir = app_data_dir_from(|_| Some("  ".into()));
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn database_lives_under_data_dir() {
        assert!(database_path().starts_with(app_data_dir()));
        assert!(database_path().ends_with("reminders.db"));
    }

    #[test]
    fn default_thresholds() {
        let config = EngineConfig::default();
        assert_eq!(config.min_lead_secs, 30);
        assert_eq!(config.max_lead_secs, 86_400);
        assert_eq!(config.reconcile_cooldown, Duration::seconds(2));
    }

    #[test]
    fn cooldown_override_parsed() {
        let config = EngineConfig::from_lookup(|k| (k == COOLDOWN_ENV).then(|| "0".to_string()));
        assert_eq!(config.reconcile_cooldown, Duration::zero());
    }

    #[test]
    fn huge_cooldown_is_capped() {
        let config = EngineConfig::from_lookup(|_| Some(i64::MAX.to_string()));
        assert_eq!(config.reconcile_cooldown, Duration::seconds(60));
    }

    #[test]
    fn invalid_cooldown_keeps_default() {
        let config = EngineConfig::from_lookup(|_| Some("-5".into()));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
