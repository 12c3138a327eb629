use serde::{Deserialize, Serialize};

/// User-facing alarm preferences, persisted as JSON in `app_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSettings {
    #[serde(default = "enabled")]
    pub alarms_enabled: bool,
    #[serde(default = "enabled")]
    pub vibration_enabled: bool,
}

fn enabled() -> bool {
    true
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            alarms_enabled: true,
            vibration_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_on() {
        let s = AlarmSettings::default();
        assert!(s.alarms_enabled && s.vibration_enabled);
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let s: AlarmSettings = serde_json::from_str(r#"{"alarmsEnabled": false}"#).unwrap();
        assert!(!s.alarms_enabled);
        assert!(s.vibration_enabled);
    }
}
