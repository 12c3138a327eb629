use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DoseOutcome {
    Taken => "taken",
    Skipped => "skipped",
});

str_enum!(DoseStatus {
    Pending => "pending",
    Taken => "taken",
    Skipped => "skipped",
});

impl From<DoseOutcome> for DoseStatus {
    fn from(outcome: DoseOutcome) -> Self {
        match outcome {
            DoseOutcome::Taken => Self::Taken,
            DoseOutcome::Skipped => Self::Skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn outcome_round_trips_through_column_text() {
        assert_eq!(DoseOutcome::from_str("taken").unwrap(), DoseOutcome::Taken);
        assert_eq!(DoseOutcome::Skipped.as_str(), "skipped");
    }

    #[test]
    fn unknown_outcome_is_invalid_enum() {
        let err = DoseOutcome::from_str("maybe").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { ref field, .. } if field == "DoseOutcome"));
    }

    #[test]
    fn outcome_maps_onto_status() {
        assert_eq!(DoseStatus::from(DoseOutcome::Taken), DoseStatus::Taken);
        assert_eq!(DoseStatus::from(DoseOutcome::Skipped), DoseStatus::Skipped);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DoseStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
