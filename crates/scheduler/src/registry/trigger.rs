//! When a registry entry fires

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Firing rule of a registry entry.
///
/// One-shot triggers (`Immediate`, `Delayed`) fire once and the entry is
/// removed when the run finishes. `Interval` fires every period, first after
/// one full period, until the entry is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "seconds", rename_all = "snake_case")]
pub enum Trigger {
    Immediate,
    #[serde(with = "duration_secs")]
    Delayed(Duration),
    #[serde(with = "duration_secs")]
    Interval(Duration),
}

impl Trigger {
    pub fn delayed_secs(secs: u64) -> Self {
        Self::Delayed(Duration::from_secs(secs))
    }

    pub fn every_secs(secs: u64) -> Self {
        Self::Interval(Duration::from_secs(secs))
    }

    /// Wait before the first firing.
    pub fn initial_delay(&self) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Delayed(delay) => *delay,
            Self::Interval(period) => *period,
        }
    }

    /// Period of a recurring trigger, `None` for one-shots.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::Interval(period) => Some(*period),
            _ => None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.period().is_some()
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("immediate"),
            Self::Delayed(delay) => write!(f, "delayed[{}s]", delay.as_secs_f64()),
            Self::Interval(period) => write!(f, "interval[{}s]", period.as_secs_f64()),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_delay() {
        assert_eq!(Trigger::Immediate.initial_delay(), Duration::ZERO);
        assert_eq!(Trigger::delayed_secs(30).initial_delay(), Duration::from_secs(30));
        assert_eq!(Trigger::every_secs(60).initial_delay(), Duration::from_secs(60));
        assert!(Trigger::every_secs(60).is_recurring());
        assert!(!Trigger::delayed_secs(60).is_recurring());
    }

    #[test]
    fn test_display() {
        assert_eq!(Trigger::Immediate.to_string(), "immediate");
        assert_eq!(Trigger::every_secs(180).to_string(), "interval[180s]");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(Trigger::delayed_secs(5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "delayed", "seconds": 5.0}));
        let json = serde_json::to_value(Trigger::Immediate).unwrap();
        assert_eq!(json, serde_json::json!({"type": "immediate"}));
    }
}
