//! Sleep stage labels

use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sleep stage predicted by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SleepStage {
    /// Light sleep, the stage the alarm wants to wake in
    LightSleep,
    /// Deep (slow-wave) sleep
    DeepSleep,
    /// REM sleep
    RemSleep,
    /// Subject is awake
    Awake,
}

impl SleepStage {
    /// Label as written in persisted records
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepStage::LightSleep => "Light Sleep",
            SleepStage::DeepSleep => "Deep Sleep",
            SleepStage::RemSleep => "REM Sleep",
            SleepStage::Awake => "Awake",
        }
    }

    /// Whether waking in this stage is acceptable
    pub fn is_wake_candidate(&self) -> bool {
        matches!(self, SleepStage::LightSleep)
    }
}

impl fmt::Display for SleepStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SleepStage {
    type Err = InferenceError;

    /// Accepts "Light Sleep", "light_sleep", "LightSleep" and similar spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "lightsleep" | "light" => Ok(SleepStage::LightSleep),
            "deepsleep" | "deep" => Ok(SleepStage::DeepSleep),
            "remsleep" | "rem" => Ok(SleepStage::RemSleep),
            "awake" | "wake" => Ok(SleepStage::Awake),
            _ => Err(InferenceError::UnknownLabel(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!("Light Sleep".parse::<SleepStage>().unwrap(), SleepStage::LightSleep);
        assert_eq!("light_sleep".parse::<SleepStage>().unwrap(), SleepStage::LightSleep);
        assert_eq!("DeepSleep".parse::<SleepStage>().unwrap(), SleepStage::DeepSleep);
        assert_eq!("REM".parse::<SleepStage>().unwrap(), SleepStage::RemSleep);
        assert_eq!("Awake".parse::<SleepStage>().unwrap(), SleepStage::Awake);
    }

    #[test]
    fn test_unknown_label() {
        assert!("Dozing".parse::<SleepStage>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for stage in [
            SleepStage::LightSleep,
            SleepStage::DeepSleep,
            SleepStage::RemSleep,
            SleepStage::Awake,
        ] {
            assert_eq!(stage.to_string().parse::<SleepStage>().unwrap(), stage);
        }
    }
}
