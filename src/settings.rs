//! Playback parameters and the values the engine boundary exchanges

use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest value a percentage slider accepts
pub const PERCENT_MIN: i32 = 0;
/// Highest value a percentage slider accepts
pub const PERCENT_MAX: i32 = 200;
/// Neutral slider position (engine default)
pub const PERCENT_DEFAULT: i32 = 100;

/// A slider value in percent, always within `PERCENT_MIN..=PERCENT_MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percent(i32);

impl Percent {
    /// Validate a raw slider value
    pub fn new(value: i32) -> Result<Self> {
        if (PERCENT_MIN..=PERCENT_MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(HarnessError::InvalidInput(format!(
                "{} is outside {}-{}",
                value, PERCENT_MIN, PERCENT_MAX
            )))
        }
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Self(PERCENT_DEFAULT)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for one speak or cache request
///
/// Built fresh from the panel for every request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Voice identifier understood by the engine
    pub voice: String,
    /// Volume in percent (100 = engine default)
    pub volume: i32,
    /// Speaking rate in percent (100 = engine default)
    pub speed: i32,
    /// Pitch in percent (100 = engine default)
    pub pitch: i32,
    /// Output device, `None` for the system default
    pub audio_device_id: Option<i32>,
}

impl PlaybackSettings {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            volume: PERCENT_DEFAULT,
            speed: PERCENT_DEFAULT,
            pitch: PERCENT_DEFAULT,
            audio_device_id: None,
        }
    }

    /// Offsets from the neutral position, as `(volume, speed, pitch)`
    pub fn offsets(&self) -> (i32, i32, i32) {
        (
            self.volume - PERCENT_DEFAULT,
            self.speed - PERCENT_DEFAULT,
            self.pitch - PERCENT_DEFAULT,
        )
    }
}

/// An audio output device reported by an engine factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: i32,
    pub name: String,
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ID: {})", self.name, self.id)
    }
}

/// A selectable voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// Identifier passed to the engine
    pub value: String,
    /// Human-readable label
    #[serde(rename = "displayName")]
    pub display_name: String,
}

impl VoiceDescriptor {
    pub fn new(value: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for VoiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_bounds() {
        assert_eq!(Percent::new(0).unwrap().value(), 0);
        assert_eq!(Percent::new(200).unwrap().value(), 200);
        assert!(Percent::new(-1).is_err());
        assert!(Percent::new(201).is_err());
        assert_eq!(Percent::default().value(), 100);
    }

    #[test]
    fn test_offsets() {
        let mut settings = PlaybackSettings::new("en-US-AriaNeural");
        settings.volume = 150;
        settings.speed = 80;
        assert_eq!(settings.offsets(), (50, -20, 0));
    }

    #[test]
    fn test_display() {
        let device = AudioDevice {
            id: 2,
            name: "Speakers".to_string(),
        };
        assert_eq!(device.to_string(), "Speakers (ID: 2)");

        let voice = VoiceDescriptor::new("zh-CN-XiaoxiaoNeural", "Xiaoxiao");
        assert_eq!(voice.to_string(), "Xiaoxiao (zh-CN-XiaoxiaoNeural)");
    }
}
