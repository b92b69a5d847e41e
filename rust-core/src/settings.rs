//! Measurement settings
//!
//! Read-only input to the calibration and sweep state machines. Stored as
//! JSON by whoever owns persistence.

use crate::audio::{SampleCollector, DEFAULT_COLLECTOR_CAPACITY};
use crate::units::{to_normal, Metric};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Sample rates the meter accepts
pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8000, 16000, 32000, 44100, 48000, 96000];

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("{name} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Low cutoff ({low} Hz) must be below high cutoff ({high} Hz)")]
    InvertedFrequencyRange { low: f64, high: f64 },

    #[error("{name} = {frequency} Hz needs {frames} frames per window but the sample buffer holds {capacity}")]
    WindowTooLarge {
        name: &'static str,
        frequency: f64,
        frames: usize,
        capacity: usize,
    },

    #[error("Settings cannot change while a measurement is running")]
    LockedWhileRunning,
}

/// Which input channel carries the reference (generated) signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceChannel {
    #[default]
    Left,
    Right,
}

/// Fractional-octave spacing of sweep points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrequencyIncrement {
    #[default]
    OneTwentyFourthOctave,
    OneFortyEighthOctave,
}

impl FrequencyIncrement {
    pub fn points_per_octave(self) -> u32 {
        match self {
            FrequencyIncrement::OneTwentyFourthOctave => 24,
            FrequencyIncrement::OneFortyEighthOctave => 48,
        }
    }
}

/// Channel indices inside an interleaved input frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOffsets {
    /// Channel reading across the DUT
    pub input: usize,
    /// Channel reading the generated reference
    pub output: usize,
}

/// General meter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub input_device_index: usize,
    pub output_device_index: usize,
    pub output_volume: f32,

    pub sample_rate: u32,
    pub input_reference: ReferenceChannel,
    /// Series reference resistor in Ω
    pub reference_resistance: f64,
    pub calibration_frequency: f64,

    pub transient_time_ms: f64,
    pub low_cutoff_frequency: f64,
    pub high_cutoff_frequency: f64,
    pub frequency_increment: FrequencyIncrement,

    pub retry_timeout_secs: f64,
    pub averaging_iterations: u32,
    pub signal_intervals_count: u32,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            input_device_index: 0,
            output_device_index: 0,
            output_volume: 1.0,
            sample_rate: 48000,
            input_reference: ReferenceChannel::Left,
            reference_resistance: 100.0,
            calibration_frequency: 1000.0,
            transient_time_ms: 100.0,
            low_cutoff_frequency: 200.0,
            high_cutoff_frequency: 1000.0,
            frequency_increment: FrequencyIncrement::OneTwentyFourthOctave,
            retry_timeout_secs: 1.0,
            averaging_iterations: 100,
            signal_intervals_count: 3,
        }
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), SettingsError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

impl GeneralSettings {
    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(SettingsError::UnsupportedSampleRate(self.sample_rate));
        }

        let nyquist = self.sample_rate as f64 / 2.0;

        check_range("output_volume", self.output_volume as f64, 0.0, 1.0)?;
        check_range("reference_resistance", self.reference_resistance, f64::MIN_POSITIVE, f64::MAX)?;
        check_range("calibration_frequency", self.calibration_frequency, f64::MIN_POSITIVE, nyquist)?;
        check_range("transient_time_ms", self.transient_time_ms, 10.0, 1000.0)?;
        check_range("low_cutoff_frequency", self.low_cutoff_frequency, f64::MIN_POSITIVE, nyquist)?;
        check_range("high_cutoff_frequency", self.high_cutoff_frequency, f64::MIN_POSITIVE, nyquist)?;
        check_range("retry_timeout_secs", self.retry_timeout_secs, 0.0, 5.0)?;
        check_range("averaging_iterations", self.averaging_iterations as f64, 1.0, 100.0)?;
        check_range("signal_intervals_count", self.signal_intervals_count as f64, 1.0, 10.0)?;

        if self.low_cutoff_frequency >= self.high_cutoff_frequency {
            return Err(SettingsError::InvertedFrequencyRange {
                low: self.low_cutoff_frequency,
                high: self.high_cutoff_frequency,
            });
        }

        // The lowest sweep point has the longest window
        self.check_window("calibration_frequency", self.calibration_frequency)?;
        self.check_window("low_cutoff_frequency", self.low_cutoff_frequency)?;

        Ok(())
    }

    fn check_window(&self, name: &'static str, frequency: f64) -> Result<(), SettingsError> {
        let frames = SampleCollector::window_len(
            frequency,
            self.sample_rate as f64,
            self.signal_intervals_count as usize,
        );
        if frames > DEFAULT_COLLECTOR_CAPACITY {
            return Err(SettingsError::WindowTooLarge {
                name,
                frequency,
                frames,
                capacity: DEFAULT_COLLECTOR_CAPACITY,
            });
        }
        Ok(())
    }

    pub fn channel_offsets(&self) -> ChannelOffsets {
        match self.input_reference {
            ReferenceChannel::Left => ChannelOffsets { input: 0, output: 1 },
            ReferenceChannel::Right => ChannelOffsets { input: 1, output: 0 },
        }
    }

    pub fn transient_time(&self) -> Duration {
        Duration::from_secs_f64(to_normal(self.transient_time_ms, Metric::Milli).max(0.0))
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.retry_timeout_secs.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = GeneralSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.channel_offsets(), ChannelOffsets { input: 0, output: 1 });
        assert!((settings.transient_time().as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = GeneralSettings::from_json(
            r#"{ "reference_resistance": 47.0, "input_reference": "right", "frequency_increment": "OneFortyEighthOctave" }"#,
        )
        .unwrap();

        assert_eq!(settings.reference_resistance, 47.0);
        assert_eq!(settings.channel_offsets(), ChannelOffsets { input: 1, output: 0 });
        assert_eq!(settings.frequency_increment.points_per_octave(), 48);
        assert_eq!(settings.sample_rate, 48000);
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = GeneralSettings::default();
        settings.averaging_iterations = 12;

        let json = settings.to_json().unwrap();
        assert_eq!(GeneralSettings::from_json(&json).unwrap(), settings);
    }

    #[test]
    fn test_rejects_unsupported_sample_rate() {
        let result = GeneralSettings::from_json(r#"{ "sample_rate": 22050 }"#);
        assert!(matches!(result, Err(SettingsError::UnsupportedSampleRate(22050))));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let settings = GeneralSettings {
            averaging_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::OutOfRange { name: "averaging_iterations", .. })
        ));

        let settings = GeneralSettings {
            high_cutoff_frequency: 30000.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let settings = GeneralSettings {
            low_cutoff_frequency: 2000.0,
            high_cutoff_frequency: 1000.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvertedFrequencyRange { .. })
        ));
    }

    #[test]
    fn test_rejects_windows_beyond_buffer() {
        // 3 periods of 20 Hz at 48 kHz
        let settings = GeneralSettings {
            low_cutoff_frequency: 20.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::WindowTooLarge {
                name: "low_cutoff_frequency",
                frames: 7200,
                capacity: 4096,
                ..
            })
        ));

        let settings = GeneralSettings {
            calibration_frequency: 50.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::WindowTooLarge { name: "calibration_frequency", .. })
        ));

        // 4096 frames exactly still fit
        let settings = GeneralSettings {
            sample_rate: 8000,
            low_cutoff_frequency: 8000.0 / 1024.0,
            high_cutoff_frequency: 1000.0,
            signal_intervals_count: 4,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            GeneralSettings::from_json("{ not json"),
            Err(SettingsError::Parse(_))
        ));
    }
}
