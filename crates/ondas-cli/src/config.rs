//! Receiver profiles: TOML files carrying a demodulation setup.
//!
//! A profile is the offline counterpart of the live control surface; each
//! field is optional and overlays [`RxConfig`]'s defaults, and the same
//! range validation applies.

use std::path::{Path, PathBuf};

use ondas_demod::{AgcKind, DemodMode};
use ondas_rx::RxConfig;
use serde::Deserialize;
use thiserror::Error;

/// Profile loading or validation failure.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Failed to read the profile file.
    #[error("failed to read profile '{path}': {source}")]
    ReadFile {
        /// Path of the profile.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML.
    #[error("failed to parse profile: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A field was out of range.
    #[error("invalid profile field {field}: {reason}")]
    InvalidField {
        /// Which field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// AGC section of a profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgcProfile {
    /// Master switch.
    pub enabled: Option<bool>,
    /// "lowpass" or "harris".
    pub kind: Option<String>,
    /// Deadband in dB (0..=10).
    pub deadband_db: Option<i32>,
    /// Blanking interval in blocks (0..=10).
    pub blanking_limit: Option<u32>,
    /// Loop coefficient, exclusive (0.001, 0.999).
    pub alpha: Option<f32>,
    /// Operating point in dBFS (-200..=0).
    pub operating_point_dbfs: Option<i32>,
}

/// A receiver profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    /// Demodulation mode name: none, am, fm, wbfm, lsb, usb.
    pub mode: Option<String>,
    /// Demodulator output gain.
    pub demodulator_gain: Option<f32>,
    /// Squelch threshold in dBFS (-200..=0).
    pub squelch_threshold_dbfs: Option<i32>,
    /// AGC section.
    pub agc: Option<AgcProfile>,
}

impl Profile {
    /// Load and parse a profile file.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Overlay this profile onto a configuration, validating each field.
    pub fn apply(&self, config: &mut RxConfig) -> Result<(), ProfileError> {
        if let Some(mode) = &self.mode {
            config.demod_mode = mode
                .parse::<DemodMode>()
                .map_err(|e| ProfileError::InvalidField {
                    field: "mode",
                    reason: e.to_string(),
                })?;
        }

        if let Some(gain) = self.demodulator_gain {
            if !(gain > 0.0 && gain.is_finite()) {
                return Err(ProfileError::InvalidField {
                    field: "demodulator_gain",
                    reason: format!("{gain} is not a positive finite gain"),
                });
            }
            config.demodulator_gain = Some(gain);
        }

        if let Some(threshold) = self.squelch_threshold_dbfs {
            if !(-200..=0).contains(&threshold) {
                return Err(ProfileError::InvalidField {
                    field: "squelch_threshold_dbfs",
                    reason: format!("{threshold} outside -200..=0"),
                });
            }
            config.squelch_threshold_dbfs = threshold;
        }

        if let Some(agc) = &self.agc {
            apply_agc(agc, config)?;
        }

        Ok(())
    }
}

fn apply_agc(agc: &AgcProfile, config: &mut RxConfig) -> Result<(), ProfileError> {
    if let Some(enabled) = agc.enabled {
        config.agc_enabled = enabled;
    }

    if let Some(kind) = &agc.kind {
        config.agc_kind = match kind.to_ascii_lowercase().as_str() {
            "lowpass" => AgcKind::Lowpass,
            "harris" => AgcKind::Harris,
            other => {
                return Err(ProfileError::InvalidField {
                    field: "agc.kind",
                    reason: format!("unknown kind '{other}'"),
                });
            }
        };
    }

    if let Some(deadband) = agc.deadband_db {
        if !(0..=10).contains(&deadband) {
            return Err(ProfileError::InvalidField {
                field: "agc.deadband_db",
                reason: format!("{deadband} outside 0..=10"),
            });
        }
        config.agc_deadband_db = deadband;
    }

    if let Some(limit) = agc.blanking_limit {
        if limit > 10 {
            return Err(ProfileError::InvalidField {
                field: "agc.blanking_limit",
                reason: format!("{limit} outside 0..=10"),
            });
        }
        config.agc_blanking_limit = limit;
    }

    if let Some(alpha) = agc.alpha {
        if !(alpha > 0.001 && alpha < 0.999) {
            return Err(ProfileError::InvalidField {
                field: "agc.alpha",
                reason: format!("{alpha} outside (0.001, 0.999)"),
            });
        }
        config.agc_alpha = alpha;
    }

    if let Some(dbfs) = agc.operating_point_dbfs {
        if !(-200..=0).contains(&dbfs) {
            return Err(ProfileError::InvalidField {
                field: "agc.operating_point_dbfs",
                reason: format!("{dbfs} outside -200..=0"),
            });
        }
        config.agc_operating_point_dbfs = dbfs;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_profile() {
        let profile: Profile = toml::from_str(
            r#"
            mode = "wbfm"
            demodulator_gain = 9000.0
            squelch_threshold_dbfs = -45

            [agc]
            enabled = true
            kind = "lowpass"
            deadband_db = 2
            blanking_limit = 3
            alpha = 0.6
            operating_point_dbfs = -25
            "#,
        )
        .unwrap();

        let mut config = RxConfig::default();
        profile.apply(&mut config).unwrap();

        assert_eq!(config.demod_mode, DemodMode::WbFm);
        assert_eq!(config.demodulator_gain, Some(9000.0));
        assert_eq!(config.squelch_threshold_dbfs, -45);
        assert!(config.agc_enabled);
        assert_eq!(config.agc_kind, AgcKind::Lowpass);
        assert_eq!(config.agc_deadband_db, 2);
        assert_eq!(config.agc_blanking_limit, 3);
        assert_eq!(config.agc_operating_point_dbfs, -25);
    }

    #[test]
    fn test_empty_profile_keeps_defaults() {
        let profile: Profile = toml::from_str("").unwrap();
        let mut config = RxConfig::default();
        let before = config.clone();
        profile.apply(&mut config).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn test_bad_mode_rejected() {
        let profile: Profile = toml::from_str(r#"mode = "chorus""#).unwrap();
        let mut config = RxConfig::default();
        assert!(profile.apply(&mut config).is_err());
    }

    #[test]
    fn test_out_of_range_field_rejected() {
        let profile: Profile = toml::from_str("squelch_threshold_dbfs = 10").unwrap();
        let mut config = RxConfig::default();
        assert!(profile.apply(&mut config).is_err());
        // State unchanged on failure.
        assert_eq!(config.squelch_threshold_dbfs, -200);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<Profile>("reverb = true").is_err());
    }
}
