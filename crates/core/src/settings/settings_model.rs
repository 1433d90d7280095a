use serde::{Deserialize, Serialize};

use crate::constants::{DECIMAL_PRECISION, MAX_PAYOUT_PRECISION};
use crate::errors::{Error, Result, ValidationError};

/// When an option pool top-up is carved out relative to a round's pricing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PoolTiming {
    /// Pool grows before pricing; only existing holders are diluted by it.
    #[default]
    PreMoney,
    /// Pool grows after pricing; everyone, the new investor included, is diluted.
    PostMoney,
}

/// How preferred classes that share a seniority rank are ordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SeniorityTieBreak {
    /// Last money in, first money out.
    #[default]
    MostRecentFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Used by rounds that do not state their own pool timing.
    pub default_pool_timing: PoolTiming,
    pub seniority_tie_break: SeniorityTieBreak,
    /// Number of decimal places payouts are rounded to.
    pub payout_precision: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_pool_timing: PoolTiming::PreMoney,
            seniority_tie_break: SeniorityTieBreak::MostRecentFirst,
            payout_precision: DECIMAL_PRECISION,
        }
    }
}

impl EngineSettings {
    /// Parses settings from JSON. Missing keys take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let settings: EngineSettings = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.payout_precision > MAX_PAYOUT_PRECISION {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "payoutPrecision must be at most {}, got {}",
                MAX_PAYOUT_PRECISION, self.payout_precision
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = EngineSettings::from_json(r#"{"defaultPoolTiming":"postMoney"}"#).unwrap();
        assert_eq!(settings.default_pool_timing, PoolTiming::PostMoney);
        assert_eq!(
            settings.seniority_tie_break,
            SeniorityTieBreak::MostRecentFirst
        );
        assert_eq!(settings.payout_precision, DECIMAL_PRECISION);
    }

    #[test]
    fn test_empty_object_is_default() {
        let settings = EngineSettings::from_json("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_malformed_json_is_validation_error() {
        let err = EngineSettings::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Json(_))));
    }

    #[test]
    fn test_excessive_precision_rejected() {
        let err = EngineSettings::from_json(r#"{"payoutPrecision":20}"#).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidInput(_))
        ));
    }
}
