use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ForecastError, Result};
use crate::models::CompressionParams;

const MIN_SPREAD_REF: f64 = 1e-9;

/// Multiplicative month factors derived from additive regression offsets.
///
/// Months without an offset (the dropped reference month) count as zero. The
/// factors average to exactly one over the year, so the power law keeps
/// setting the annual level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    factors: [f64; 12],
}

impl SeasonalProfile {
    /// Build factors from additive month offsets; months without an offset count as zero
    pub fn new(month_coefs: &BTreeMap<u32, f64>, spread_ref: f64) -> Result<Self> {
        if !spread_ref.is_finite() || spread_ref.abs() < MIN_SPREAD_REF {
            return Err(ForecastError::UndefinedEvaluation(format!(
                "seasonal factors need a non-zero reference spread, got {}",
                spread_ref
            )));
        }
        let offsets: [f64; 12] = std::array::from_fn(|i| {
            month_coefs.get(&(i as u32 + 1)).copied().unwrap_or(0.0)
        });
        let mean = offsets.iter().sum::<f64>() / 12.0;
        Ok(Self {
            factors: offsets.map(|offset| 1.0 + (offset - mean) / spread_ref),
        })
    }

    /// Factors implied by calibrated parameters
    pub fn from_params(params: &CompressionParams) -> Result<Self> {
        Self::new(&params.month_coefs, params.spread_ref)
    }

    /// Factor for calendar month 1..=12; 1.0 outside that range.
    pub fn factor(&self, month: u32) -> f64 {
        month
            .checked_sub(1)
            .and_then(|i| self.factors.get(i as usize))
            .copied()
            .unwrap_or(1.0)
    }

    pub fn factors(&self) -> &[f64; 12] {
        &self.factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets() -> BTreeMap<u32, f64> {
        (2..=12).map(|m| (m, -3.0 * m as f64 + if m > 9 { 20.0 } else { 0.0 })).collect()
    }

    #[test]
    fn test_factors_preserve_annual_mean() {
        let profile = SeasonalProfile::new(&offsets(), 95.0).unwrap();
        let mean = profile.factors().iter().sum::<f64>() / 12.0;
        assert!((mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_factor_formula() {
        let coefs = BTreeMap::from([(7, -24.0)]);
        let profile = SeasonalProfile::new(&coefs, 120.0).unwrap();
        // mean offset is -2, so July is (-24 + 2) / 120 below one
        assert!((profile.factor(7) - (1.0 - 22.0 / 120.0)).abs() < 1e-12);
        assert!((profile.factor(1) - (1.0 + 2.0 / 120.0)).abs() < 1e-12);
        assert_eq!(profile.factor(13), 1.0);
        assert_eq!(profile.factor(0), 1.0);
    }

    #[test]
    fn test_guards_zero_reference_spread() {
        assert!(matches!(
            SeasonalProfile::new(&offsets(), 0.0),
            Err(ForecastError::UndefinedEvaluation(_))
        ));
        assert!(SeasonalProfile::new(&offsets(), 1e-12).is_err());
    }
}
