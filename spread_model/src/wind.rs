use log::{info, warn};

use crate::config::WindConfig;
use crate::models::{RenewableCapacity, YearMonth};

/// Forecast-month wind generation, for context only.
///
/// Installed capacity grows linearly from the latest known month and is
/// scaled by a month-indexed capacity factor. Without an installed-capacity
/// series every month gets the configured fallback average.
#[derive(Debug, Clone, PartialEq)]
pub struct WindProjection {
    latest: Option<(YearMonth, f64)>,
    monthly_growth_gw: f64,
    capacity_factors: Vec<f64>,
    fallback_gw: f64,
}

impl WindProjection {
    pub fn new(renewables: Option<&[RenewableCapacity]>, config: &WindConfig) -> Self {
        let latest = renewables
            .and_then(|rows| rows.iter().max_by_key(|r| r.month))
            .map(|r| (r.month, r.total_wind_gw()));
        match latest {
            Some((month, gw)) => info!("Wind projection from {:.1} GW installed at {}", gw, month),
            None => warn!(
                "No installed renewables series; assuming {:.1} GW average wind generation",
                config.fallback_generation_gw
            ),
        }
        Self {
            latest,
            monthly_growth_gw: config.annual_capacity_growth_gw / 12.0,
            capacity_factors: config.monthly_capacity_factors.clone(),
            fallback_gw: config.fallback_generation_gw,
        }
    }

    /// True when no installed capacity was available
    pub fn is_fallback(&self) -> bool {
        self.latest.is_none()
    }

    /// Projected average wind generation (GW) for `month`.
    pub fn generation_gw(&self, month: YearMonth) -> f64 {
        let Some((latest_month, installed_gw)) = self.latest else {
            return self.fallback_gw;
        };
        let months_ahead = month.months_since(latest_month) as f64;
        let capacity_gw = installed_gw + self.monthly_growth_gw * months_ahead;
        let factor = self
            .capacity_factors
            .get(month.month() as usize - 1)
            .copied()
            .unwrap_or(0.30);
        capacity_gw * factor
    }
}
