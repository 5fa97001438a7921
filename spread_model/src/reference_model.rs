use chrono::Datelike;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::RegressionConfig;
use crate::error::{ForecastError, Result};
use crate::merger::{MergedPanel, PanelRow};
use crate::regression::{fit_ols, stars, Design, OlsFit};

pub const BESS: &str = "bess_gw";
pub const WIND: &str = "wind_gen_gw";
pub const WEEKEND: &str = "weekend";
pub const MONTH_PREFIX: &str = "month";
pub const YEAR_PREFIX: &str = "year";

/// Whether year dummies enter the design
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearEffects {
    Included,
    Excluded,
}

/// Both regression variants plus the offsets extracted for seasonality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFit {
    pub with_year: OlsFit,
    pub without_year: OlsFit,
    pub uses_generation: bool,
    /// Month number -> additive offset relative to the first month present.
    pub month_coefs: BTreeMap<u32, f64>,
    pub weekend_coef: f64,
}

/// Summary numbers persisted alongside the calibrated parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDiagnostics {
    pub bess_coef_with_year: Option<f64>,
    pub bess_coef_without_year: Option<f64>,
    pub wind_coef: Option<f64>,
    pub r_squared: f64,
    pub n_obs: usize,
}

impl ReferenceFit {
    /// Numbers recorded in the calibration artifact
    pub fn diagnostics(&self) -> ReferenceDiagnostics {
        ReferenceDiagnostics {
            bess_coef_with_year: self.with_year.estimate(BESS),
            bess_coef_without_year: self.without_year.estimate(BESS),
            wind_coef: self.with_year.estimate(WIND),
            r_squared: self.with_year.r_squared,
            n_obs: self.with_year.n_obs,
        }
    }
}

/// Regress daily spread on capacity, generation, weekend and calendar fixed
/// effects, with and without year dummies.
///
/// The capacity coefficient is confounded with exogenous price shocks and is
/// kept for diagnostics only. Month and weekend offsets come from the variant
/// with year dummies and feed the seasonal adjustment.
pub fn fit_reference_model(panel: &MergedPanel, config: &RegressionConfig) -> Result<ReferenceFit> {
    if panel.is_empty() {
        return Err(ForecastError::MissingInput("merged panel has no rows".to_string()));
    }

    let coverage = panel.generation_coverage();
    let uses_generation = coverage >= config.generation_coverage_threshold;
    if !uses_generation {
        warn!(
            "Generation covers {:.0}% of days (< {:.0}%); fitting without it",
            coverage * 100.0,
            config.generation_coverage_threshold * 100.0
        );
    }

    let with_year = fit_variant(panel, uses_generation, YearEffects::Included)?;
    let without_year = fit_variant(panel, uses_generation, YearEffects::Excluded)?;

    let month_coefs = with_year
        .with_prefix(MONTH_PREFIX)
        .filter_map(|c| {
            c.name
                .strip_prefix("month_")
                .and_then(|m| m.parse::<u32>().ok())
                .map(|m| (m, c.estimate))
        })
        .collect();
    let weekend_coef = with_year.estimate(WEEKEND).unwrap_or(0.0);

    info!(
        "OLS BESS coefficient: {:+.2} with year dummies, {:+.2} without (diagnostic only)",
        with_year.estimate(BESS).unwrap_or(f64::NAN),
        without_year.estimate(BESS).unwrap_or(f64::NAN)
    );

    Ok(ReferenceFit {
        with_year,
        without_year,
        uses_generation,
        month_coefs,
        weekend_coef,
    })
}

/// Fit one specification over the rows that have every regressor
pub fn fit_variant(panel: &MergedPanel, uses_generation: bool, years: YearEffects) -> Result<OlsFit> {
    let label = match years {
        YearEffects::Included => "reference OLS (with year dummies)",
        YearEffects::Excluded => "reference OLS (no year dummies)",
    };

    let rows: Vec<&PanelRow> = panel
        .rows
        .iter()
        .filter(|r| !uses_generation || r.wind_gen_gw.is_some())
        .collect();
    let n = rows.len();

    let mut design = Design::with_intercept(n);
    design.push(BESS, rows.iter().map(|r| r.bess_gw).collect())?;
    if uses_generation {
        design.push(WIND, rows.iter().map(|r| r.wind_gen_gw.unwrap_or_default()).collect())?;
    }
    design.push(WEEKEND, rows.iter().map(|r| if r.is_weekend() { 1.0 } else { 0.0 }).collect())?;
    let months: Vec<u32> = rows.iter().map(|r| r.date.month()).collect();
    design.push_dummies(MONTH_PREFIX, &months)?;
    if years == YearEffects::Included {
        let years: Vec<i32> = rows.iter().map(|r| r.date.year()).collect();
        design.push_dummies(YEAR_PREFIX, &years)?;
    }

    debug!("{}: {} rows, regressors {:?}", label, n, design.names());
    let y: Vec<f64> = rows.iter().map(|r| r.spread).collect();
    let fit = fit_ols(&y, &design, label)?;

    info!("{}: {} observations, R² {:.3}", label, fit.n_obs, fit.r_squared);
    for name in [BESS, WIND, WEEKEND] {
        if let Some(c) = fit.coefficient(name) {
            info!(
                "  {}: {:+.2} (SE={:.2}, p={:.4}) {}",
                name,
                c.estimate,
                c.std_error,
                c.p_value,
                stars(c.p_value)
            );
        }
    }
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpreadSource;
    use chrono::{Duration, NaiveDate};

    /// Two years of synthetic days with a known month shape and weekend dip.
    fn synthetic_panel(with_wind: bool) -> MergedPanel {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let rows = (0..730)
            .map(|i| {
                let date = start + Duration::days(i);
                let month = date.month() as f64;
                let weekend = matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun);
                let bess_gw = 3.0 + 0.1 * ((i * 13) % 17) as f64;
                let wind = 8.0 + ((i * 7) % 11) as f64;
                let noise = if i % 2 == 0 { 0.5 } else { -0.5 };
                let spread = 100.0 + 2.0 * (month - 1.0) - 10.0 * if weekend { 1.0 } else { 0.0 }
                    + if with_wind { -1.5 * wind } else { 0.0 }
                    + noise;
                PanelRow {
                    date,
                    spread,
                    mean_price: None,
                    bess_gw,
                    wind_gen_gw: with_wind.then_some(wind),
                }
            })
            .collect();
        MergedPanel {
            source: SpreadSource::DirectWholesale,
            rows,
        }
    }

    #[test]
    fn test_recovers_month_and_weekend_effects() {
        let panel = synthetic_panel(true);
        let config = RegressionConfig {
            generation_coverage_threshold: 0.5,
        };
        let fit = fit_reference_model(&panel, &config).unwrap();

        assert!(fit.uses_generation);
        assert_eq!(fit.month_coefs.len(), 11);
        assert!(!fit.month_coefs.contains_key(&1));
        assert!((fit.month_coefs[&7] - 12.0).abs() < 0.5);
        assert!((fit.weekend_coef + 10.0).abs() < 0.5);
        assert!((fit.with_year.estimate(WIND).unwrap() + 1.5).abs() < 0.1);
        assert!(fit.without_year.estimate(YEAR_PREFIX).is_none());
        assert!(fit.with_year.coefficient("year_2024").is_some());
    }

    #[test]
    fn test_skips_sparse_generation() {
        let panel = synthetic_panel(false);
        let config = RegressionConfig {
            generation_coverage_threshold: 0.5,
        };
        let fit = fit_reference_model(&panel, &config).unwrap();
        assert!(!fit.uses_generation);
        assert!(fit.with_year.coefficient(WIND).is_none());
        assert_eq!(fit.diagnostics().n_obs, 730);
    }

    #[test]
    fn test_fails_loudly_when_dummies_outnumber_days() {
        // One day in each month of a single year: const, bess, weekend and
        // eleven month dummies give 14 regressors for 12 rows.
        let rows = (1..=12)
            .map(|month| PanelRow {
                date: NaiveDate::from_ymd_opt(2023, month, 4).unwrap(),
                spread: 90.0 + month as f64,
                mean_price: None,
                bess_gw: 3.0 + 0.2 * month as f64,
                wind_gen_gw: None,
            })
            .collect();
        let panel = MergedPanel {
            source: SpreadSource::TariffProxy,
            rows,
        };
        let config = RegressionConfig {
            generation_coverage_threshold: 0.5,
        };

        let result = fit_reference_model(&panel, &config);
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData { observations: 12, required: 15, .. })
        ));
    }

    #[test]
    fn test_small_panel_without_calendar_dummies_still_fits() {
        // Five January days only need const, bess and weekend.
        let mut panel = synthetic_panel(false);
        panel.rows.truncate(5);
        let config = RegressionConfig {
            generation_coverage_threshold: 0.5,
        };
        let fit = fit_reference_model(&panel, &config).unwrap();
        assert_eq!(fit.with_year.n_obs, 5);
        assert_eq!(fit.with_year.coefficients.len(), 3);
        assert!(fit.month_coefs.is_empty());
    }
}
