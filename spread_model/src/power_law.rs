use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::CalibrationConfig;
use crate::error::{ForecastError, Result};
use crate::merger::MergedPanel;
use crate::models::{CompressionParams, YearMonth};
use crate::reference_model::ReferenceFit;

impl CompressionParams {
    /// Modelled wholesale spread (£/MWh) at `capacity_gw` for elasticity `alpha`:
    ///
    /// `spread(C) = floor + (spread_ref - floor) * (bess_ref / C)^alpha`
    ///
    /// Undefined at or below zero capacity. Returns `spread_ref` exactly at
    /// `bess_ref`.
    pub fn spread_at(&self, capacity_gw: f64, alpha: f64) -> Result<f64> {
        if !capacity_gw.is_finite() || capacity_gw <= 0.0 {
            return Err(ForecastError::UndefinedEvaluation(format!(
                "power law evaluated at capacity {} GW",
                capacity_gw
            )));
        }
        if capacity_gw == self.bess_ref {
            return Ok(self.spread_ref);
        }
        let ratio = (self.bess_ref / capacity_gw).powf(alpha);
        Ok(self.floor + (self.spread_ref - self.floor) * ratio)
    }

    /// Spread under the central elasticity
    pub fn central_spread(&self, capacity_gw: f64) -> Result<f64> {
        self.spread_at(capacity_gw, self.alpha.central)
    }
}

/// Monthly means of the merged daily panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    pub month: YearMonth,
    pub bess_gw: f64,
    pub spread: f64,
    /// Mean over days with generation data; `None` when the month has none.
    pub wind_gen_gw: Option<f64>,
    pub n_days: usize,
}

/// Average the daily panel to months; calibration only ever sees months
pub fn aggregate_monthly(panel: &MergedPanel) -> Vec<MonthlyObservation> {
    #[derive(Default)]
    struct Acc {
        bess: f64,
        spread: f64,
        wind: f64,
        wind_days: usize,
        days: usize,
    }

    let mut by_month: BTreeMap<YearMonth, Acc> = BTreeMap::new();
    for row in &panel.rows {
        let acc = by_month.entry(row.month()).or_default();
        acc.bess += row.bess_gw;
        acc.spread += row.spread;
        acc.days += 1;
        if let Some(wind) = row.wind_gen_gw {
            acc.wind += wind;
            acc.wind_days += 1;
        }
    }

    by_month
        .into_iter()
        .map(|(month, acc)| {
            let n = acc.days as f64;
            MonthlyObservation {
                month,
                bess_gw: acc.bess / n,
                spread: acc.spread / n,
                wind_gen_gw: (acc.wind_days > 0).then(|| acc.wind / acc.wind_days as f64),
                n_days: acc.days,
            }
        })
        .collect()
}

/// Months that anchored `spread_ref` and `bess_ref`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceWindow {
    pub first: YearMonth,
    pub last: YearMonth,
    pub n_months: usize,
    /// True when too few months met the capacity threshold.
    pub used_fallback: bool,
}

/// Illustrative spread at one capacity under all three alphas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub capacity_gw: f64,
    pub central: f64,
    pub conservative: f64,
    pub aggressive: f64,
}

/// Calibrated parameters with the window and projection that back them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub params: CompressionParams,
    pub window: ReferenceWindow,
    pub projection: Vec<ProjectionRow>,
}

/// Picks the months that anchor the curve.
pub fn select_reference_window<'a>(
    monthly: &'a [MonthlyObservation],
    config: &CalibrationConfig,
) -> Result<(Vec<&'a MonthlyObservation>, bool)> {
    if monthly.is_empty() {
        return Err(ForecastError::insufficient("reference window", 0, 1));
    }
    let window = &config.reference_window;
    let recent: Vec<&MonthlyObservation> = monthly
        .iter()
        .filter(|m| m.bess_gw >= window.capacity_threshold_gw)
        .collect();
    if recent.len() >= window.min_months {
        return Ok((recent, false));
    }

    warn!(
        "Only {} months at >= {:.1} GW (need {}); anchoring on the last {} months",
        recent.len(),
        window.capacity_threshold_gw,
        window.min_months,
        window.fallback_months
    );
    let skip = monthly.len().saturating_sub(window.fallback_months);
    Ok((monthly[skip..].iter().collect(), true))
}

/// Anchors the power law on recent monthly observations and attaches the
/// seasonal offsets of the reference regression.
pub fn calibrate(
    monthly: &[MonthlyObservation],
    reference: &ReferenceFit,
    config: &CalibrationConfig,
) -> Result<Calibration> {
    // Anchor the curve on recent months
    let (window, used_fallback) = select_reference_window(monthly, config)?;
    let n = window.len() as f64;
    let spread_ref = window.iter().map(|m| m.spread).sum::<f64>() / n;
    let bess_ref = window.iter().map(|m| m.bess_gw).sum::<f64>() / n;

    // Floor and alphas are external; only the anchor comes from local data
    let params = CompressionParams {
        floor: config.floor.floor(),
        spread_ref,
        bess_ref,
        alpha: config.alpha.range(),
        month_coefs: reference.month_coefs.clone(),
        weekend_coef: reference.weekend_coef,
    };
    params.validate()?;

    let reference_window = ReferenceWindow {
        first: window.first().map(|m| m.month).unwrap_or(monthly[0].month),
        last: window.last().map(|m| m.month).unwrap_or(monthly[0].month),
        n_months: window.len(),
        used_fallback,
    };
    info!(
        "Reference point: {:.2} GW, {:.2} £/MWh ({} months, {} to {})",
        bess_ref, spread_ref, reference_window.n_months, reference_window.first, reference_window.last
    );
    info!(
        "Floor: {:.2} £/MWh; alpha central {:.2}, range {:.2} to {:.2}",
        params.floor, params.alpha.central, params.alpha.low, params.alpha.high
    );

    let projection = projection_table(&params, &config.projection_capacities_gw)?;

    Ok(Calibration {
        params,
        window: reference_window,
        projection,
    })
}

/// Spreads at the reference capacity followed by each illustrative capacity.
pub fn projection_table(params: &CompressionParams, capacities_gw: &[f64]) -> Result<Vec<ProjectionRow>> {
    std::iter::once(params.bess_ref)
        .chain(capacities_gw.iter().copied())
        .map(|capacity_gw| -> Result<ProjectionRow> {
            Ok(ProjectionRow {
                capacity_gw,
                central: params.spread_at(capacity_gw, params.alpha.central)?,
                conservative: params.spread_at(capacity_gw, params.alpha.low)?,
                aggressive: params.spread_at(capacity_gw, params.alpha.high)?,
            })
        })
        .collect()
}
