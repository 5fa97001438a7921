use chrono::Datelike;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::capacity::ScenarioFan;
use crate::error::{ForecastError, Result};
use crate::models::{
    CapacityTrajectory, CompressionParams, ElasticityBand, ForecastRow, PassThroughParams, PassThroughStatus,
    Scenario, ScenarioSpreads,
};
use crate::seasonal::SeasonalProfile;
use crate::wind::WindProjection;

/// Everything the composer needs, borrowed from the calibration stages
pub struct ForecastInputs<'a> {
    /// Base-case monthly capacity over the forecast horizon.
    pub base: &'a CapacityTrajectory,
    pub base_scenario: Scenario,
    pub fan: &'a ScenarioFan,
    pub params: &'a CompressionParams,
    pub pass_through: &'a PassThroughParams,
    pub wind: &'a WindProjection,
    /// £/MWh -> tariff display unit.
    pub tariff_unit_divisor: f64,
}

/// Composed monthly forecast plus the provenance flags consumers must surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub rows: Vec<ForecastRow>,
    pub pass_through_status: PassThroughStatus,
    /// Wind context uses the flat fallback, not installed capacity.
    pub wind_fallback: bool,
}

/// Calendar-year means of the forecast rows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub year: i32,
    pub months: usize,
    pub bess_gw: f64,
    pub wholesale_spread: f64,
    pub agile_spread_p_kwh: f64,
}

struct SpreadEvaluator<'a> {
    params: &'a CompressionParams,
    seasonal: SeasonalProfile,
}

impl SpreadEvaluator<'_> {
    /// Seasonally adjusted wholesale spread, never negative.
    fn spread(&self, capacity_gw: f64, alpha: f64, month: u32) -> Result<f64> {
        let level = self.params.spread_at(capacity_gw, alpha)?;
        Ok((level * self.seasonal.factor(month)).max(0.0))
    }
}

/// Compose one forecast row per base-case month.
///
/// The scenario fan and elasticity band repeat the wholesale steps at other
/// capacities or alphas and never enter the tariff step.
pub fn compose_forecast(inputs: &ForecastInputs<'_>) -> Result<Forecast> {
    if inputs.base.is_empty() {
        return Err(ForecastError::MissingInput(
            "base-case capacity trajectory covers no forecast months".to_string(),
        ));
    }
    inputs.params.validate()?;
    let evaluator = SpreadEvaluator {
        params: inputs.params,
        seasonal: SeasonalProfile::from_params(inputs.params)?,
    };
    let alpha = inputs.params.alpha;

    if let PassThroughStatus::Degraded { reason } = &inputs.pass_through.status {
        warn!("Tariff spread uses an unvalidated identity pass-through ({})", reason);
    }

    let mut rows = Vec::with_capacity(inputs.base.len());
    for point in inputs.base.points() {
        let month = point.month;
        let calendar_month = month.month();

        // Central path: power law, seasonal factor, clamp, then pass-through
        let wholesale_spread = evaluator.spread(point.capacity_gw, alpha.central, calendar_month)?;
        let agile_spread = inputs.pass_through.tariff_spread(wholesale_spread);

        // Scenario fan at the same month, central alpha
        let mut scenario_spreads = ScenarioSpreads::default();
        for scenario in inputs.fan.scenarios().filter(|s| *s != inputs.base_scenario) {
            if let Some(capacity_gw) = inputs.fan.capacity_at(scenario, month) {
                scenario_spreads.set(scenario, evaluator.spread(capacity_gw, alpha.central, calendar_month)?);
            }
        }

        // Elasticity band at base-case capacity
        let elasticity = ElasticityBand {
            conservative: evaluator.spread(point.capacity_gw, alpha.low, calendar_month)?,
            aggressive: evaluator.spread(point.capacity_gw, alpha.high, calendar_month)?,
        };

        rows.push(ForecastRow {
            date: month.first_day(),
            bess_gw: point.capacity_gw,
            wind_gen_gw: inputs.wind.generation_gw(month),
            wholesale_spread,
            agile_spread,
            agile_spread_p_kwh: agile_spread / inputs.tariff_unit_divisor,
            scenario_spreads,
            elasticity,
        });
    }

    info!("Composed {} forecast months", rows.len());
    Ok(Forecast {
        rows,
        pass_through_status: inputs.pass_through.status.clone(),
        wind_fallback: inputs.wind.is_fallback(),
    })
}

/// Per-year means of the forecast rows.
pub fn annual_summary(rows: &[ForecastRow]) -> Vec<AnnualSummary> {
    let mut by_year: BTreeMap<i32, Vec<&ForecastRow>> = BTreeMap::new();
    for row in rows {
        by_year.entry(row.date.year()).or_default().push(row);
    }
    by_year
        .into_iter()
        .map(|(year, rows)| {
            let n = rows.len() as f64;
            let mean = |f: fn(&ForecastRow) -> f64| rows.iter().map(|r| f(*r)).sum::<f64>() / n;
            AnnualSummary {
                year,
                months: rows.len(),
                bess_gw: mean(|r| r.bess_gw),
                wholesale_spread: mean(|r| r.wholesale_spread),
                agile_spread_p_kwh: mean(|r| r.agile_spread_p_kwh),
            }
        })
        .collect()
}
