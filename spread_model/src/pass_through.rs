use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{PassThroughParams, PassThroughStatus, SpreadSeries};
use crate::regression::{fit_ols, Design, INTERCEPT};

const WHOLESALE_SPREAD: &str = "wholesale_spread";
const WHOLESALE_MEAN: &str = "wholesale_mean";

struct OverlapDay {
    tariff_spread: f64,
    tariff_mean: f64,
    wholesale_spread: f64,
    wholesale_mean: f64,
}

/// Inner join on date, keeping days where all four values are known.
fn overlapping_days(tariff: &SpreadSeries, wholesale: &SpreadSeries) -> Vec<OverlapDay> {
    let by_date: HashMap<NaiveDate, (f64, Option<f64>)> = wholesale
        .days
        .iter()
        .map(|d| (d.date, (d.spread, d.mean_price)))
        .collect();

    tariff
        .days
        .iter()
        .filter_map(|t| {
            let &(wholesale_spread, wholesale_mean) = by_date.get(&t.date)?;
            Some(OverlapDay {
                tariff_spread: t.spread,
                tariff_mean: t.mean_price?,
                wholesale_spread,
                wholesale_mean: wholesale_mean?,
            })
        })
        .collect()
}

/// Fit the wholesale -> tariff mapping on overlapping days: tariff spread on
/// wholesale spread and tariff mean price on wholesale mean price.
///
/// Returns the identity mapping flagged as unvalidated when `wholesale` is
/// absent or shares no days with `tariff`.
pub fn fit_pass_through(tariff: &SpreadSeries, wholesale: Option<&SpreadSeries>) -> Result<PassThroughParams> {
    let Some(wholesale) = wholesale else {
        warn!("No wholesale price data; tariff pass-through is an UNVALIDATED identity mapping");
        return Ok(PassThroughParams::identity(
            tariff.days.len(),
            "no wholesale price series available",
        ));
    };

    let overlap = overlapping_days(tariff, wholesale);
    if overlap.is_empty() {
        warn!("Wholesale and tariff series share no days; tariff pass-through is an UNVALIDATED identity mapping");
        return Ok(PassThroughParams::identity(
            tariff.days.len(),
            "no overlap between wholesale and tariff series",
        ));
    }
    let n = overlap.len();
    info!("Overlapping wholesale/tariff days: {}", n);

    let mut spread_design = Design::with_intercept(n);
    spread_design.push(WHOLESALE_SPREAD, overlap.iter().map(|d| d.wholesale_spread).collect())?;
    let tariff_spreads: Vec<f64> = overlap.iter().map(|d| d.tariff_spread).collect();
    let spread_fit = fit_ols(&tariff_spreads, &spread_design, "pass-through spread")?;

    let mut price_design = Design::with_intercept(n);
    price_design.push(WHOLESALE_MEAN, overlap.iter().map(|d| d.wholesale_mean).collect())?;
    let tariff_means: Vec<f64> = overlap.iter().map(|d| d.tariff_mean).collect();
    let price_fit = fit_ols(&tariff_means, &price_design, "pass-through price level")?;

    let params = PassThroughParams {
        spread_multiplier: spread_fit.estimate(WHOLESALE_SPREAD).unwrap_or(1.0),
        spread_intercept: spread_fit.estimate(INTERCEPT).unwrap_or(0.0),
        spread_r_squared: Some(spread_fit.r_squared),
        price_multiplier: price_fit.estimate(WHOLESALE_MEAN).unwrap_or(1.0),
        price_adder: price_fit.estimate(INTERCEPT).unwrap_or(0.0),
        price_r_squared: Some(price_fit.r_squared),
        n_obs: n,
        status: PassThroughStatus::Fitted,
    };
    info!(
        "Spread pass-through: tariff = {:.2} + {:.3} x wholesale (R² {:.3})",
        params.spread_intercept, params.spread_multiplier, spread_fit.r_squared
    );
    info!(
        "Price pass-through: tariff = {:.2} + {:.3} x wholesale (R² {:.3})",
        params.price_adder, params.price_multiplier, price_fit.r_squared
    );
    Ok(params)
}
