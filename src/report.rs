use spread_model::config::CalibrationConfig;
use spread_model::reference_model::{ReferenceFit, BESS, WEEKEND, WIND};
use spread_model::regression::{stars, OlsFit};
use spread_model::{
    AnnualSummary, CapacityTrajectory, CompressionParams, Forecast, PassThroughParams, PassThroughStatus,
    Scenario, YearMonth,
};

use crate::pipeline::CalibrationArtifact;

pub fn banner(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

pub fn print_capacity(base: &CapacityTrajectory, scenarios: &[(Scenario, CapacityTrajectory)], config: &CalibrationConfig) {
    if let Some(last) = base.last_historic() {
        println!("Historic BESS through {}: {:.1} GW", last.month, last.capacity_gw);
    }
    println!("Base case: {}", config.capacity.base_scenario.label());
    println!("\n{:<26} {:>8} {:>8} {:>8}", "Scenario", "2026", "2028", "2030");
    let years = [2026, 2028, 2030];
    for (scenario, path) in scenarios {
        let values: Vec<String> = years
            .iter()
            .map(|&y| {
                YearMonth::new(y, 1)
                    .and_then(|m| path.capacity_at(m))
                    .map(|gw| format!("{:.1}", gw))
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect();
        println!("{:<26} {:>8} {:>8} {:>8}", scenario.label(), values[0], values[1], values[2]);
    }
    println!("Sources: {}; {}", config.capacity.historic_source, config.capacity.fes_source);
}

fn print_coefficients(title: &str, fit: &OlsFit) {
    println!("\n{} (N={}, R²={:.3})", title, fit.n_obs, fit.r_squared);
    for name in [BESS, WIND, WEEKEND] {
        if let Some(c) = fit.coefficient(name) {
            println!(
                "  {:<12} {:>+9.2}  (SE={:.2}, p={:.4}) {}",
                name,
                c.estimate,
                c.std_error,
                c.p_value,
                stars(c.p_value)
            );
        }
    }
}

pub fn print_calibration(artifact: &CalibrationArtifact, reference: &ReferenceFit) {
    let params = &artifact.params;
    println!("Spread source: {}", artifact.spread_source.describe());
    println!("Config version: {}", artifact.config_version);

    print_coefficients("OLS with year dummies", &reference.with_year);
    print_coefficients("OLS without year dummies", &reference.without_year);
    println!("  BESS coefficients are confounded with price shocks and are not used.");

    println!("\nSeasonal offsets (vs month 1 where present):");
    for (month, offset) in &params.month_coefs {
        println!("  month {:>2}: {:>+8.2} £/MWh", month, offset);
    }
    println!("  weekend:  {:>+8.2} £/MWh", params.weekend_coef);

    let window = &artifact.reference_window;
    println!(
        "\nReference: {:.2} GW -> {:.2} £/MWh ({} months, {} to {}{})",
        params.bess_ref,
        params.spread_ref,
        window.n_months,
        window.first,
        window.last,
        if window.used_fallback { ", fallback window" } else { "" }
    );
    println!(
        "spread = {:.1} + ({:.1} - {:.1}) x ({:.2} / bess_gw)^alpha",
        params.floor, params.spread_ref, params.floor, params.bess_ref
    );
    println!(
        "alpha: {:.2} central, {:.2} conservative, {:.2} aggressive",
        params.alpha.central, params.alpha.low, params.alpha.high
    );

    println!("\n{:>10} {:>10} {:>14} {:>12}", "BESS GW", "central", "conservative", "aggressive");
    for row in &artifact.projection {
        println!(
            "{:>10.1} {:>10.1} {:>14.1} {:>12.1}",
            row.capacity_gw, row.central, row.conservative, row.aggressive
        );
    }
}

pub fn print_pass_through(params: &PassThroughParams) {
    match &params.status {
        PassThroughStatus::Fitted => {
            println!("Overlapping days: {}", params.n_obs);
            println!(
                "Spread: tariff = {:.2} + {:.3} x wholesale (R²={:.3})",
                params.spread_intercept,
                params.spread_multiplier,
                params.spread_r_squared.unwrap_or(f64::NAN)
            );
            println!(
                "Price:  tariff = {:.2} + {:.3} x wholesale (R²={:.3})",
                params.price_adder,
                params.price_multiplier,
                params.price_r_squared.unwrap_or(f64::NAN)
            );
        }
        PassThroughStatus::Degraded { reason } => print_degraded(reason),
    }
}

fn print_degraded(reason: &str) {
    println!("\n{}", "!".repeat(60));
    println!("⚠️  UNVALIDATED PASS-THROUGH: identity mapping in use");
    println!("    {}", reason);
    println!("    Tariff spreads below equal modelled wholesale spreads.");
    println!("{}", "!".repeat(60));
}

pub fn print_forecast(
    forecast: &Forecast,
    summary: &[AnnualSummary],
    params: &CompressionParams,
    pass_through: &PassThroughParams,
) {
    println!(
        "Spread model: {:.0} + ({:.0} - {:.0}) x ({:.1} / bess_gw)^{:.2}",
        params.floor, params.spread_ref, params.floor, params.bess_ref, params.alpha.central
    );
    println!(
        "Tariff model: {:.2} + {:.3} x wholesale spread",
        pass_through.spread_intercept, pass_through.spread_multiplier
    );
    if let PassThroughStatus::Degraded { reason } = &forecast.pass_through_status {
        print_degraded(reason);
    }
    if forecast.wind_fallback {
        println!("Wind context: no installed renewables series, flat fallback generation used");
    }

    println!("\n{:<6} {:>9} {:>16} {:>16}", "Year", "BESS GW", "Wholesale £/MWh", "Agile p/kWh");
    for year in summary {
        println!(
            "{:<6} {:>9.1} {:>16.1} {:>16.2}",
            year.year, year.bess_gw, year.wholesale_spread, year.agile_spread_p_kwh
        );
    }

    if let (Some(first), Some(last)) = (forecast.rows.first(), forecast.rows.last()) {
        println!(
            "\n{}: {:.1} GW, {:.1} £/MWh -> {}: {:.1} GW, {:.1} £/MWh",
            first.date.format("%Y-%m"),
            first.bess_gw,
            first.wholesale_spread,
            last.date.format("%Y-%m"),
            last.bess_gw,
            last.wholesale_spread
        );
        println!(
            "Alpha band at {}: {:.1} (aggressive) to {:.1} (conservative) £/MWh",
            last.date.format("%Y-%m"),
            last.elasticity.aggressive,
            last.elasticity.conservative
        );
    }
}
