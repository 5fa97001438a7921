use spread_model::capacity::{base_trajectory, forecast_window, historic_trajectory, scenario_trajectories};
use spread_model::models::AlphaRange;
use spread_model::{
    annual_summary, compose_forecast, CalibrationConfig, CompressionParams, ForecastInputs, PassThroughParams,
    ScenarioFan, WindProjection,
};
use std::collections::BTreeMap;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = CalibrationConfig::default();

    // Anchored at 6.5 GW / 120 £/MWh with a 13.5 £/MWh floor
    let params = CompressionParams {
        floor: config.floor.floor(),
        spread_ref: 120.0,
        bess_ref: 6.5,
        alpha: AlphaRange { central: 0.50, low: 0.46, high: 0.65 },
        month_coefs: BTreeMap::from([(6, -18.0), (7, -20.0), (12, 8.0)]),
        weekend_coef: -6.0,
    };

    println!("Spread compression by BESS capacity");
    println!("===================================");
    println!("{:>8} {:>10} {:>10} {:>10}", "GW", "central", "low", "high");
    for capacity in [6.5, 10.0, 13.0, 16.0, 20.0, 25.0] {
        let row = params
            .alpha
            .iter()
            .map(|alpha| params.spread_at(capacity, alpha))
            .collect::<Result<Vec<f64>, _>>()?;
        println!("{:>8.1} {:>10.1} {:>10.1} {:>10.1}", capacity, row[0], row[1], row[2]);
    }

    let historic = historic_trajectory(&config.capacity)?;
    let scenarios = scenario_trajectories(&config.capacity)?;
    let base_path = scenarios
        .iter()
        .find(|(s, _)| *s == config.capacity.base_scenario)
        .map(|(_, t)| t.clone())
        .unwrap_or_default();
    let base = base_trajectory(&historic, &base_path)?;
    let window = forecast_window(&base, &base_path, config.forecast.start, config.forecast.end);
    let fan = ScenarioFan::new(scenarios)?;
    let wind = WindProjection::new(None, &config.forecast.wind);
    let pass_through = PassThroughParams::identity(0, "example without wholesale data");

    let forecast = compose_forecast(&ForecastInputs {
        base: &window,
        base_scenario: config.capacity.base_scenario,
        fan: &fan,
        params: &params,
        pass_through: &pass_through,
        wind: &wind,
        tariff_unit_divisor: config.forecast.tariff_unit_divisor,
    })?;

    println!();
    println!("{:<6} {:>9} {:>12}", "Year", "BESS GW", "Spread");
    for year in annual_summary(&forecast.rows) {
        println!("{:<6} {:>9.1} {:>12.1}", year.year, year.bess_gw, year.wholesale_spread);
    }
    Ok(())
}
