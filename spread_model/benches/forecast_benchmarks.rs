use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spread_model::capacity::{base_trajectory, forecast_window, historic_trajectory, scenario_trajectories};
use spread_model::models::AlphaRange;
use spread_model::{
    compose_forecast, CalibrationConfig, CompressionParams, ForecastInputs, PassThroughParams, Scenario,
    ScenarioFan, WindProjection,
};
use std::collections::BTreeMap;

fn params() -> CompressionParams {
    CompressionParams {
        floor: 13.5,
        spread_ref: 120.0,
        bess_ref: 6.5,
        alpha: AlphaRange { central: 0.50, low: 0.46, high: 0.65 },
        month_coefs: (2..=12).map(|m| (m, -2.0 * m as f64)).collect::<BTreeMap<_, _>>(),
        weekend_coef: -6.0,
    }
}

fn benchmark_power_law(c: &mut Criterion) {
    let params = params();
    let capacities: Vec<f64> = (1..=1000).map(|i| i as f64 * 0.05).collect();

    c.bench_function("power_law_1000_capacities", |b| {
        b.iter(|| {
            let total: f64 = capacities
                .iter()
                .map(|c| params.central_spread(black_box(*c)).unwrap_or(0.0))
                .sum();
            black_box(total)
        });
    });
}

fn benchmark_compose_forecast(c: &mut Criterion) {
    let config = CalibrationConfig::default();
    let historic = historic_trajectory(&config.capacity).unwrap();
    let scenarios = scenario_trajectories(&config.capacity).unwrap();
    let st = scenarios
        .iter()
        .find(|(s, _)| *s == Scenario::SystemTransformation)
        .map(|(_, t)| t.clone())
        .unwrap();
    let base = base_trajectory(&historic, &st).unwrap();
    let base = forecast_window(&base, &st, config.forecast.start, config.forecast.end);
    let fan = ScenarioFan::new(scenarios).unwrap();
    let wind = WindProjection::new(None, &config.forecast.wind);
    let params = params();
    let pass_through = PassThroughParams::identity(0, "benchmark");

    c.bench_function("compose_five_year_forecast", |b| {
        let inputs = ForecastInputs {
            base: &base,
            base_scenario: Scenario::SystemTransformation,
            fan: &fan,
            params: &params,
            pass_through: &pass_through,
            wind: &wind,
            tariff_unit_divisor: config.forecast.tariff_unit_divisor,
        };
        b.iter(|| black_box(compose_forecast(&inputs).unwrap()));
    });
}

criterion_group!(benches, benchmark_power_law, benchmark_compose_forecast);
criterion_main!(benches);
