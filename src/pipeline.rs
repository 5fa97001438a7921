use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use spread_model::capacity::{base_trajectory, forecast_window, historic_trajectory, scenario_trajectories};
use spread_model::data_loader::files;
use spread_model::power_law::{ProjectionRow, ReferenceWindow};
use spread_model::reference_model::ReferenceDiagnostics;
use spread_model::{
    aggregate_monthly, annual_summary, calibrate, compose_forecast, fit_pass_through, fit_reference_model,
    merge_daily_panel, CalibrationConfig, CapacityTrajectory, CompressionParams, DataLoader, Forecast,
    ForecastError, ForecastInputs, MonthlyObservation, PassThroughParams, Scenario, ScenarioFan, SpreadSource,
    WindProjection,
};

use crate::charts;
use crate::report;

pub const SPREAD_PARAMS_FILE: &str = "spread_model_params.json";
pub const TARIFF_PARAMS_FILE: &str = "tariff_model_params.json";
pub const FORECAST_FILE: &str = "five_year_forecast.csv";

/// Everything the forecast stage needs from calibration, plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    pub config_version: String,
    pub spread_source: SpreadSource,
    pub params: CompressionParams,
    pub reference_window: ReferenceWindow,
    pub projection: Vec<ProjectionRow>,
    pub diagnostics: ReferenceDiagnostics,
    pub monthly: Vec<MonthlyObservation>,
}

#[derive(Debug, Serialize)]
struct CapacityCsvRow {
    date: NaiveDate,
    bess_capacity_gw: f64,
    source: String,
}

#[derive(Debug, Serialize)]
struct ScenarioCsvRow {
    date: NaiveDate,
    scenario: &'static str,
    bess_capacity_gw: f64,
}

#[derive(Debug, Serialize)]
struct ForecastCsvRow {
    date: NaiveDate,
    bess_gw: f64,
    wind_gen_gw: f64,
    wholesale_spread_mwh: f64,
    agile_spread_mwh: f64,
    agile_spread_p_kwh: f64,
    spread_leading_the_way: Option<f64>,
    spread_consumer_transformation: Option<f64>,
    spread_falling_short: Option<f64>,
    spread_alpha_conservative: f64,
    spread_alpha_aggressive: f64,
    pass_through: &'static str,
}

pub struct Pipeline {
    data_dir: PathBuf,
    config: CalibrationConfig,
    charts: bool,
}

impl Pipeline {
    pub fn new(data_dir: impl Into<PathBuf>, config: CalibrationConfig, charts: bool) -> Self {
        Self {
            data_dir: data_dir.into(),
            config,
            charts,
        }
    }

    fn loader(&self) -> DataLoader {
        DataLoader::new(&self.data_dir)
    }

    fn plots_dir(&self) -> Result<PathBuf> {
        let dir = self.data_dir.join("plots");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Builds the monthly historic and scenario capacity tables.
    pub fn build_capacity(&self) -> Result<(CapacityTrajectory, Vec<(Scenario, CapacityTrajectory)>)> {
        report::banner("BESS CAPACITY TRAJECTORIES");
        let capacity = &self.config.capacity;
        let historic = historic_trajectory(capacity)?;
        let scenarios = scenario_trajectories(capacity)?;
        let base_path = scenarios
            .iter()
            .find(|(s, _)| *s == capacity.base_scenario)
            .map(|(_, t)| t)
            .ok_or_else(|| ForecastError::MissingInput(format!("{} projections", capacity.base_scenario.label())))?;
        let base = base_trajectory(&historic, base_path)?;
        // validates the fan ordering before anything is written
        ScenarioFan::new(scenarios.clone())?;

        fs::create_dir_all(&self.data_dir)?;
        let capacity_path = self.data_dir.join(files::CAPACITY);
        write_csv(
            &capacity_path,
            base.points().iter().map(|p| CapacityCsvRow {
                date: p.month.first_day(),
                bess_capacity_gw: p.capacity_gw,
                source: p.provenance.tag(),
            }),
        )?;
        let scenario_path = self.data_dir.join(files::SCENARIOS);
        write_csv(
            &scenario_path,
            scenarios.iter().flat_map(|(scenario, path)| {
                path.points().iter().map(move |p| ScenarioCsvRow {
                    date: p.month.first_day(),
                    scenario: scenario.key(),
                    bess_capacity_gw: p.capacity_gw,
                })
            }),
        )?;

        report::print_capacity(&base, &scenarios, &self.config);
        println!("Saved: {}", capacity_path.display());
        println!("Saved: {}", scenario_path.display());

        if self.charts {
            charts::capacity_fan(&self.plots_dir()?.join("01_bess_capacity.png"), &base, &scenarios)?;
        }
        Ok((base, scenarios))
    }

    /// Fits the reference regression and anchors the power law.
    pub fn calibrate(&self) -> Result<CalibrationArtifact> {
        report::banner("SPREAD MODEL CALIBRATION");
        let loader = self.loader();
        let spread = loader.load_spread_series()?;
        let capacity = loader.load_capacity()?;
        let generation = if loader.has(files::GENERATION) {
            Some(loader.load_generation()?)
        } else {
            warn!("{} not found; regression runs without generation", files::GENERATION);
            None
        };

        let panel = merge_daily_panel(&spread, &capacity, generation.as_deref());
        if panel.is_empty() {
            return Err(ForecastError::MissingInput(
                "no spread days overlap the historic capacity months".to_string(),
            )
            .into());
        }
        let reference = fit_reference_model(&panel, &self.config.regression)?;
        let monthly = aggregate_monthly(&panel);
        let calibration = calibrate(&monthly, &reference, &self.config)?;

        let artifact = CalibrationArtifact {
            config_version: self.config.version.clone(),
            spread_source: spread.source,
            params: calibration.params,
            reference_window: calibration.window,
            projection: calibration.projection,
            diagnostics: reference.diagnostics(),
            monthly,
        };
        let path = self.data_dir.join(SPREAD_PARAMS_FILE);
        write_json(&path, &artifact)?;

        report::print_calibration(&artifact, &reference);
        println!("Saved: {}", path.display());

        if self.charts {
            let dir = self.plots_dir()?;
            charts::spread_model(&dir.join("02_spread_model.png"), &artifact.monthly, &artifact.params)?;
        }
        Ok(artifact)
    }

    /// Maps wholesale spread to tariff spread.
    pub fn pass_through(&self) -> Result<PassThroughParams> {
        report::banner("TARIFF PASS-THROUGH");
        let loader = self.loader();
        let tariff = loader.load_tariff_spread()?;
        let wholesale = if loader.has(files::WHOLESALE) {
            Some(loader.load_wholesale()?)
        } else {
            None
        };

        let params = fit_pass_through(&tariff, wholesale.as_ref())?;
        let path = self.data_dir.join(TARIFF_PARAMS_FILE);
        write_json(&path, &params)?;

        report::print_pass_through(&params);
        println!("Saved: {}", path.display());
        Ok(params)
    }

    /// Composes the monthly forecast from the persisted artifacts.
    pub fn forecast(&self) -> Result<Forecast> {
        report::banner("COMBINED FIVE-YEAR FORECAST");
        let calibration: CalibrationArtifact = read_json(&self.data_dir.join(SPREAD_PARAMS_FILE))?;
        let pass_through: PassThroughParams = read_json(&self.data_dir.join(TARIFF_PARAMS_FILE))?;
        if calibration.config_version != self.config.version {
            warn!(
                "Calibration was produced with config {}, forecasting with {}",
                calibration.config_version, self.config.version
            );
        }

        let loader = self.loader();
        let base = loader.load_capacity()?;
        let scenarios = if loader.has(files::SCENARIOS) {
            loader.load_scenarios()?
        } else {
            warn!("{} not found; forecasting without a scenario fan", files::SCENARIOS);
            Vec::new()
        };
        let renewables = if loader.has(files::RENEWABLES) {
            Some(loader.load_renewables()?)
        } else {
            None
        };

        let forecast_config = &self.config.forecast;
        let base_scenario = self.config.capacity.base_scenario;
        let base_path = scenarios
            .iter()
            .find(|(s, _)| *s == base_scenario)
            .map(|(_, t)| t.clone())
            .unwrap_or_default();
        let window = forecast_window(&base, &base_path, forecast_config.start, forecast_config.end);
        let fan = ScenarioFan::new(scenarios)?;
        let wind = WindProjection::new(renewables.as_deref(), &forecast_config.wind);

        let forecast = compose_forecast(&ForecastInputs {
            base: &window,
            base_scenario,
            fan: &fan,
            params: &calibration.params,
            pass_through: &pass_through,
            wind: &wind,
            tariff_unit_divisor: forecast_config.tariff_unit_divisor,
        })?;

        let status = if forecast.pass_through_status.is_degraded() {
            "unvalidated_identity"
        } else {
            "fitted"
        };
        let path = self.data_dir.join(FORECAST_FILE);
        write_csv(
            &path,
            forecast.rows.iter().map(|row| ForecastCsvRow {
                date: row.date,
                bess_gw: row.bess_gw,
                wind_gen_gw: row.wind_gen_gw,
                wholesale_spread_mwh: row.wholesale_spread,
                agile_spread_mwh: row.agile_spread,
                agile_spread_p_kwh: row.agile_spread_p_kwh,
                spread_leading_the_way: row.scenario_spreads.leading_the_way,
                spread_consumer_transformation: row.scenario_spreads.consumer_transformation,
                spread_falling_short: row.scenario_spreads.falling_short,
                spread_alpha_conservative: row.elasticity.conservative,
                spread_alpha_aggressive: row.elasticity.aggressive,
                pass_through: status,
            }),
        )?;

        let summary = annual_summary(&forecast.rows);
        report::print_forecast(&forecast, &summary, &calibration.params, &pass_through);
        println!("Saved: {}", path.display());

        if self.charts {
            let dir = self.plots_dir()?;
            charts::forecast(&dir.join("05_combined_forecast.png"), &forecast, &calibration.monthly)?;
            charts::alpha_sensitivity(&dir.join("05_sensitivity.png"), &window, &calibration.params)?;
        }
        Ok(forecast)
    }

    pub fn run_all(&self) -> Result<Forecast> {
        self.build_capacity()?;
        self.calibrate()?;
        self.pass_through()?;
        self.forecast()
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Reads a persisted artifact; a missing file is a `MissingInput` error.
fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(ForecastError::MissingInput(format!(
            "{} (run the earlier stages first)",
            path.display()
        ))
        .into());
    }
    let file = fs::File::open(path)?;
    let value = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn write_csv<R: Serialize>(path: &Path, rows: impl IntoIterator<Item = R>) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut count = 0usize;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;
    info!("Wrote {} rows to {}", count, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};
    use std::fmt::Write as _;

    /// Daily tariff and wholesale spreads for 2024-01 .. 2025-06 that fall as
    /// capacity grows.
    fn write_daily_inputs(dir: &Path, with_wholesale: bool) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut tariff = String::from("date,spread_max_min,price_mean\n");
        let mut wholesale = String::from("date,wholesale_spread,wholesale_mean\n");
        let mut generation = String::from("date,wind_gen_gw,solar_gen_gw\n");
        for i in 0..547 {
            let date = start + Duration::days(i);
            let season = if matches!(date.month(), 6..=8) { -10.0 } else { 5.0 };
            let weekend = if date.weekday().number_from_monday() >= 6 { -8.0 } else { 0.0 };
            let noise = ((i * 37) % 11) as f64 - 5.0;
            let ws = 150.0 - 0.1 * i as f64 + season + weekend + noise;
            let wm = 75.0 + ((i * 13) % 7) as f64;
            let wind = 8.0 + ((i * 5) % 9) as f64;
            writeln!(wholesale, "{},{:.3},{:.3}", date, ws, wm).unwrap();
            writeln!(tariff, "{},{:.3},{:.3}", date, 12.0 + 1.8 * ws, 30.0 + 1.3 * wm).unwrap();
            writeln!(generation, "{},{:.2},", date, wind).unwrap();
        }
        fs::write(dir.join(files::TARIFF_SPREAD), tariff).unwrap();
        fs::write(dir.join(files::GENERATION), generation).unwrap();
        if with_wholesale {
            fs::write(dir.join(files::WHOLESALE), wholesale).unwrap();
        }
    }

    #[test]
    fn test_full_run_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        write_daily_inputs(dir.path(), true);
        let pipeline = Pipeline::new(dir.path(), CalibrationConfig::default(), false);

        let forecast = pipeline.run_all().unwrap();
        assert_eq!(forecast.rows.len(), 60);
        assert!(!forecast.pass_through_status.is_degraded());
        assert!(forecast.wind_fallback);

        let calibration: CalibrationArtifact = read_json(&dir.path().join(SPREAD_PARAMS_FILE)).unwrap();
        assert_eq!(calibration.spread_source, SpreadSource::DirectWholesale);
        assert!((calibration.params.floor - 13.5).abs() < 1e-12);
        assert_eq!(calibration.params.alpha.central, 0.5);
        assert_eq!(calibration.projection.len(), 7);
        assert!(calibration.params.month_coefs.contains_key(&7));

        let tariff: PassThroughParams = read_json(&dir.path().join(TARIFF_PARAMS_FILE)).unwrap();
        assert!((tariff.spread_multiplier - 1.8).abs() < 1e-3);

        let csv = fs::read_to_string(dir.path().join(FORECAST_FILE)).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("date,bess_gw,wind_gen_gw,wholesale_spread_mwh"));
        assert!(header.ends_with("pass_through"));
        let first = lines.next().unwrap();
        assert!(first.starts_with("2026-01-01,"));
        assert!(first.ends_with(",fitted"));
        assert_eq!(lines.count(), 59);
    }

    #[test]
    fn test_proxy_source_and_identity_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        write_daily_inputs(dir.path(), false);
        let pipeline = Pipeline::new(dir.path(), CalibrationConfig::default(), false);

        let forecast = pipeline.run_all().unwrap();
        assert!(forecast.pass_through_status.is_degraded());
        for row in &forecast.rows {
            assert_eq!(row.agile_spread, row.wholesale_spread);
        }
        let calibration: CalibrationArtifact = read_json(&dir.path().join(SPREAD_PARAMS_FILE)).unwrap();
        assert_eq!(calibration.spread_source, SpreadSource::TariffProxy);

        let csv = fs::read_to_string(dir.path().join(FORECAST_FILE)).unwrap();
        assert!(csv.lines().nth(1).unwrap().ends_with(",unvalidated_identity"));
    }

    #[test]
    fn test_forecast_refuses_without_calibration() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path(), CalibrationConfig::default(), false);
        pipeline.build_capacity().unwrap();

        let err = pipeline.forecast().unwrap_err();
        let missing = err.downcast_ref::<ForecastError>();
        assert!(matches!(missing, Some(ForecastError::MissingInput(_))));
        assert!(!dir.path().join(FORECAST_FILE).exists());
    }

    #[test]
    fn test_capacity_tables_round_trip_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(dir.path(), CalibrationConfig::default(), false);
        let (base, scenarios) = pipeline.build_capacity().unwrap();

        let loader = DataLoader::new(dir.path());
        let loaded = loader.load_capacity().unwrap();
        assert_eq!(loaded.len(), base.len());
        assert_eq!(loaded.historic_lookup().len(), 97);
        let loaded_scenarios = loader.load_scenarios().unwrap();
        assert_eq!(loaded_scenarios.len(), scenarios.len());
    }
}
