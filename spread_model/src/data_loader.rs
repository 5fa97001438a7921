use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ForecastError, Result};
use crate::models::{
    CapacityPoint, CapacityTrajectory, DailyGeneration, DailySpread, Provenance, RenewableCapacity,
    Scenario, SpreadSeries, SpreadSource, YearMonth,
};

/// Declared shape of one tabular input: its key column plus the value
/// columns that must be present.
#[derive(Debug, Clone, Copy)]
pub struct SeriesSchema {
    pub name: &'static str,
    pub key: &'static str,
    pub required: &'static [&'static str],
}

/// Daily wholesale market prices
pub const WHOLESALE_SCHEMA: SeriesSchema = SeriesSchema {
    name: "daily wholesale prices",
    key: "date",
    required: &["wholesale_spread", "wholesale_mean"],
};

/// Daily spread derived from half-hourly tariff prices
pub const TARIFF_SPREAD_SCHEMA: SeriesSchema = SeriesSchema {
    name: "daily tariff-derived spread",
    key: "date",
    required: &["spread_max_min", "price_mean"],
};

/// Monthly BESS capacity tagged `historic` or `fes_<scenario>`
pub const CAPACITY_SCHEMA: SeriesSchema = SeriesSchema {
    name: "monthly BESS capacity",
    key: "date",
    required: &["bess_capacity_gw", "source"],
};

/// Monthly capacity per FES scenario
pub const SCENARIO_SCHEMA: SeriesSchema = SeriesSchema {
    name: "FES capacity scenarios",
    key: "date",
    required: &["scenario", "bess_capacity_gw"],
};

/// Daily average wind (and optionally solar) generation
pub const GENERATION_SCHEMA: SeriesSchema = SeriesSchema {
    name: "daily wind/solar generation",
    key: "date",
    required: &["wind_gen_gw"],
};

/// Monthly installed renewable capacity
pub const RENEWABLES_SCHEMA: SeriesSchema = SeriesSchema {
    name: "monthly installed renewables",
    key: "date",
    required: &["onshore_wind_gw", "offshore_wind_gw"],
};

/// File names of the processed inputs inside the data directory.
pub mod files {
    pub const WHOLESALE: &str = "daily_elexon_wholesale.csv";
    pub const TARIFF_SPREAD: &str = "daily_wholesale_spread.csv";
    pub const CAPACITY: &str = "bess_capacity_monthly.csv";
    pub const SCENARIOS: &str = "bess_fes_scenarios.csv";
    pub const GENERATION: &str = "daily_wind_solar_generation.csv";
    pub const RENEWABLES: &str = "renewable_capacity_monthly.csv";
}

/// Reads the processed CSV inputs into typed series.
pub struct DataLoader {
    data_dir: PathBuf,
}

impl DataLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Whether an optional input is present
    pub fn has(&self, file: &str) -> bool {
        self.path(file).exists()
    }

    /// Direct wholesale prices when present, else the tariff-derived proxy.
    pub fn load_spread_series(&self) -> Result<SpreadSeries> {
        if self.has(files::WHOLESALE) {
            info!("Using wholesale spread (direct market data)");
            self.load_wholesale()
        } else if self.has(files::TARIFF_SPREAD) {
            warn!(
                "{} not found; using tariff-derived spread as a proxy",
                files::WHOLESALE
            );
            self.load_tariff_spread()
        } else {
            Err(ForecastError::MissingInput(format!(
                "neither {} nor {} in {}",
                files::WHOLESALE,
                files::TARIFF_SPREAD,
                self.data_dir.display()
            )))
        }
    }

    /// Load the direct wholesale spread series
    pub fn load_wholesale(&self) -> Result<SpreadSeries> {
        let path = self.require(files::WHOLESALE)?;
        let days = load_daily_spread(&path, &WHOLESALE_SCHEMA, "wholesale_spread", "wholesale_mean")?;
        Ok(SpreadSeries {
            source: SpreadSource::DirectWholesale,
            days,
        })
    }

    /// Load the tariff-derived proxy spread series
    pub fn load_tariff_spread(&self) -> Result<SpreadSeries> {
        let path = self.require(files::TARIFF_SPREAD)?;
        let days = load_daily_spread(&path, &TARIFF_SPREAD_SCHEMA, "spread_max_min", "price_mean")?;
        Ok(SpreadSeries {
            source: SpreadSource::TariffProxy,
            days,
        })
    }

    /// Load the monthly capacity table, historic and projected rows together
    pub fn load_capacity(&self) -> Result<CapacityTrajectory> {
        let path = self.require(files::CAPACITY)?;
        let df = read_frame(&path, &CAPACITY_SCHEMA)?;
        let months = month_column(&df, &CAPACITY_SCHEMA)?;
        let capacities = f64_column(&df, "bess_capacity_gw")?;
        let sources = str_column(&df, "source")?;

        let mut points = Vec::with_capacity(months.len());
        let mut dropped = 0usize;
        for ((month, capacity), source) in months.into_iter().zip(capacities).zip(sources) {
            let (Some(capacity_gw), Some(source)) = (capacity, source) else {
                dropped += 1;
                continue;
            };
            points.push(CapacityPoint {
                month,
                capacity_gw,
                provenance: source.parse()?,
            });
        }
        log_dropped(&CAPACITY_SCHEMA, dropped, "bess_capacity_gw or source");
        CapacityTrajectory::new(points)
    }

    /// Per-scenario monthly trajectories, keyed on (scenario, month).
    pub fn load_scenarios(&self) -> Result<Vec<(Scenario, CapacityTrajectory)>> {
        let path = self.require(files::SCENARIOS)?;
        let df = read_frame(&path, &SCENARIO_SCHEMA)?;
        let months = month_column(&df, &SCENARIO_SCHEMA)?;
        let scenarios = str_column(&df, "scenario")?;
        let capacities = f64_column(&df, "bess_capacity_gw")?;

        let mut by_scenario: Vec<(Scenario, Vec<CapacityPoint>)> = Vec::new();
        let mut dropped = 0usize;
        for ((month, scenario), capacity) in months.into_iter().zip(scenarios).zip(capacities) {
            let (Some(scenario), Some(capacity_gw)) = (scenario, capacity) else {
                dropped += 1;
                continue;
            };
            let scenario: Scenario = scenario.parse()?;
            let point = CapacityPoint {
                month,
                capacity_gw,
                provenance: Provenance::Projected(scenario),
            };
            match by_scenario.iter_mut().find(|(s, _)| *s == scenario) {
                Some((_, points)) => points.push(point),
                None => by_scenario.push((scenario, vec![point])),
            }
        }

        log_dropped(&SCENARIO_SCHEMA, dropped, "scenario or bess_capacity_gw");
        by_scenario.sort_by_key(|(scenario, _)| *scenario);
        by_scenario
            .into_iter()
            .map(|(scenario, points)| Ok((scenario, CapacityTrajectory::new(points)?)))
            .collect()
    }

    /// Load daily generation, keeping missing wind values as unknown
    pub fn load_generation(&self) -> Result<Vec<DailyGeneration>> {
        let path = self.require(files::GENERATION)?;
        let df = read_frame(&path, &GENERATION_SCHEMA)?;
        let dates = date_column(&df, &GENERATION_SCHEMA)?;
        let wind = f64_column(&df, "wind_gen_gw")?;
        let solar = optional_f64_column(&df, "solar_gen_gw", df.height())?;

        Ok(dates
            .into_iter()
            .zip(wind)
            .zip(solar)
            .map(|((date, wind_gen_gw), solar_gen_gw)| DailyGeneration {
                date,
                wind_gen_gw,
                solar_gen_gw,
            })
            .collect())
    }

    /// Load monthly installed renewables
    pub fn load_renewables(&self) -> Result<Vec<RenewableCapacity>> {
        let path = self.require(files::RENEWABLES)?;
        let df = read_frame(&path, &RENEWABLES_SCHEMA)?;
        let months = month_column(&df, &RENEWABLES_SCHEMA)?;
        let onshore = f64_column(&df, "onshore_wind_gw")?;
        let offshore = f64_column(&df, "offshore_wind_gw")?;
        let solar = optional_f64_column(&df, "solar_gw", df.height())?;

        let mut rows = Vec::with_capacity(months.len());
        let mut dropped = 0usize;
        for (((month, onshore), offshore), solar_gw) in months.into_iter().zip(onshore).zip(offshore).zip(solar) {
            let (Some(onshore_wind_gw), Some(offshore_wind_gw)) = (onshore, offshore) else {
                dropped += 1;
                continue;
            };
            rows.push(RenewableCapacity {
                month,
                onshore_wind_gw,
                offshore_wind_gw,
                solar_gw,
            });
        }
        log_dropped(&RENEWABLES_SCHEMA, dropped, "onshore_wind_gw or offshore_wind_gw");
        rows.sort_by_key(|r| r.month);
        ensure_unique(rows.iter().map(|r| r.month), &RENEWABLES_SCHEMA)?;
        Ok(rows)
    }

    fn require(&self, file: &str) -> Result<PathBuf> {
        let path = self.path(file);
        if path.exists() {
            Ok(path)
        } else {
            Err(ForecastError::MissingInput(path.display().to_string()))
        }
    }
}

fn load_daily_spread(
    path: &Path,
    schema: &SeriesSchema,
    spread_col: &str,
    price_col: &str,
) -> Result<Vec<DailySpread>> {
    let df = read_frame(path, schema)?;
    let dates = date_column(&df, schema)?;
    let spreads = f64_column(&df, spread_col)?;
    let prices = f64_column(&df, price_col)?;

    let mut days = Vec::with_capacity(dates.len());
    let mut dropped = 0usize;
    for ((date, spread), mean_price) in dates.into_iter().zip(spreads).zip(prices) {
        match spread {
            Some(spread) if spread.is_finite() => days.push(DailySpread {
                date,
                spread,
                mean_price,
            }),
            _ => dropped += 1,
        }
    }
    log_dropped(schema, dropped, spread_col);
    days.sort_by_key(|d| d.date);
    info!("Loaded {}: {} days", schema.name, days.len());
    Ok(days)
}

/// Warns when rows were skipped for a null required value.
fn log_dropped(schema: &SeriesSchema, dropped: usize, columns: &str) {
    if dropped > 0 {
        warn!("{}: dropped {} rows with no {}", schema.name, dropped, columns);
    }
}

/// Scans a CSV lazily, collects it and checks the schema's columns are present.
pub fn read_frame(path: &Path, schema: &SeriesSchema) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()?
        .collect()?;

    for column in std::iter::once(&schema.key).chain(schema.required.iter()) {
        if df.column(column).is_err() {
            return Err(ForecastError::Schema(format!(
                "{} ({}) has no '{}' column",
                schema.name,
                path.display(),
                column
            )));
        }
    }
    Ok(df)
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn optional_f64_column(df: &DataFrame, name: &str, height: usize) -> Result<Vec<Option<f64>>> {
    if df.column(name).is_ok() {
        f64_column(df, name)
    } else {
        Ok(vec![None; height])
    }
}

/// Parses `YYYY-MM-DD`, tolerating a trailing time component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()
}

fn raw_keys(df: &DataFrame, schema: &SeriesSchema) -> Result<Vec<String>> {
    str_column(df, schema.key)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| {
                ForecastError::Schema(format!("{}: empty {} in row {}", schema.name, schema.key, row + 1))
            })
        })
        .collect()
}

/// Key column as daily dates; rejects unparseable and duplicate dates.
fn date_column(df: &DataFrame, schema: &SeriesSchema) -> Result<Vec<NaiveDate>> {
    let dates = raw_keys(df, schema)?
        .iter()
        .map(|raw| {
            parse_date(raw).ok_or_else(|| {
                ForecastError::Schema(format!("{}: cannot parse date '{}'", schema.name, raw))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ensure_unique(dates.iter().copied(), schema)?;
    Ok(dates)
}

/// Key column as months. Uniqueness is checked per series by the caller's
/// container, since the scenario table repeats months across scenarios.
fn month_column(df: &DataFrame, schema: &SeriesSchema) -> Result<Vec<YearMonth>> {
    raw_keys(df, schema)?.iter().map(|raw| raw.parse()).collect()
}

fn ensure_unique<K>(keys: impl Iterator<Item = K>, schema: &SeriesSchema) -> Result<()>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
{
    let mut seen = HashSet::new();
    for key in keys {
        if seen.contains(&key) {
            return Err(ForecastError::Schema(format!(
                "{}: duplicate {} {}",
                schema.name, schema.key, key
            )));
        }
        seen.insert(key);
    }
    Ok(())
}
