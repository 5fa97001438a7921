use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ForecastError, Result};
use crate::models::{AlphaRange, Scenario, YearMonth};

/// Version stamped on every calibration artifact
pub const CONFIG_VERSION: &str = "gb-2025.1";

/// Versioned external constants for calibration and forecasting.
///
/// Every externally sourced number the model depends on lives here with its
/// provenance, so a run can be reproduced from its inputs and this config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub version: String,
    pub floor: FloorConfig,
    pub alpha: AlphaConfig,
    pub reference_window: ReferenceWindowConfig,
    /// Capacities (GW) at which the calibration projection table is evaluated.
    pub projection_capacities_gw: Vec<f64>,
    pub regression: RegressionConfig,
    pub capacity: CapacityConfig,
    pub forecast: ForecastConfig,
}

/// Floor = average wholesale price × round-trip efficiency loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorConfig {
    pub average_wholesale_price: f64,
    pub round_trip_loss_fraction: f64,
    pub source: String,
}

impl FloorConfig {
    /// Asymptotic spread floor: loss fraction times the average wholesale level
    pub fn floor(&self) -> f64 {
        self.average_wholesale_price * self.round_trip_loss_fraction
    }
}

/// One literature elasticity with its source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaEstimate {
    pub value: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaConfig {
    pub central: AlphaEstimate,
    pub conservative: AlphaEstimate,
    pub aggressive: AlphaEstimate,
}

impl AlphaConfig {
    /// The three alphas as carried by the model
    pub fn range(&self) -> AlphaRange {
        AlphaRange {
            central: self.central.value,
            low: self.conservative.value,
            high: self.aggressive.value,
        }
    }
}

/// Selects the months that anchor `spread_ref` and `bess_ref`.
///
/// Months with capacity at or above `capacity_threshold_gw` are used when at
/// least `min_months` qualify; otherwise the last `fallback_months` months.
/// The defaults were tuned on GB 2025 data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceWindowConfig {
    pub capacity_threshold_gw: f64,
    pub min_months: usize,
    pub fallback_months: usize,
}

/// Reference regression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// Minimum share of days with generation data for it to enter the regression.
    pub generation_coverage_threshold: f64,
}

/// One year of the FES battery storage table, GW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FesYear {
    pub year: i32,
    pub leading_the_way: f64,
    pub consumer_transformation: f64,
    pub system_transformation: f64,
    pub falling_short: f64,
}

impl FesYear {
    /// Capacity (GW) for a scenario in this FES year
    pub fn value(&self, scenario: Scenario) -> f64 {
        match scenario {
            Scenario::LeadingTheWay => self.leading_the_way,
            Scenario::ConsumerTransformation => self.consumer_transformation,
            Scenario::SystemTransformation => self.system_transformation,
            Scenario::FallingShort => self.falling_short,
        }
    }
}

/// Historic capacity points, FES tables and the base-case scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Known GB BESS capacity (utility-scale + behind-the-meter), GW.
    pub historic_points: BTreeMap<YearMonth, f64>,
    pub historic_source: String,
    pub fes_projections: Vec<FesYear>,
    pub fes_source: String,
    pub base_scenario: Scenario,
}

/// Wind projection constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindConfig {
    pub annual_capacity_growth_gw: f64,
    /// Capacity factor by calendar month, January first.
    pub monthly_capacity_factors: Vec<f64>,
    /// Average generation assumed when no installed-capacity series exists.
    pub fallback_generation_gw: f64,
}

/// Forecast horizon and display units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub start: YearMonth,
    pub end: YearMonth,
    /// £/MWh -> p/kWh.
    pub tariff_unit_divisor: f64,
    pub wind: WindConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let historic_points = [
            (2017, 12, 0.3),
            (2018, 6, 0.5),
            (2018, 12, 0.7),
            (2019, 6, 0.8),
            (2019, 12, 1.0),
            (2020, 6, 1.1),
            (2020, 12, 1.3),
            (2021, 6, 1.5),
            (2021, 12, 1.8),
            (2022, 6, 2.1),
            (2022, 12, 2.5),
            (2023, 6, 3.0),
            (2023, 12, 3.6),
            (2024, 6, 4.5),
            (2024, 12, 5.5),
            (2025, 6, 6.5),
            (2025, 12, 7.5),
        ]
        .into_iter()
        .map(|(y, m, gw)| (YearMonth::literal(y, m), gw))
        .collect();

        let fes_projections = [
            (2025, 7.5, 7.0, 6.5, 6.0),
            (2026, 10.0, 9.0, 8.5, 7.5),
            (2027, 13.0, 11.5, 10.5, 9.0),
            (2028, 16.0, 14.0, 12.5, 10.5),
            (2029, 19.0, 16.5, 15.0, 12.0),
            (2030, 22.0, 19.0, 17.0, 13.5),
            (2031, 24.0, 21.0, 19.0, 15.0),
            (2032, 26.0, 23.0, 21.0, 16.5),
            (2033, 28.0, 25.0, 22.5, 17.5),
            (2034, 30.0, 26.5, 24.0, 18.5),
            (2035, 32.0, 28.0, 25.5, 19.5),
        ]
        .into_iter()
        .map(|(year, lw, ct, st, fs)| FesYear {
            year,
            leading_the_way: lw,
            consumer_transformation: ct,
            system_transformation: st,
            falling_short: fs,
        })
        .collect();

        Self {
            version: CONFIG_VERSION.to_string(),
            floor: FloorConfig {
                average_wholesale_price: 90.0,
                round_trip_loss_fraction: 0.15,
                source: "Round-trip efficiency loss applied to approximate GB wholesale price".to_string(),
            },
            alpha: AlphaConfig {
                central: AlphaEstimate {
                    value: 0.50,
                    source: "Central estimate for the wholesale spread channel".to_string(),
                },
                conservative: AlphaEstimate {
                    value: 0.46,
                    source: "Modo Energy Germany: +50% capacity -> -17% revenue (2026)".to_string(),
                },
                aggressive: AlphaEstimate {
                    value: 0.65,
                    source: "CAISO special reports: 4 -> 11 GW, revenue halved (2022-2024)".to_string(),
                },
            },
            reference_window: ReferenceWindowConfig {
                capacity_threshold_gw: 6.0,
                min_months: 6,
                fallback_months: 6,
            },
            projection_capacities_gw: vec![10.0, 13.0, 16.0, 18.0, 20.0, 25.0],
            regression: RegressionConfig {
                generation_coverage_threshold: 0.5,
            },
            capacity: CapacityConfig {
                historic_points,
                historic_source: "NESO FES 2024, Modo Energy tracker, Solar Media".to_string(),
                fes_projections,
                fes_source: "NESO Future Energy Scenarios 2024 data workbook".to_string(),
                base_scenario: Scenario::SystemTransformation,
            },
            forecast: ForecastConfig {
                start: YearMonth::literal(2026, 1),
                end: YearMonth::literal(2030, 12),
                tariff_unit_divisor: 10.0,
                wind: WindConfig {
                    annual_capacity_growth_gw: 1.5,
                    monthly_capacity_factors: vec![
                        0.38, 0.35, 0.32, 0.28, 0.25, 0.22, 0.22, 0.24, 0.28, 0.32, 0.36, 0.38,
                    ],
                    fallback_generation_gw: 6.8,
                },
            },
        }
    }
}

impl CalibrationConfig {
    /// Load and validate a config from JSON
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the model cannot use
    pub fn validate(&self) -> Result<()> {
        let loss = self.floor.round_trip_loss_fraction;
        if !(loss > 0.0 && loss < 1.0) {
            return Err(ForecastError::Config(format!(
                "round_trip_loss_fraction must be in (0, 1), got {}",
                loss
            )));
        }
        if !(self.floor.average_wholesale_price > 0.0) {
            return Err(ForecastError::Config("average_wholesale_price must be positive".to_string()));
        }
        if let Some(alpha) = self.alpha.range().iter().find(|a| !(*a > 0.0)) {
            return Err(ForecastError::Config(format!("alpha must be positive, got {}", alpha)));
        }
        if self.reference_window.fallback_months == 0 {
            return Err(ForecastError::Config("fallback_months must be at least 1".to_string()));
        }
        if self.forecast.end < self.forecast.start {
            return Err(ForecastError::Config(format!(
                "forecast horizon is empty: {} .. {}",
                self.forecast.start, self.forecast.end
            )));
        }
        if self.forecast.wind.monthly_capacity_factors.len() != 12 {
            return Err(ForecastError::Config(format!(
                "expected 12 monthly capacity factors, got {}",
                self.forecast.wind.monthly_capacity_factors.len()
            )));
        }
        if !(self.forecast.tariff_unit_divisor > 0.0) {
            return Err(ForecastError::Config("tariff_unit_divisor must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CalibrationConfig::default();
        config.validate().unwrap();
        assert!((config.floor.floor() - 13.5).abs() < 1e-12);
        assert_eq!(config.capacity.historic_points.len(), 17);
        assert_eq!(config.capacity.fes_projections.len(), 11);
        let alpha = config.alpha.range();
        assert!(alpha.low < alpha.central && alpha.central < alpha.high);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = CalibrationConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"2017-12\""));
        let parsed: CalibrationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_bad_capacity_factor_table() {
        let mut config = CalibrationConfig::default();
        config.forecast.wind.monthly_capacity_factors.pop();
        assert!(matches!(config.validate(), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_rejects_non_positive_alpha() {
        let mut config = CalibrationConfig::default();
        config.alpha.aggressive.value = 0.0;
        assert!(config.validate().is_err());
    }
}
