use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ForecastError, Result};

/// Calendar month key used for every monthly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// For compile-time constants; `month` must be in 1..=12.
    pub(crate) const fn literal(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First calendar day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Months elapsed from `earlier` to `self` (negative when `self` is earlier).
    pub fn months_since(&self, earlier: YearMonth) -> i32 {
        (self.year - earlier.year) * 12 + self.month as i32 - earlier.month as i32
    }

    /// The following month
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Inclusive month range `self..=end`; empty when `end` precedes `self`.
    pub fn through(self, end: YearMonth) -> impl Iterator<Item = YearMonth> {
        std::iter::successors(Some(self), |m| Some(m.succ())).take_while(move |m| *m <= end)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ForecastError;

    /// Accepts `YYYY-MM` or a full `YYYY-MM-DD` date.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let bad = || ForecastError::Schema(format!("cannot parse month '{}'", s));
        let mut parts = s.splitn(3, '-');
        let year = parts.next().and_then(|p| p.parse::<i32>().ok()).ok_or_else(bad)?;
        let month = parts
            .next()
            .and_then(|p| p.get(..2).unwrap_or(p).parse::<u32>().ok())
            .ok_or_else(bad)?;
        YearMonth::new(year, month).ok_or_else(bad)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Future Energy Scenarios used for the capacity fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    LeadingTheWay,
    ConsumerTransformation,
    SystemTransformation,
    FallingShort,
}

impl Scenario {
    /// Ordered from most to least storage build-out.
    pub const ALL: [Scenario; 4] = [
        Scenario::LeadingTheWay,
        Scenario::ConsumerTransformation,
        Scenario::SystemTransformation,
        Scenario::FallingShort,
    ];

    /// Snake-case key used in CSV files
    pub fn key(&self) -> &'static str {
        match self {
            Scenario::LeadingTheWay => "leading_the_way",
            Scenario::ConsumerTransformation => "consumer_transformation",
            Scenario::SystemTransformation => "system_transformation",
            Scenario::FallingShort => "falling_short",
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::LeadingTheWay => "Leading the Way",
            Scenario::ConsumerTransformation => "Consumer Transformation",
            Scenario::SystemTransformation => "System Transformation",
            Scenario::FallingShort => "Falling Short",
        }
    }
}

impl FromStr for Scenario {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().trim_start_matches("fes_");
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.key() == key)
            .ok_or_else(|| ForecastError::Schema(format!("unknown scenario '{}'", s)))
    }
}

/// Where a capacity value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Historic,
    Projected(Scenario),
}

impl Provenance {
    /// Value written to the `source` column
    pub fn tag(&self) -> String {
        match self {
            Provenance::Historic => "historic".to_string(),
            Provenance::Projected(scenario) => format!("fes_{}", scenario.key()),
        }
    }

    pub fn is_historic(&self) -> bool {
        matches!(self, Provenance::Historic)
    }
}

impl FromStr for Provenance {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim() == "historic" {
            Ok(Provenance::Historic)
        } else {
            s.parse().map(Provenance::Projected)
        }
    }
}

/// Capacity at the start of a month and where the figure came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityPoint {
    pub month: YearMonth,
    pub capacity_gw: f64,
    pub provenance: Provenance,
}

/// Monthly BESS capacity path, unique per month and sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityTrajectory {
    points: Vec<CapacityPoint>,
}

impl CapacityTrajectory {
    /// Sort points by month, rejecting duplicate months
    pub fn new(mut points: Vec<CapacityPoint>) -> Result<Self> {
        points.sort_by_key(|p| p.month);
        if let Some(pair) = points.windows(2).find(|w| w[0].month == w[1].month) {
            return Err(ForecastError::Schema(format!(
                "duplicate capacity value for {}",
                pair[0].month
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.capacity_gw.is_finite() || p.capacity_gw < 0.0) {
            return Err(ForecastError::Schema(format!(
                "invalid capacity {} GW at {}",
                bad.capacity_gw, bad.month
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[CapacityPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Capacity (GW) at an exact month
    pub fn capacity_at(&self, month: YearMonth) -> Option<f64> {
        self.points
            .binary_search_by_key(&month, |p| p.month)
            .ok()
            .map(|idx| self.points[idx].capacity_gw)
    }

    /// Month -> GW for the historic points only.
    pub fn historic_lookup(&self) -> BTreeMap<YearMonth, f64> {
        self.points
            .iter()
            .filter(|p| p.provenance.is_historic())
            .map(|p| (p.month, p.capacity_gw))
            .collect()
    }

    /// Latest observed (non-projected) point
    pub fn last_historic(&self) -> Option<&CapacityPoint> {
        self.points.iter().rev().find(|p| p.provenance.is_historic())
    }

    /// Points with `start <= month <= end`.
    pub fn window(&self, start: YearMonth, end: YearMonth) -> CapacityTrajectory {
        CapacityTrajectory {
            points: self
                .points
                .iter()
                .filter(|p| p.month >= start && p.month <= end)
                .copied()
                .collect(),
        }
    }
}

/// Which market measurement the spread series was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadSource {
    /// Direct wholesale market index prices.
    DirectWholesale,
    /// Spread reverse-engineered from retail tariff rates.
    TariffProxy,
}

impl SpreadSource {
    /// Human-readable provenance for reports
    pub fn describe(&self) -> &'static str {
        match self {
            SpreadSource::DirectWholesale => "direct wholesale market measurement",
            SpreadSource::TariffProxy => "tariff-derived proxy",
        }
    }
}

/// One day of a spread/price series, in £/MWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailySpread {
    pub date: NaiveDate,
    pub spread: f64,
    pub mean_price: Option<f64>,
}

/// Daily spread series tagged with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadSeries {
    pub source: SpreadSource,
    pub days: Vec<DailySpread>,
}

/// Daily average generation; `None` means unknown, not zero
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyGeneration {
    pub date: NaiveDate,
    pub wind_gen_gw: Option<f64>,
    pub solar_gen_gw: Option<f64>,
}

/// Installed renewables at the start of a month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenewableCapacity {
    pub month: YearMonth,
    pub onshore_wind_gw: f64,
    pub offshore_wind_gw: f64,
    pub solar_gw: Option<f64>,
}

impl RenewableCapacity {
    pub fn total_wind_gw(&self) -> f64 {
        self.onshore_wind_gw + self.offshore_wind_gw
    }
}

/// The three externally sourced compression elasticities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaRange {
    pub central: f64,
    /// Conservative: less compression.
    pub low: f64,
    /// Aggressive: more compression.
    pub high: f64,
}

impl AlphaRange {
    pub fn iter(&self) -> impl Iterator<Item = f64> {
        [self.central, self.low, self.high].into_iter()
    }
}

/// Calibrated power-law parameters plus seasonal offsets from the reference regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionParams {
    /// Asymptotic spread, £/MWh.
    pub floor: f64,
    /// Spread at the reference capacity, £/MWh.
    pub spread_ref: f64,
    /// Reference capacity, GW.
    pub bess_ref: f64,
    pub alpha: AlphaRange,
    /// Month number (2..=12) -> additive offset relative to the reference month.
    pub month_coefs: BTreeMap<u32, f64>,
    pub weekend_coef: f64,
}

impl CompressionParams {
    /// Reject parameters the power law cannot be evaluated with
    pub fn validate(&self) -> Result<()> {
        if !(self.floor > 0.0) {
            return Err(ForecastError::InvalidParameters(format!(
                "floor must be positive, got {}",
                self.floor
            )));
        }
        if !(self.spread_ref > self.floor) {
            return Err(ForecastError::InvalidParameters(format!(
                "spread_ref ({:.2}) must exceed floor ({:.2})",
                self.spread_ref, self.floor
            )));
        }
        if !(self.bess_ref > 0.0) {
            return Err(ForecastError::InvalidParameters(format!(
                "bess_ref must be positive, got {}",
                self.bess_ref
            )));
        }
        if let Some(alpha) = self.alpha.iter().find(|a| !(*a > 0.0) || !a.is_finite()) {
            return Err(ForecastError::InvalidParameters(format!(
                "alpha must be positive and finite, got {}",
                alpha
            )));
        }
        Ok(())
    }
}

/// Whether the pass-through mapping was fitted against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassThroughStatus {
    Fitted,
    /// Identity mapping; no overlapping wholesale data to validate against.
    Degraded { reason: String },
}

impl PassThroughStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PassThroughStatus::Degraded { .. })
    }
}

/// Affine wholesale -> tariff mapping for spread and price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassThroughParams {
    pub spread_multiplier: f64,
    pub spread_intercept: f64,
    pub spread_r_squared: Option<f64>,
    pub price_multiplier: f64,
    pub price_adder: f64,
    pub price_r_squared: Option<f64>,
    pub n_obs: usize,
    pub status: PassThroughStatus,
}

impl PassThroughParams {
    /// Unvalidated identity mapping used when no ground truth overlaps
    pub fn identity(n_obs: usize, reason: impl Into<String>) -> Self {
        Self {
            spread_multiplier: 1.0,
            spread_intercept: 0.0,
            spread_r_squared: None,
            price_multiplier: 1.0,
            price_adder: 0.0,
            price_r_squared: None,
            n_obs,
            status: PassThroughStatus::Degraded { reason: reason.into() },
        }
    }

    /// Tariff spread (£/MWh) implied by a wholesale spread
    pub fn tariff_spread(&self, wholesale_spread: f64) -> f64 {
        self.spread_intercept + self.spread_multiplier * wholesale_spread
    }

    /// Tariff mean price (£/MWh) implied by a wholesale mean price
    pub fn tariff_price(&self, wholesale_price: f64) -> f64 {
        self.price_adder + self.price_multiplier * wholesale_price
    }
}

/// Wholesale spreads for the non-base capacity scenarios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpreads {
    pub leading_the_way: Option<f64>,
    pub consumer_transformation: Option<f64>,
    pub falling_short: Option<f64>,
}

impl ScenarioSpreads {
    pub fn set(&mut self, scenario: Scenario, spread: f64) {
        match scenario {
            Scenario::LeadingTheWay => self.leading_the_way = Some(spread),
            Scenario::ConsumerTransformation => self.consumer_transformation = Some(spread),
            Scenario::FallingShort => self.falling_short = Some(spread),
            Scenario::SystemTransformation => {}
        }
    }

    /// Spread for a scenario, if composed
    pub fn get(&self, scenario: Scenario) -> Option<f64> {
        match scenario {
            Scenario::LeadingTheWay => self.leading_the_way,
            Scenario::ConsumerTransformation => self.consumer_transformation,
            Scenario::FallingShort => self.falling_short,
            Scenario::SystemTransformation => None,
        }
    }
}

/// Wholesale spread at base-case capacity under the alternative elasticities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticityBand {
    pub conservative: f64,
    pub aggressive: f64,
}

/// One forecast month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub bess_gw: f64,
    pub wind_gen_gw: f64,
    /// £/MWh
    pub wholesale_spread: f64,
    /// £/MWh
    pub agile_spread: f64,
    /// p/kWh
    pub agile_spread_p_kwh: f64,
    pub scenario_spreads: ScenarioSpreads,
    pub elasticity: ElasticityBand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_parsing() {
        let m: YearMonth = "2017-12".parse().unwrap();
        assert_eq!((m.year(), m.month()), (2017, 12));
        let d: YearMonth = "2025-06-01".parse().unwrap();
        assert_eq!(d, YearMonth::new(2025, 6).unwrap());
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("garbage".parse::<YearMonth>().is_err());
        assert_eq!(m.succ(), YearMonth::new(2018, 1).unwrap());
        assert_eq!(YearMonth::new(2026, 3).unwrap().months_since(m), 99);
    }

    #[test]
    fn test_month_range_is_inclusive() {
        let start = YearMonth::new(2025, 11).unwrap();
        let end = YearMonth::new(2026, 2).unwrap();
        let months: Vec<String> = start.through(end).map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2025-11", "2025-12", "2026-01", "2026-02"]);
        assert_eq!(end.through(start).count(), 0);
    }

    #[test]
    fn test_provenance_tags_round_trip() {
        assert_eq!("historic".parse::<Provenance>().unwrap(), Provenance::Historic);
        let projected: Provenance = "fes_system_transformation".parse().unwrap();
        assert_eq!(projected, Provenance::Projected(Scenario::SystemTransformation));
        assert_eq!(projected.tag(), "fes_system_transformation");
        assert!("fes_unknown".parse::<Provenance>().is_err());
    }

    #[test]
    fn test_trajectory_rejects_duplicate_months() {
        let month = YearMonth::new(2024, 1).unwrap();
        let point = CapacityPoint { month, capacity_gw: 4.0, provenance: Provenance::Historic };
        let result = CapacityTrajectory::new(vec![point, point]);
        assert!(matches!(result, Err(ForecastError::Schema(_))));
    }

    #[test]
    fn test_identity_pass_through_is_flagged() {
        let params = PassThroughParams::identity(10, "no wholesale data");
        assert!(params.status.is_degraded());
        assert_eq!(params.tariff_spread(87.5), 87.5);
    }

    #[test]
    fn test_compression_params_invariants() {
        let mut params = CompressionParams {
            floor: 13.5,
            spread_ref: 120.0,
            bess_ref: 6.5,
            alpha: AlphaRange { central: 0.5, low: 0.46, high: 0.65 },
            month_coefs: BTreeMap::new(),
            weekend_coef: 0.0,
        };
        assert!(params.validate().is_ok());
        params.spread_ref = 10.0;
        assert!(matches!(params.validate(), Err(ForecastError::InvalidParameters(_))));
    }
}
