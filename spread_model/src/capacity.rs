use log::{info, warn};
use std::collections::BTreeMap;

use crate::config::CapacityConfig;
use crate::error::{ForecastError, Result};
use crate::models::{CapacityPoint, CapacityTrajectory, Provenance, Scenario, YearMonth};

const ORDERING_TOLERANCE_GW: f64 = 1e-9;

/// Linear interpolation between anchor months, one point per month from the
/// first anchor to the last.
fn interpolate_monthly(anchors: &[(YearMonth, f64)], provenance: Provenance) -> Vec<CapacityPoint> {
    let mut points = Vec::new();
    for pair in anchors.windows(2) {
        let ((start, from_gw), (end, to_gw)) = (pair[0], pair[1]);
        let span = end.months_since(start) as f64;
        for month in start.through(end).take_while(|m| *m < end) {
            let t = month.months_since(start) as f64 / span;
            points.push(CapacityPoint {
                month,
                capacity_gw: from_gw + t * (to_gw - from_gw),
                provenance,
            });
        }
    }
    if let Some(&(month, capacity_gw)) = anchors.last() {
        points.push(CapacityPoint {
            month,
            capacity_gw,
            provenance,
        });
    }
    points
}

/// Monthly historic capacity from the configured known points.
pub fn historic_trajectory(config: &CapacityConfig) -> Result<CapacityTrajectory> {
    let anchors: Vec<(YearMonth, f64)> = config.historic_points.iter().map(|(m, gw)| (*m, *gw)).collect();
    if anchors.is_empty() {
        return Err(ForecastError::MissingInput("no historic capacity points configured".to_string()));
    }
    let trajectory = CapacityTrajectory::new(interpolate_monthly(&anchors, Provenance::Historic))?;
    if let (Some(first), Some(last)) = (trajectory.points().first(), trajectory.points().last()) {
        info!(
            "Historic BESS: {} months, {:.1} GW ({}) to {:.1} GW ({})",
            trajectory.len(),
            first.capacity_gw,
            first.month,
            last.capacity_gw,
            last.month
        );
    }
    Ok(trajectory)
}

/// One monthly path per FES scenario, each annual value anchored at January.
pub fn scenario_trajectories(config: &CapacityConfig) -> Result<Vec<(Scenario, CapacityTrajectory)>> {
    let mut years = config.fes_projections.clone();
    years.sort_by_key(|y| y.year);
    if years.is_empty() {
        return Err(ForecastError::MissingInput("no FES projections configured".to_string()));
    }

    Scenario::ALL
        .into_iter()
        .map(|scenario| {
            let anchors: Vec<(YearMonth, f64)> = years
                .iter()
                .map(|y| (YearMonth::literal(y.year, 1), y.value(scenario)))
                .collect();
            let points = interpolate_monthly(&anchors, Provenance::Projected(scenario));
            Ok((scenario, CapacityTrajectory::new(points)?))
        })
        .collect()
}

/// Historic months followed by the base scenario strictly after the last
/// historic month.
pub fn base_trajectory(historic: &CapacityTrajectory, base: &CapacityTrajectory) -> Result<CapacityTrajectory> {
    let Some(last_historic) = historic.last_historic().map(|p| p.month) else {
        warn!("No historic capacity; base case is the scenario path alone");
        return Ok(base.clone());
    };
    let points: Vec<CapacityPoint> = historic
        .points()
        .iter()
        .filter(|p| p.provenance.is_historic())
        .chain(base.points().iter().filter(|p| p.month > last_historic))
        .copied()
        .collect();
    CapacityTrajectory::new(points)
}

/// The base case restricted to the horizon, falling back to the base
/// scenario when the base case does not reach it.
pub fn forecast_window(
    base: &CapacityTrajectory,
    scenario: &CapacityTrajectory,
    start: YearMonth,
    end: YearMonth,
) -> CapacityTrajectory {
    let window = base.window(start, end);
    if !window.is_empty() {
        return window;
    }
    warn!(
        "Base capacity has no months in {} .. {}; using the scenario path",
        start, end
    );
    scenario.window(start, end)
}

/// Capacity paths for several scenarios, checked to be ordered
/// Leading the Way >= Consumer Transformation >= System Transformation >= Falling Short
/// at every month they share.
#[derive(Debug, Clone, Default)]
pub struct ScenarioFan {
    paths: BTreeMap<Scenario, CapacityTrajectory>,
}

impl ScenarioFan {
    /// Build the fan, checking LW >= CT >= ST >= FS at every shared month
    pub fn new(paths: Vec<(Scenario, CapacityTrajectory)>) -> Result<Self> {
        let paths: BTreeMap<Scenario, CapacityTrajectory> = paths.into_iter().collect();

        let mut by_month: BTreeMap<YearMonth, Vec<(Scenario, f64)>> = BTreeMap::new();
        // BTreeMap iteration follows Scenario's derived order, largest build-out first.
        for (scenario, path) in &paths {
            for point in path.points() {
                by_month.entry(point.month).or_default().push((*scenario, point.capacity_gw));
            }
        }
        for (month, values) in &by_month {
            if let Some(pair) = values.windows(2).find(|w| w[1].1 > w[0].1 + ORDERING_TOLERANCE_GW) {
                return Err(ForecastError::InvalidParameters(format!(
                    "{}: {} ({:.2} GW) exceeds {} ({:.2} GW)",
                    month,
                    pair[1].0.label(),
                    pair[1].1,
                    pair[0].0.label(),
                    pair[0].1
                )));
            }
        }
        Ok(Self { paths })
    }

    /// Trajectory for one scenario, if it was supplied
    pub fn get(&self, scenario: Scenario) -> Option<&CapacityTrajectory> {
        self.paths.get(&scenario)
    }

    /// Scenario capacity (GW) at a month
    pub fn capacity_at(&self, scenario: Scenario, month: YearMonth) -> Option<f64> {
        self.get(scenario).and_then(|path| path.capacity_at(month))
    }

    /// Scenarios present in the fan, in canonical order
    pub fn scenarios(&self) -> impl Iterator<Item = Scenario> + '_ {
        self.paths.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;

    fn ym(y: i32, m: u32) -> YearMonth {
        YearMonth::new(y, m).unwrap()
    }

    fn path(scenario: Scenario, values: &[(i32, u32, f64)]) -> CapacityTrajectory {
        CapacityTrajectory::new(
            values
                .iter()
                .map(|&(y, m, gw)| CapacityPoint {
                    month: ym(y, m),
                    capacity_gw: gw,
                    provenance: Provenance::Projected(scenario),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_historic_interpolation() {
        let config = CalibrationConfig::default().capacity;
        let historic = historic_trajectory(&config).unwrap();
        // 2017-12 .. 2025-12 inclusive
        assert_eq!(historic.len(), 97);
        assert_eq!(historic.capacity_at(ym(2017, 12)), Some(0.3));
        assert_eq!(historic.capacity_at(ym(2025, 6)), Some(6.5));
        // halfway between 2025-06 (6.5) and 2025-12 (7.5)
        assert!((historic.capacity_at(ym(2025, 9)).unwrap() - 7.0).abs() < 1e-12);
        assert!(historic.points().iter().all(|p| p.provenance.is_historic()));
    }

    #[test]
    fn test_scenarios_anchor_at_january() {
        let config = CalibrationConfig::default().capacity;
        let scenarios = scenario_trajectories(&config).unwrap();
        assert_eq!(scenarios.len(), 4);
        let (scenario, st) = &scenarios[2];
        assert_eq!(*scenario, Scenario::SystemTransformation);
        assert_eq!(st.capacity_at(ym(2027, 1)), Some(10.5));
        assert!((st.capacity_at(ym(2027, 7)).unwrap() - 11.5).abs() < 1e-12);
        assert_eq!(st.points().last().map(|p| p.month), Some(ym(2035, 1)));
        ScenarioFan::new(scenarios).unwrap();
    }

    #[test]
    fn test_base_trajectory_splices_after_history() {
        let config = CalibrationConfig::default().capacity;
        let historic = historic_trajectory(&config).unwrap();
        let scenarios = scenario_trajectories(&config).unwrap();
        let st = &scenarios[2].1;

        let base = base_trajectory(&historic, st).unwrap();
        assert_eq!(base.last_historic().map(|p| p.month), Some(ym(2025, 12)));
        assert_eq!(base.capacity_at(ym(2025, 12)), Some(7.5));
        let january = base.points().iter().find(|p| p.month == ym(2026, 1)).unwrap();
        assert_eq!(january.provenance, Provenance::Projected(Scenario::SystemTransformation));
        assert_eq!(january.capacity_gw, 8.5);

        let window = forecast_window(&base, st, ym(2026, 1), ym(2030, 12));
        assert_eq!(window.len(), 60);
        assert!(window.points().iter().all(|p| !p.provenance.is_historic()));
    }

    #[test]
    fn test_forecast_window_falls_back_to_scenario() {
        let base = path(Scenario::SystemTransformation, &[(2020, 1, 1.0)]);
        let st = path(Scenario::SystemTransformation, &[(2026, 1, 8.5), (2026, 2, 8.6)]);
        let window = forecast_window(&base, &st, ym(2026, 1), ym(2026, 12));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_fan_rejects_crossed_scenarios() {
        let lw = path(Scenario::LeadingTheWay, &[(2027, 1, 10.0)]);
        let fs = path(Scenario::FallingShort, &[(2027, 1, 12.0)]);
        let result = ScenarioFan::new(vec![(Scenario::FallingShort, fs), (Scenario::LeadingTheWay, lw)]);
        assert!(matches!(result, Err(ForecastError::InvalidParameters(_))));
    }

    #[test]
    fn test_fan_lookup() {
        let lw = path(Scenario::LeadingTheWay, &[(2027, 1, 13.0)]);
        let st = path(Scenario::SystemTransformation, &[(2027, 1, 10.5), (2027, 2, 10.6)]);
        let fan = ScenarioFan::new(vec![(Scenario::LeadingTheWay, lw), (Scenario::SystemTransformation, st)]).unwrap();
        assert_eq!(fan.capacity_at(Scenario::LeadingTheWay, ym(2027, 1)), Some(13.0));
        assert_eq!(fan.capacity_at(Scenario::LeadingTheWay, ym(2027, 2)), None);
        assert_eq!(fan.capacity_at(Scenario::FallingShort, ym(2027, 1)), None);
        assert_eq!(fan.scenarios().count(), 2);
    }
}
