use chrono::{Datelike, NaiveDate, Weekday};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{CapacityTrajectory, DailyGeneration, SpreadSeries, SpreadSource, YearMonth};

/// One day of the aligned panel. Capacity is always known; generation may not be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub date: NaiveDate,
    pub spread: f64,
    pub mean_price: Option<f64>,
    pub bess_gw: f64,
    pub wind_gen_gw: Option<f64>,
}

impl PanelRow {
    pub fn month(&self) -> YearMonth {
        YearMonth::of(self.date)
    }

    /// Saturday or Sunday
    pub fn is_weekend(&self) -> bool {
        matches!(self.date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// Daily panel with capacity known on every row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPanel {
    pub source: SpreadSource,
    pub rows: Vec<PanelRow>,
}

impl MergedPanel {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Share of rows with a generation value, 0.0 for an empty panel.
    pub fn generation_coverage(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let known = self.rows.iter().filter(|r| r.wind_gen_gw.is_some()).count();
        known as f64 / self.rows.len() as f64
    }
}

/// Joins the daily spread series with the historic monthly capacity step
/// function and optional daily generation.
///
/// Every day takes the capacity of its containing month. Days whose month has
/// no historic capacity are dropped, never defaulted.
pub fn merge_daily_panel(
    spread: &SpreadSeries,
    capacity: &CapacityTrajectory,
    generation: Option<&[DailyGeneration]>,
) -> MergedPanel {
    let capacity_by_month = capacity.historic_lookup();
    let wind_by_date: HashMap<NaiveDate, Option<f64>> = generation
        .unwrap_or_default()
        .iter()
        .map(|g| (g.date, g.wind_gen_gw))
        .collect();

    let mut rows = Vec::with_capacity(spread.days.len());
    let mut dropped = 0usize;

    for day in &spread.days {
        let Some(&bess_gw) = capacity_by_month.get(&YearMonth::of(day.date)) else {
            dropped += 1;
            continue;
        };
        rows.push(PanelRow {
            date: day.date,
            spread: day.spread,
            mean_price: day.mean_price,
            bess_gw,
            wind_gen_gw: wind_by_date.get(&day.date).copied().flatten(),
        });
    }
    rows.sort_by_key(|r| r.date);

    if dropped > 0 {
        debug!("Dropped {} days with no historic capacity for their month", dropped);
    }
    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        let (min_gw, max_gw) = rows
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| (lo.min(r.bess_gw), hi.max(r.bess_gw)));
        info!(
            "Merged dataset: {} days, {} to {}, BESS {:.1} to {:.1} GW",
            rows.len(),
            first.date,
            last.date,
            min_gw,
            max_gw
        );
    }

    MergedPanel {
        source: spread.source,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapacityPoint, DailySpread, Provenance, Scenario};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn capacity() -> CapacityTrajectory {
        let point = |y, m, gw, provenance| CapacityPoint {
            month: YearMonth::new(y, m).unwrap(),
            capacity_gw: gw,
            provenance,
        };
        CapacityTrajectory::new(vec![
            point(2024, 1, 4.0, Provenance::Historic),
            point(2024, 2, 4.2, Provenance::Historic),
            point(2024, 3, 9.9, Provenance::Projected(Scenario::SystemTransformation)),
        ])
        .unwrap()
    }

    fn spread_series() -> SpreadSeries {
        let days = [day(2023, 12, 31), day(2024, 1, 6), day(2024, 1, 8), day(2024, 2, 29), day(2024, 3, 1)]
            .into_iter()
            .map(|date| DailySpread {
                date,
                spread: 100.0,
                mean_price: Some(80.0),
            })
            .collect();
        SpreadSeries {
            source: SpreadSource::TariffProxy,
            days,
        }
    }

    #[test]
    fn test_capacity_broadcast_and_drop() {
        let panel = merge_daily_panel(&spread_series(), &capacity(), None);
        // December has no capacity, March is projected only
        assert_eq!(panel.len(), 3);
        assert_eq!(panel.source, SpreadSource::TariffProxy);
        assert_eq!(panel.rows[0].bess_gw, 4.0);
        assert_eq!(panel.rows[1].bess_gw, 4.0);
        assert_eq!(panel.rows[2].bess_gw, 4.2);
        assert!(panel.rows.iter().all(|r| r.bess_gw.is_finite()));
    }

    #[test]
    fn test_generation_left_join_keeps_unknowns() {
        let generation = vec![
            DailyGeneration {
                date: day(2024, 1, 6),
                wind_gen_gw: Some(11.0),
                solar_gen_gw: None,
            },
            DailyGeneration {
                date: day(2024, 1, 8),
                wind_gen_gw: None,
                solar_gen_gw: None,
            },
        ];
        let panel = merge_daily_panel(&spread_series(), &capacity(), Some(&generation));
        assert_eq!(panel.rows[0].wind_gen_gw, Some(11.0));
        assert_eq!(panel.rows[1].wind_gen_gw, None);
        assert_eq!(panel.rows[2].wind_gen_gw, None);
        assert!((panel.generation_coverage() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_weekend_flag() {
        let panel = merge_daily_panel(&spread_series(), &capacity(), None);
        // 2024-01-06 is a Saturday, 2024-01-08 a Monday
        assert!(panel.rows[0].is_weekend());
        assert!(!panel.rows[1].is_weekend());
    }
}
