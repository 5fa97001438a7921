use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use plotters::prelude::*;
use std::path::Path;

use spread_model::{CapacityTrajectory, CompressionParams, Forecast, MonthlyObservation, Scenario, YearMonth};

const PURPLE: RGBColor = RGBColor(123, 47, 190);
const ORANGE: RGBColor = RGBColor(230, 126, 34);

fn year_fraction(month: YearMonth) -> f64 {
    month.year() as f64 + (month.month() - 1) as f64 / 12.0
}

fn date_fraction(date: NaiveDate) -> f64 {
    year_fraction(YearMonth::of(date))
}

/// Padded (min, max) of the values, or a unit range when there are none.
fn value_range(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.08).max(1.0);
    ((lo - pad).max(0.0), hi + pad)
}

fn scenario_color(scenario: Scenario) -> RGBColor {
    match scenario {
        Scenario::LeadingTheWay => PURPLE,
        Scenario::ConsumerTransformation => BLUE,
        Scenario::SystemTransformation => GREEN,
        Scenario::FallingShort => ORANGE,
    }
}

pub fn capacity_fan(path: &Path, base: &CapacityTrajectory, scenarios: &[(Scenario, CapacityTrajectory)]) -> Result<()> {
    let all_points = base.points().iter().chain(scenarios.iter().flat_map(|(_, t)| t.points()));
    let (x0, x1) = value_range(all_points.clone().map(|p| year_fraction(p.month)));
    let (_, y1) = value_range(all_points.map(|p| p.capacity_gw));

    let root = BitMapBackend::new(path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("GB BESS Capacity: History and FES Scenarios", ("sans-serif", 28).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0.floor()..x1.ceil(), 0.0..y1)?;
    chart.configure_mesh().x_desc("Year").y_desc("BESS capacity (GW)").draw()?;

    chart
        .draw_series(LineSeries::new(
            base.points()
                .iter()
                .filter(|p| p.provenance.is_historic())
                .map(|p| (year_fraction(p.month), p.capacity_gw)),
            BLACK.stroke_width(3),
        ))?
        .label("Historic")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK));

    for (scenario, trajectory) in scenarios {
        let color = scenario_color(*scenario);
        chart
            .draw_series(LineSeries::new(
                trajectory.points().iter().map(|p| (year_fraction(p.month), p.capacity_gw)),
                color.stroke_width(2),
            ))?
            .label(scenario.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    info!("Saved chart {}", path.display());
    Ok(())
}

/// Monthly observations against the calibrated curves for all three alphas.
pub fn spread_model(path: &Path, monthly: &[MonthlyObservation], params: &CompressionParams) -> Result<()> {
    let max_gw = monthly
        .iter()
        .map(|m| m.bess_gw)
        .fold(25.0_f64, f64::max);
    let curve_x: Vec<f64> = (1..=200).map(|i| i as f64 * max_gw / 200.0).collect();
    let curve = |alpha: f64| -> Vec<(f64, f64)> {
        curve_x
            .iter()
            .filter_map(|&c| params.spread_at(c, alpha).ok().map(|s| (c, s)))
            .collect()
    };
    let (_, y1) = value_range(
        monthly
            .iter()
            .map(|m| m.spread)
            .chain(std::iter::once(params.spread_ref * 1.5)),
    );

    let root = BitMapBackend::new(path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Spread Compression Model", ("sans-serif", 28).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..max_gw, 0.0..y1)?;
    chart
        .configure_mesh()
        .x_desc("BESS capacity (GW)")
        .y_desc("Daily spread (£/MWh)")
        .draw()?;

    chart
        .draw_series(
            monthly
                .iter()
                .map(|m| Circle::new((m.bess_gw, m.spread), 4, BLACK.mix(0.6).filled())),
        )?
        .label("Monthly mean")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLACK.filled()));

    for (alpha, label, color) in [
        (params.alpha.central, "central", BLUE),
        (params.alpha.low, "conservative", GREEN),
        (params.alpha.high, "aggressive", RED),
    ] {
        chart
            .draw_series(LineSeries::new(curve(alpha), color.stroke_width(2)))?
            .label(format!("alpha {:.2} ({})", alpha, label))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .draw_series(LineSeries::new(vec![(0.0, params.floor), (max_gw, params.floor)], BLACK.mix(0.4)))?
        .label(format!("floor {:.1}", params.floor))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.4)));
    chart.draw_series(std::iter::once(Circle::new(
        (params.bess_ref, params.spread_ref),
        7,
        RED.filled(),
    )))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    info!("Saved chart {}", path.display());
    Ok(())
}

/// Wholesale spread with scenario and alpha bands over the historic monthly
/// means, and the tariff spread below it.
pub fn forecast(path: &Path, forecast: &Forecast, history: &[MonthlyObservation]) -> Result<()> {
    let rows = &forecast.rows;
    let (x0, x1) = value_range(
        rows.iter()
            .map(|r| date_fraction(r.date))
            .chain(history.iter().map(|m| year_fraction(m.month))),
    );
    let (_, spread_max) = value_range(
        rows.iter()
            .flat_map(|r| {
                [
                    Some(r.wholesale_spread),
                    Some(r.elasticity.conservative),
                    r.scenario_spreads.falling_short,
                ]
            })
            .flatten()
            .chain(history.iter().map(|m| m.spread)),
    );
    let (_, tariff_max) = value_range(rows.iter().map(|r| r.agile_spread_p_kwh));

    let root = BitMapBackend::new(path, (1400, 1000)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let mut upper = ChartBuilder::on(&panels[0])
        .caption("Five-Year Forecast: BESS Growth -> Spread Compression", ("sans-serif", 26).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, 0.0..spread_max)?;
    upper.configure_mesh().y_desc("Wholesale spread (£/MWh)").draw()?;

    let mut band: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| (date_fraction(r.date), r.elasticity.conservative))
        .collect();
    band.extend(rows.iter().rev().map(|r| (date_fraction(r.date), r.elasticity.aggressive)));
    upper
        .draw_series(std::iter::once(Polygon::new(band, BLUE.mix(0.15))))?
        .label("alpha range")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BLUE.mix(0.15).filled()));

    if !history.is_empty() {
        upper
            .draw_series(LineSeries::new(
                history.iter().map(|m| (year_fraction(m.month), m.spread)),
                BLACK.mix(0.6),
            ))?
            .label("Historic monthly mean")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.6)));
    }

    upper
        .draw_series(LineSeries::new(
            rows.iter().map(|r| (date_fraction(r.date), r.wholesale_spread)),
            BLUE.stroke_width(3),
        ))?
        .label("Base case")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    for scenario in [Scenario::LeadingTheWay, Scenario::FallingShort] {
        let points: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|r| r.scenario_spreads.get(scenario).map(|s| (date_fraction(r.date), s)))
            .collect();
        if points.is_empty() {
            continue;
        }
        let color = scenario_color(scenario);
        upper
            .draw_series(LineSeries::new(points, color.stroke_width(1)))?
            .label(scenario.label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    upper
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    let caption = if forecast.pass_through_status.is_degraded() {
        "Agile Tariff Spread (UNVALIDATED identity pass-through)"
    } else {
        "Agile Tariff Spread"
    };
    let mut lower = ChartBuilder::on(&panels[1])
        .caption(caption, ("sans-serif", 22).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, 0.0..tariff_max)?;
    lower.configure_mesh().x_desc("Year").y_desc("Agile spread (p/kWh)").draw()?;
    lower.draw_series(LineSeries::new(
        rows.iter().map(|r| (date_fraction(r.date), r.agile_spread_p_kwh)),
        ORANGE.stroke_width(3),
    ))?;

    root.present()?;
    info!("Saved chart {}", path.display());
    Ok(())
}

/// Base-case spread path for a sweep of alphas.
pub fn alpha_sensitivity(path: &Path, base: &CapacityTrajectory, params: &CompressionParams) -> Result<()> {
    let alphas = [0.3, 0.4, params.alpha.low, params.alpha.central, params.alpha.high, 0.8];
    let paths: Vec<(f64, Vec<(f64, f64)>)> = alphas
        .iter()
        .map(|&alpha| {
            let points = base
                .points()
                .iter()
                .filter_map(|p| params.spread_at(p.capacity_gw, alpha).ok().map(|s| (year_fraction(p.month), s)))
                .collect();
            (alpha, points)
        })
        .collect();
    let (x0, x1) = value_range(base.points().iter().map(|p| year_fraction(p.month)));
    let (_, y1) = value_range(paths.iter().flat_map(|(_, pts)| pts.iter().map(|(_, s)| *s)));

    let root = BitMapBackend::new(path, (1200, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Sensitivity to Compression Elasticity", ("sans-serif", 28).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, 0.0..y1)?;
    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("Annual-level wholesale spread (£/MWh)")
        .draw()?;

    for (i, (alpha, points)) in paths.into_iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let width = if alpha == params.alpha.central { 3 } else { 1 };
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(width)))?
            .label(format!("alpha = {:.2}", alpha))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    info!("Saved chart {}", path.display());
    Ok(())
}
