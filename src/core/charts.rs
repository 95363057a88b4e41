//! SVG dashboards rendered with plotters.
//!
//! Dates are plotted as day numbers (`num_days_from_ce`) so the axes stay
//! plain `f64` ranges; labels are formatted back into dates.

use crate::core::history::PriceHistory;
use crate::core::stats::format_thousands;
use crate::domain::model::{DailyStats, Product};
use crate::utils::error::{EtlError, Result};
use chrono::{Datelike, Duration, NaiveDate};
use plotters::prelude::*;

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const RANGE_FILL: RGBColor = RGBColor(0xe1, 0xf5, 0xfe);
const MEDIAN: RGBColor = RGBColor(0x19, 0x76, 0xd2);
const MEAN: RGBColor = RGBColor(0xff, 0x98, 0x00);
const TEXT: RGBColor = RGBColor(0x33, 0x33, 0x33);

const OVERVIEW_COLORS: [RGBColor; 8] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
];

const DASHBOARD_SIZE: (u32, u32) = (1200, 1000);
const OVERVIEW_SIZE: (u32, u32) = (1200, 600);

fn day_number(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

fn format_day(x: f64, pattern: &str) -> String {
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
        .map(|d| d.format(pattern).to_string())
        .unwrap_or_default()
}

fn date_pattern(rows: usize) -> &'static str {
    if rows <= 31 {
        "%d %b"
    } else {
        "%b %Y"
    }
}

/// Padded axis ranges so a single observation still has some room.
fn axis_ranges(rows: &[DailyStats]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let first = rows.first().map(|r| day_number(r.date)).unwrap_or(0.0);
    let last = rows.last().map(|r| day_number(r.date)).unwrap_or(0.0);
    let x = if last > first {
        first..last
    } else {
        first - 1.0..last + 1.0
    };

    let low = rows.iter().map(|r| r.min_price).min().unwrap_or(0) as f64;
    let high = rows.iter().map(|r| r.max_price).max().unwrap_or(0) as f64;
    let pad = ((high - low) * 0.05).max(1.0);
    (x, (low - pad).max(0.0)..high + pad)
}

fn stats_footer(latest: &DailyStats, currency: &str) -> String {
    format!(
        "Latest: {} | Count: {} | Min: {} {} | Max: {} {} | Median: {} {}",
        latest.date.format("%Y-%m-%d"),
        latest.count,
        format_thousands(latest.min_price),
        currency,
        format_thousands(latest.max_price),
        currency,
        format_thousands(latest.median_price as i64),
        currency,
    )
}

fn draw_no_data<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    message: &str,
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let style = ("sans-serif", 20).into_font().color(&RGBColor(0x80, 0x80, 0x80));
    area.draw_text(message, &style, ((w / 2) as i32 - 40, (h / 2) as i32))?;
    Ok(())
}

fn draw_timeframe<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    rows: &[DailyStats],
    title: &str,
    show_points: bool,
    currency: &str,
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    if rows.is_empty() {
        let inner = area.titled(title, ("sans-serif", 20))?;
        return draw_no_data(&inner, "No data");
    }

    let (x_range, y_range) = axis_ranges(rows);
    let pattern = date_pattern(rows.len());

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;

    let x_formatter = |x: &f64| format_day(*x, pattern);
    let y_formatter = |y: &f64| format_thousands(*y as i64);
    let y_desc = format!("Price ({})", currency);
    chart
        .configure_mesh()
        .x_labels(rows.len().clamp(2, 10))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .y_desc(y_desc.as_str())
        .draw()?;

    // min-max 區間：上緣順走、下緣逆走組成多邊形
    let mut band: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| (day_number(r.date), r.max_price as f64))
        .collect();
    band.extend(
        rows.iter()
            .rev()
            .map(|r| (day_number(r.date), r.min_price as f64)),
    );
    chart
        .draw_series(std::iter::once(Polygon::new(band, RANGE_FILL.mix(0.9).filled())))?
        .label("Min-Max Range")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], RANGE_FILL.filled()));

    let median: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| (day_number(r.date), r.median_price))
        .collect();
    chart
        .draw_series(LineSeries::new(median.clone(), MEDIAN.stroke_width(2)))?
        .label("Median")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], MEDIAN.stroke_width(2)));
    if show_points {
        chart.draw_series(median.iter().map(|&p| Circle::new(p, 3, MEDIAN.filled())))?;
    }

    chart
        .draw_series(LineSeries::new(
            rows.iter().map(|r| (day_number(r.date), r.mean_price)),
            MEAN.mix(0.8).stroke_width(1),
        ))?
        .label("Mean")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 15, y)], MEAN.stroke_width(1)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&RGBColor(0xcc, 0xcc, 0xcc))
        .label_font(("sans-serif", 12))
        .draw()?;

    Ok(())
}

fn dashboard_svg(
    product: &Product,
    history: &PriceHistory,
    today: NaiveDate,
    currency: &str,
) -> DrawResult<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, DASHBOARD_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        // 標題不放 emoji，字型支援不一
        let root = root.titled(
            &format!("{} - Price Dashboard", product.name),
            ("sans-serif", 28).into_font().style(FontStyle::Bold),
        )?;

        let (body, footer) = root.split_vertically(root.dim_in_pixel().1 as i32 - 40);
        let panels = body.split_evenly((3, 1));

        let week = history.since(today - Duration::days(7));
        let month = history.since(today - Duration::days(30));
        draw_timeframe(&panels[0], week, "Last 7 Days", true, currency)?;
        draw_timeframe(&panels[1], month, "Last 30 Days", month.len() <= 30, currency)?;
        draw_timeframe(&panels[2], history.rows(), "All Time", false, currency)?;

        if let Some(latest) = history.latest() {
            let style = ("sans-serif", 16).into_font().color(&TEXT);
            footer.draw_text(&stats_footer(latest, currency), &style, (20, 10))?;
        }

        root.present()?;
    }
    Ok(svg)
}

fn draw_overview<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    series: &[(&Product, &PriceHistory)],
    currency: &str,
) -> DrawResult<()>
where
    DB::ErrorType: 'static,
{
    let mut rows: Vec<&DailyStats> = series
        .iter()
        .flat_map(|(_, history)| history.rows().iter())
        .collect();
    if rows.is_empty() {
        return draw_no_data(root, "No data yet");
    }
    rows.sort_by_key(|r| r.date);

    let first = day_number(rows[0].date);
    let last = day_number(rows[rows.len() - 1].date);
    let x_range = if last > first {
        first..last
    } else {
        first - 1.0..last + 1.0
    };
    let high = rows.iter().map(|r| r.median_price).fold(f64::MIN, f64::max);
    let low = rows.iter().map(|r| r.median_price).fold(f64::MAX, f64::min);
    let pad = ((high - low) * 0.05).max(1.0);

    let mut chart = ChartBuilder::on(root)
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, (low - pad).max(0.0)..high + pad)?;

    let x_formatter = |x: &f64| format_day(*x, "%d %b %Y");
    let y_formatter = |y: &f64| format_thousands(*y as i64);
    let y_desc = format!("Median Price ({})", currency);
    chart
        .configure_mesh()
        .x_labels(8)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .y_desc(y_desc.as_str())
        .draw()?;

    for (idx, (product, history)) in series.iter().filter(|(_, h)| !h.is_empty()).enumerate() {
        let color = OVERVIEW_COLORS[idx % OVERVIEW_COLORS.len()];
        let points: Vec<(f64, f64)> = history
            .rows()
            .iter()
            .map(|r| (day_number(r.date), r.median_price))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(product.name.as_str())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 15, y)], color.stroke_width(2))
            });
        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 2, color.filled())))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&RGBColor(0xcc, 0xcc, 0xcc))
        .draw()?;

    Ok(())
}

fn overview_svg(
    title: &str,
    series: &[(&Product, &PriceHistory)],
    currency: &str,
) -> DrawResult<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, OVERVIEW_SIZE).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(
            &format!("{} - Overview", title),
            ("sans-serif", 28).into_font().style(FontStyle::Bold),
        )?;
        draw_overview(&root, series, currency)?;
        root.present()?;
    }
    Ok(svg)
}

/// Three-panel dashboard (7 days, 30 days, all time) for one product.
pub fn render_dashboard(
    product: &Product,
    history: &PriceHistory,
    today: NaiveDate,
    currency: &str,
) -> Result<String> {
    dashboard_svg(product, history, today, currency).map_err(|e| EtlError::ChartError {
        message: format!("{} dashboard: {}", product.slug, e),
    })
}

/// Median price of every product on one chart.
pub fn render_overview(
    title: &str,
    series: &[(&Product, &PriceHistory)],
    currency: &str,
) -> Result<String> {
    overview_svg(title, series, currency).map_err(|e| EtlError::ChartError {
        message: format!("overview: {}", e),
    })
}
