use crate::config::toml_config::ReportConfig;
use crate::core::stats::format_thousands;
use crate::domain::model::ProductSnapshot;
use chrono::NaiveDate;

/// `?v=YYYYMMDD` so image caches roll over once a day.
pub fn image_url(report: &ReportConfig, file: &str, today: NaiveDate) -> String {
    format!(
        "{}/{}?v={}",
        report.base_url.trim_end_matches('/'),
        file.trim_start_matches('/'),
        today.format("%Y%m%d")
    )
}

fn money(value: f64, currency: &str) -> String {
    format!("{} {}", format_thousands(value.trunc() as i64), currency)
}

pub fn render_readme(
    report: &ReportConfig,
    overview_url: &str,
    snapshots: &[ProductSnapshot],
) -> String {
    let mut lines: Vec<String> = vec![
        format!("# {}", report.title),
        String::new(),
        report.description.clone(),
        String::new(),
        format!("![Overview]({})", overview_url),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for snapshot in snapshots {
        let product = &snapshot.product;
        lines.push(format!("## {}", product.label()));
        lines.push(String::new());
        lines.push(format!("![{} Dashboard]({})", product.name, snapshot.dashboard_url));
        lines.push(String::new());

        if let Some(stats) = &snapshot.latest {
            let currency = report.currency.as_str();
            lines.push("| Metric | Value |".to_string());
            lines.push("|--------|-------|".to_string());
            lines.push(format!("| Listings | {} |", stats.count));
            lines.push(format!("| Min | {} |", money(stats.min_price as f64, currency)));
            lines.push(format!("| Max | {} |", money(stats.max_price as f64, currency)));
            lines.push(format!("| Median | {} |", money(stats.median_price, currency)));
            lines.push(format!("| Average | {} |", money(stats.mean_price, currency)));
            lines.push(format!("| Last Update | {} |", stats.date.format("%Y-%m-%d")));
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.extend(
        [
            "## About",
            "",
            "This index tracks prices of various products on OLX.ro to provide insights into market trends.",
            "",
            "**Metrics:**",
            "- **Count**: Number of active listings",
            "- **Min/Max**: Price range",
            "- **Median**: Middle price (robust to outliers)",
            "- **Average**: Mean price",
            "",
            "Data is collected daily via GitHub Actions.",
            "",
            "---",
            "",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    lines.push(format!(
        "*Generated automatically by [{}]({})*",
        report.generator_name, report.repository_url
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
