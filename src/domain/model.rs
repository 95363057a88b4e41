use crate::core::stats;
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "RON";

/// A tracked product, as configured in `products.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub slug: String,
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub emoji: String,
}

impl Product {
    pub fn history_file(&self, data_dir: &str) -> String {
        format!("{}/{}.csv", data_dir, self.slug)
    }

    pub fn dashboard_file(&self, images_dir: &str) -> String {
        format!("{}/{}_dashboard.svg", images_dir, self.slug)
    }

    /// `## 🪑 Name` heading text, without a stray space when there is no emoji.
    pub fn label(&self) -> String {
        if self.emoji.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.emoji, self.name)
        }
    }
}

/// One active offer on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: i64,
    pub currency: String,
    pub city: String,
    pub region: String,
}

/// Aggregated prices for one product on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub count: usize,
    #[serde(rename = "min")]
    pub min_price: i64,
    #[serde(rename = "max")]
    pub max_price: i64,
    #[serde(rename = "mean")]
    pub mean_price: f64,
    #[serde(rename = "median")]
    pub median_price: f64,
}

impl DailyStats {
    pub const CSV_HEADER: &'static str = "date,count,min,max,mean,median";

    pub fn from_prices(date: NaiveDate, prices: &[i64]) -> Result<Self> {
        if prices.is_empty() {
            return Err(EtlError::ProcessingError {
                message: "Cannot create stats from empty price list".to_string(),
            });
        }

        let mut sorted = prices.to_vec();
        sorted.sort_unstable();

        Ok(Self {
            date,
            count: sorted.len(),
            min_price: sorted[0],
            max_price: sorted[sorted.len() - 1],
            mean_price: stats::round2(stats::mean(&sorted)),
            median_price: stats::round2(stats::median_sorted(&sorted)),
        })
    }

    /// Internal consistency of a snapshot: a non-empty sample whose
    /// central values lie inside its range.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: String| {
            Err(EtlError::ValidationError {
                message: format!("{} snapshot: {}", self.date, message),
            })
        };

        if self.count == 0 {
            return fail("listing count is zero".to_string());
        }
        if self.min_price > self.max_price {
            return fail(format!("min {} > max {}", self.min_price, self.max_price));
        }

        let (min, max) = (self.min_price as f64, self.max_price as f64);
        if !(min..=max).contains(&self.median_price) {
            return fail(format!("median {} outside [{}, {}]", self.median_price, min, max));
        }
        if !(min..=max).contains(&self.mean_price) {
            return fail(format!("mean {} outside [{}, {}]", self.mean_price, min, max));
        }
        Ok(())
    }
}

/// What one README section shows for a product.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub product: Product,
    pub latest: Option<DailyStats>,
    pub dashboard_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_from_prices_odd_count() {
        let stats = DailyStats::from_prices(day(), &[3000, 1000, 2000]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_price, 1000);
        assert_eq!(stats.max_price, 3000);
        assert_eq!(stats.median_price, 2000.0);
        assert_eq!(stats.mean_price, 2000.0);
    }

    #[test]
    fn test_from_prices_even_count_and_rounding() {
        let stats = DailyStats::from_prices(day(), &[100, 200, 250, 101]).unwrap();
        assert_eq!(stats.median_price, 150.5);
        assert_eq!(stats.mean_price, 162.75);

        let stats = DailyStats::from_prices(day(), &[1, 1, 2]).unwrap();
        assert_eq!(stats.mean_price, 1.33);
    }

    #[test]
    fn test_from_prices_empty_is_error() {
        let err = DailyStats::from_prices(day(), &[]).unwrap_err();
        assert!(matches!(err, EtlError::ProcessingError { .. }));
    }

    #[test]
    fn test_validate_detects_inconsistent_snapshot() {
        let mut stats = DailyStats::from_prices(day(), &[500, 900, 4000]).unwrap();
        assert!(stats.validate().is_ok());

        stats.median_price = 5000.0;
        assert!(stats.validate().is_err());

        stats.median_price = 900.0;
        stats.count = 0;
        assert!(stats.validate().is_err());
    }

    #[test]
    fn test_product_paths_and_label() {
        let product = Product {
            slug: "aeron".to_string(),
            name: "Herman Miller Aeron".to_string(),
            query: "herman miller aeron".to_string(),
            emoji: String::new(),
        };
        assert_eq!(product.history_file("data"), "data/aeron.csv");
        assert_eq!(product.dashboard_file("images"), "images/aeron_dashboard.svg");
        assert_eq!(product.label(), "Herman Miller Aeron");
    }
}
