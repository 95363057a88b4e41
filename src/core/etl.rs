use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

/// What happened to each product during one run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
    pub empty: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub report_path: Option<String>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

enum ProductOutcome {
    Updated,
    Skipped,
    Empty,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    async fn run_product(&self, product: &crate::core::Product) -> Result<ProductOutcome> {
        if self.pipeline.is_up_to_date(product).await? {
            tracing::info!("⏭️ Skipping {} - already updated today", product.name);
            return Ok(ProductOutcome::Skipped);
        }

        let listings = self.pipeline.extract(product).await?;
        self.monitor.log_stats(&format!("extract {}", product.slug));
        if listings.is_empty() {
            tracing::warn!("No listings found for {}", product.name);
            return Ok(ProductOutcome::Empty);
        }

        let stats = self.pipeline.transform(product, listings).await?;
        self.pipeline.load(product, stats).await?;
        Ok(ProductOutcome::Updated)
    }

    /// Update every product, then publish the report.
    ///
    /// A failing product is recorded in the summary and does not stop the
    /// others; publishing errors are returned.
    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting price index update");
        let mut summary = RunSummary::default();

        for product in self.pipeline.products() {
            tracing::info!("Processing: {}", product.name);

            match self.run_product(product).await {
                Ok(ProductOutcome::Updated) => summary.updated.push(product.slug.clone()),
                Ok(ProductOutcome::Skipped) => summary.skipped.push(product.slug.clone()),
                Ok(ProductOutcome::Empty) => summary.empty.push(product.slug.clone()),
                Err(e) => {
                    tracing::error!(
                        "❌ {} failed: {} (Category: {:?}, Severity: {:?})",
                        product.slug,
                        e,
                        e.category(),
                        e.severity()
                    );
                    summary.failed.push((product.slug.clone(), e.to_string()));
                }
            }
        }

        summary.report_path = Some(self.publish_only().await?);

        tracing::info!(
            "✅ Update complete: {} updated, {} skipped, {} empty, {} failed",
            summary.updated.len(),
            summary.skipped.len(),
            summary.empty.len(),
            summary.failed.len()
        );
        self.monitor.log_final_stats();
        Ok(summary)
    }

    /// Re-render charts and README from stored history only.
    pub async fn publish_only(&self) -> Result<String> {
        let path = self.pipeline.publish().await?;
        self.monitor.log_stats("publish");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DailyStats, Listing, Product};
    use crate::utils::error::EtlError;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct MockPipeline {
        products: Vec<Product>,
        up_to_date: Vec<&'static str>,
        failing: Vec<&'static str>,
        empty: Vec<&'static str>,
        loaded: Mutex<Vec<String>>,
        published: Mutex<usize>,
    }

    impl MockPipeline {
        fn new(slugs: &[&str]) -> Self {
            Self {
                products: slugs
                    .iter()
                    .map(|s| Product {
                        slug: s.to_string(),
                        name: s.to_uppercase(),
                        query: s.to_string(),
                        emoji: String::new(),
                    })
                    .collect(),
                up_to_date: Vec::new(),
                failing: Vec::new(),
                empty: Vec::new(),
                loaded: Mutex::new(Vec::new()),
                published: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Pipeline for MockPipeline {
        fn products(&self) -> &[Product] {
            &self.products
        }

        async fn is_up_to_date(&self, product: &Product) -> Result<bool> {
            Ok(self.up_to_date.contains(&product.slug.as_str()))
        }

        async fn extract(&self, product: &Product) -> Result<Vec<Listing>> {
            if self.failing.contains(&product.slug.as_str()) {
                return Err(EtlError::HttpStatus {
                    status: 503,
                    url: "mock".to_string(),
                });
            }
            if self.empty.contains(&product.slug.as_str()) {
                return Ok(Vec::new());
            }
            Ok(vec![Listing {
                id: "1".to_string(),
                title: "x".to_string(),
                price: 100,
                currency: "RON".to_string(),
                city: String::new(),
                region: String::new(),
            }])
        }

        async fn transform(&self, _product: &Product, listings: Vec<Listing>) -> Result<DailyStats> {
            let prices: Vec<i64> = listings.iter().map(|l| l.price).collect();
            DailyStats::from_prices(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &prices)
        }

        async fn load(&self, product: &Product, _stats: DailyStats) -> Result<String> {
            self.loaded.lock().unwrap().push(product.slug.clone());
            Ok(format!("data/{}.csv", product.slug))
        }

        async fn publish(&self) -> Result<String> {
            *self.published.lock().unwrap() += 1;
            Ok("README.md".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_classifies_products() {
        let mut pipeline = MockPipeline::new(&["a", "b", "c", "d"]);
        pipeline.up_to_date = vec!["b"];
        pipeline.failing = vec!["c"];
        pipeline.empty = vec!["d"];

        let engine = EtlEngine::new(pipeline);
        let summary = engine.run().await.unwrap();

        assert_eq!(summary.updated, vec!["a"]);
        assert_eq!(summary.skipped, vec!["b"]);
        assert_eq!(summary.empty, vec!["d"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "c");
        assert!(summary.has_failures());
        assert_eq!(summary.report_path.as_deref(), Some("README.md"));

        assert_eq!(*engine.pipeline().loaded.lock().unwrap(), vec!["a"]);
        assert_eq!(*engine.pipeline().published.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_publish_only_does_not_fetch() {
        let engine = EtlEngine::new(MockPipeline::new(&["a"]));
        let path = engine.publish_only().await.unwrap();

        assert_eq!(path, "README.md");
        assert!(engine.pipeline().loaded.lock().unwrap().is_empty());
    }
}
