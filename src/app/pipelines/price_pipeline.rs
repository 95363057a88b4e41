use crate::core::charts;
use crate::core::history::{self, PriceHistory};
use crate::core::readme;
use crate::core::scraper::OlxClient;
use crate::core::{ConfigProvider, DailyStats, Listing, Pipeline, Product, ProductSnapshot, Storage};
use crate::utils::error::Result;
use chrono::{Local, NaiveDate};

/// Price index pipeline: OLX search → daily stats → CSV history → charts + README.
pub struct PricePipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) client: OlxClient,
    pub(crate) today: NaiveDate,
    pub(crate) force: bool,
}

impl<S: Storage, C: ConfigProvider> PricePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let client = OlxClient::new(config.source().clone())?;
        Ok(Self {
            storage,
            config,
            client,
            today: Local::now().date_naive(),
            force: false,
        })
    }

    /// Record the snapshot under another observation date.
    pub fn with_date(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Refetch even when the history already has a row for today.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    fn history_path(&self, product: &Product) -> String {
        product.history_file(&self.config.output().data_dir)
    }

    async fn load_history(&self, product: &Product) -> Result<PriceHistory> {
        let path = self.history_path(product);
        if !self.storage.exists(&path).await {
            return Ok(PriceHistory::default());
        }
        let data = self.storage.read_file(&path).await?;
        PriceHistory::parse(&data)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for PricePipeline<S, C> {
    fn products(&self) -> &[Product] {
        self.config.products()
    }

    async fn is_up_to_date(&self, product: &Product) -> Result<bool> {
        if self.force {
            return Ok(false);
        }
        let history = self.load_history(product).await?;
        let done = history.contains(self.today);
        if done {
            tracing::info!(
                "Data for {} already exists in {}",
                self.today,
                self.history_path(product)
            );
        }
        Ok(done)
    }

    async fn extract(&self, product: &Product) -> Result<Vec<Listing>> {
        self.client.fetch_all(product).await
    }

    async fn transform(&self, product: &Product, listings: Vec<Listing>) -> Result<DailyStats> {
        let prices: Vec<i64> = listings.iter().map(|l| l.price).collect();
        let stats = DailyStats::from_prices(self.today, &prices)?;
        stats.validate()?;

        tracing::info!(
            "📊 {} stats: count={}, min={}, max={}, median={}",
            product.slug,
            stats.count,
            stats.min_price,
            stats.max_price,
            stats.median_price
        );
        Ok(stats)
    }

    async fn load(&self, product: &Product, stats: DailyStats) -> Result<String> {
        let path = self.history_path(product);

        let existing = if self.storage.exists(&path).await {
            self.storage.read_file(&path).await?
        } else {
            Vec::new()
        };

        // 手動編輯過的檔案可能缺少結尾換行
        let mut row = Vec::new();
        if existing.last().is_some_and(|byte| *byte != b'\n') {
            row.push(b'\n');
        }
        // 檔案不存在或為空時才寫入標頭
        row.extend(history::append_row(&stats, existing.is_empty())?);
        self.storage.append_file(&path, &row).await?;

        tracing::info!("💾 Appended stats to {}", path);
        Ok(path)
    }

    async fn publish(&self) -> Result<String> {
        let output = self.config.output();
        let report = self.config.report();
        let currency = report.currency.as_str();

        let mut histories = Vec::with_capacity(self.config.products().len());
        for product in self.config.products() {
            let history = match self.load_history(product).await {
                Ok(history) => history,
                Err(e) => {
                    tracing::error!("❌ Unreadable history for {}: {}", product.slug, e);
                    PriceHistory::default()
                }
            };
            histories.push(history);
        }

        let mut snapshots = Vec::with_capacity(histories.len());
        for (product, history) in self.config.products().iter().zip(&histories) {
            let dashboard = product.dashboard_file(&output.images_dir);

            if history.is_empty() {
                tracing::warn!("No data for {}, skipping chart", product.name);
            } else {
                let svg = charts::render_dashboard(product, history, self.today, currency)?;
                self.storage.write_file(&dashboard, svg.as_bytes()).await?;
                tracing::info!("Dashboard saved to {}", dashboard);
            }

            snapshots.push(ProductSnapshot {
                product: product.clone(),
                latest: history.latest().cloned(),
                dashboard_url: readme::image_url(report, &dashboard, self.today),
            });
        }

        let overview = format!("{}/overview.svg", output.images_dir);
        let series: Vec<(&Product, &PriceHistory)> =
            self.config.products().iter().zip(histories.iter()).collect();
        let svg = charts::render_overview(&report.title, &series, currency)?;
        self.storage.write_file(&overview, svg.as_bytes()).await?;
        tracing::info!("Overview saved to {}", overview);

        let overview_url = readme::image_url(report, &overview, self.today);
        let content = readme::render_readme(report, &overview_url, &snapshots);
        self.storage
            .write_file(&output.readme, content.as_bytes())
            .await?;

        tracing::info!("Generated {}", output.readme);
        Ok(output.readme.clone())
    }
}
