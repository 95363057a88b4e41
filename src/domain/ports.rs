use crate::config::toml_config::{OutputConfig, ReportConfig, SourceConfig};
use crate::domain::model::{DailyStats, Listing, Product};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn append_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source(&self) -> &SourceConfig;
    fn output(&self) -> &OutputConfig;
    fn report(&self) -> &ReportConfig;
    fn products(&self) -> &[Product];
}

/// One tracked product flows through extract → transform → load;
/// `publish` renders the shared report once all products are done.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn products(&self) -> &[Product];
    async fn is_up_to_date(&self, product: &Product) -> Result<bool>;
    async fn extract(&self, product: &Product) -> Result<Vec<Listing>>;
    async fn transform(&self, product: &Product, listings: Vec<Listing>) -> Result<DailyStats>;
    async fn load(&self, product: &Product, stats: DailyStats) -> Result<String>;
    async fn publish(&self) -> Result<String>;
}
