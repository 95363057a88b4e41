use crate::core::ConfigProvider;
use crate::domain::model::{Product, DEFAULT_CURRENCY};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const OLX_GRAPHQL_URL: &str = "https://www.olx.ro/apigateway/graphql";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Contents of `products.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub description: String,
    /// Prefix for image links; raw file host of the published repository.
    pub base_url: String,
    pub repository_url: String,
    pub generator_name: String,
    pub currency: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "OLX Price Index".to_string(),
            description:
                "Daily price tracking for products on OLX.ro as a proxy for economic indicators."
                    .to_string(),
            base_url: "https://raw.githubusercontent.com/FlorinPopaCodes/aeron-miller-index/main"
                .to_string(),
            repository_url: "https://github.com/FlorinPopaCodes/aeron-miller-index".to_string(),
            generator_name: "Aeron Miller Index".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub rate_limit_wait_seconds: u64,
    pub request_delay_ms: u64,
    pub page_size: usize,
    pub user_agent: String,
    pub max_listings: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: OLX_GRAPHQL_URL.to_string(),
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            rate_limit_wait_seconds: 60,
            request_delay_ms: 500,
            page_size: 50,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_listings: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub data_dir: String,
    pub images_dir: String,
    pub readme: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            images_dir: "images".to_string(),
            readme: "README.md".to_string(),
        }
    }
}

impl IndexConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(&path).map_err(|e| EtlError::ConfigError {
                message: format!("cannot read {}: {}", path.as_ref().display(), e),
            })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded {} products from config", config.products.len());
        Ok(config)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OLX_ENDPOINT})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env regex"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("source.endpoint", &self.source.endpoint)?;
        validation::validate_url("report.base_url", &self.report.base_url)?;
        validation::validate_range("source.page_size", self.source.page_size, 1, 1000)?;
        validation::validate_positive_number(
            "source.retry_attempts",
            self.source.retry_attempts as usize,
            1,
        )?;
        validation::validate_non_empty_string("report.currency", &self.report.currency)?;

        validation::validate_path("output.data_dir", &self.output.data_dir)?;
        validation::validate_path("output.images_dir", &self.output.images_dir)?;
        validation::validate_path("output.readme", &self.output.readme)?;

        if self.products.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "products".to_string(),
            });
        }

        for product in &self.products {
            validation::validate_slug("products.slug", &product.slug)?;
            validation::validate_non_empty_string("products.name", &product.name)?;
            validation::validate_non_empty_string("products.query", &product.query)?;
        }
        validation::validate_unique(
            "products.slug",
            self.products.iter().map(|p| p.slug.as_str()),
        )?;

        Ok(())
    }
}

impl ConfigProvider for IndexConfig {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    fn output(&self) -> &OutputConfig {
        &self.output
    }

    fn report(&self) -> &ReportConfig {
        &self.report
    }

    fn products(&self) -> &[Product] {
        &self.products
    }
}

impl Validate for IndexConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
