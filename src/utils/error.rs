use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Rate limited by marketplace after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("Marketplace API error: {code} - {detail}")]
    GraphQlError { code: String, detail: String },

    #[error("Chart rendering error: {message}")]
    ChartError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_)
            | EtlError::HttpStatus { .. }
            | EtlError::RateLimited { .. }
            | EtlError::GraphQlError { .. } => ErrorCategory::Network,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ChartError { .. }
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Data,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路問題通常下次排程就會恢復
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::RateLimited { .. } => {
                "Wait a while before the next run or raise source.rate_limit_wait_seconds"
            }
            EtlError::HttpStatus { .. } | EtlError::ApiError(_) => {
                "Check network connectivity and that source.endpoint is reachable"
            }
            EtlError::GraphQlError { .. } => {
                "The marketplace rejected the search; check the product query"
            }
            EtlError::CsvError(_) => "Inspect the product history CSV for malformed rows",
            EtlError::ChartError { .. } => "Check that the images directory is writable",
            EtlError::IoError(_) => "Check file permissions and available disk space",
            EtlError::SerializationError(_) => {
                "The marketplace response format may have changed"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix products.toml and run again",
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                "Run with --verbose to inspect the collected listings"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not fetch listings: {}", self),
            ErrorCategory::Data => format!("Could not process price data: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
