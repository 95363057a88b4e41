pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::cli::LocalStorage;
pub use config::toml_config::IndexConfig;
pub use core::{
    etl::{EtlEngine, RunSummary},
    pipeline::PricePipeline,
};
pub use utils::error::{EtlError, Result};
