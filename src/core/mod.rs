pub mod charts;
pub mod etl;
pub mod history;
pub mod pipeline;
pub mod readme;
pub mod scraper;
pub mod stats;

pub use crate::domain::model::{DailyStats, Listing, Product, ProductSnapshot};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
