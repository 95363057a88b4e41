pub use crate::app::pipelines::price_pipeline::PricePipeline;
