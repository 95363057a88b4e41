use clap::Parser;
use olx_price_index::core::Pipeline;
use olx_price_index::utils::error::{EtlError, ErrorSeverity};
use olx_price_index::utils::{logger, validation::Validate};
use olx_price_index::{CliConfig, EtlEngine, IndexConfig, LocalStorage, PricePipeline};
use std::path::Path;

fn exit_code(e: &EtlError) -> i32 {
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ Price index update failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(exit_code(e).max(1));
}

fn display_config_summary(config: &IndexConfig, args: &CliConfig) {
    println!("📋 Configuration Summary:");
    println!("  Report: {}", config.report.title);
    println!("  Source: {}", config.source.endpoint);
    println!("  Root: {}", args.root);
    println!(
        "  Output: {}, {}, {}",
        config.output.data_dir, config.output.images_dir, config.output.readme
    );
    println!(
        "  Paging: {} per page, {} ms between pages",
        config.source.page_size, config.source.request_delay_ms
    );
    if let Some(max) = config.source.max_listings {
        println!("  Max listings: {}", max);
    }
    println!("  Products:");
    for product in &config.products {
        println!("    {} [{}] query=\"{}\"", product.label(), product.slug, product.query);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliConfig::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting olx-price-index");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config_path = Path::new(&args.root).join(&args.config);
    let config_path = if Path::new(&args.config).is_absolute() || !config_path.exists() {
        Path::new(&args.config).to_path_buf()
    } else {
        config_path
    };
    tracing::info!("📁 Loading configuration from: {}", config_path.display());

    let config = match IndexConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    if let Err(e) = config.validate() {
        fail(&e);
    }
    tracing::info!("✅ Configuration loaded and validated successfully");

    if args.dry_run {
        display_config_summary(&config, &args);
        println!("🔍 DRY RUN MODE - nothing fetched or written");
        return Ok(());
    }

    let storage = LocalStorage::new(args.root.clone());
    let mut pipeline = match PricePipeline::new(storage, config) {
        Ok(pipeline) => pipeline.with_force(args.force),
        Err(e) => fail(&e),
    };
    if let Some(date) = args.date {
        pipeline = pipeline.with_date(date);
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    let engine = EtlEngine::new_with_monitoring(pipeline, args.monitor);

    if args.readme_only {
        match engine.publish_only().await {
            Ok(path) => {
                println!("✅ Report regenerated: {}", path);
                return Ok(());
            }
            Err(e) => fail(&e),
        }
    }

    if engine.pipeline().products().is_empty() {
        tracing::warn!("No products configured, exiting");
        return Ok(());
    }

    match engine.run().await {
        Ok(summary) => {
            println!(
                "✅ Updated: {} | Skipped: {} | No listings: {} | Failed: {}",
                summary.updated.len(),
                summary.skipped.len(),
                summary.empty.len(),
                summary.failed.len()
            );
            if let Some(path) = &summary.report_path {
                println!("📁 Report saved to: {}", path);
            }
            if summary.has_failures() {
                for (slug, message) in &summary.failed {
                    eprintln!("❌ {}: {}", slug, message);
                }
                std::process::exit(2);
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}
