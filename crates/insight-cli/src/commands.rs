//! Command handlers for the CLI.

use std::io::Write;

use futures::StreamExt;
use insight_core::{AppConfig, ProductConfig, ProductsFile};
use insight_pipeline::{FragmentStream, IngestReport, ProductRef, Services};

fn load_catalog(config: &AppConfig) -> anyhow::Result<ProductsFile> {
    insight_core::load_products(&config.products_path).map_err(Into::into)
}

fn find_product(catalog: &ProductsFile, id: i64) -> anyhow::Result<ProductConfig> {
    catalog
        .get(id)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("product {id} not found in catalog"))
}

/// Comma-separated list of the sources a product is configured for.
pub(crate) fn configured_sources(product: &ProductConfig) -> String {
    let mut sources = Vec::new();
    if !product.youtube_keywords.is_empty() {
        sources.push("youtube");
    }
    if !product.reddit_subreddits.is_empty() {
        sources.push("reddit");
    }
    if product.google_search {
        sources.push("google");
    }
    if sources.is_empty() {
        "-".to_string()
    } else {
        sources.join(",")
    }
}

/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub(crate) fn run_products(config: &AppConfig) -> anyhow::Result<()> {
    let catalog = load_catalog(config)?;
    if catalog.products.is_empty() {
        println!(
            "no products configured in {}",
            config.products_path.display()
        );
        return Ok(());
    }

    println!("{:<8}{:<28}{:<36}SOURCES", "ID", "NAME", "QUERY");
    for product in &catalog.products {
        println!(
            "{:<8}{:<28}{:<36}{}",
            product.id,
            product.name,
            product.query(),
            configured_sources(product)
        );
    }
    Ok(())
}

pub(crate) fn format_report(report: &IngestReport) -> String {
    let list = |sources: &[insight_core::FeedbackSource]| {
        if sources.is_empty() {
            "none".to_string()
        } else {
            sources
                .iter()
                .copied()
                .map(insight_core::FeedbackSource::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    format!(
        "ingestion complete for product {}: {} found, {} stored, {} skipped in {} batches\n\
         empty sources: {}\n\
         failed sources: {}",
        report.product_id,
        report.items_found,
        report.items_stored,
        report.items_skipped,
        report.batches_committed,
        list(&report.empty_sources),
        list(&report.failed_sources),
    )
}

/// # Errors
///
/// Returns an error if the product is unknown, services cannot start, or a
/// store batch could not be committed.
pub(crate) async fn run_ingest(config: &AppConfig, product_id: i64, json: bool) -> anyhow::Result<()> {
    let product = find_product(&load_catalog(config)?, product_id)?;
    let services = Services::from_config(config).await?;

    let sources = services.collectors_for(&product);
    if sources.is_empty() {
        tracing::warn!(
            product_id,
            "no sources available (check catalog entries and credentials)"
        );
    }

    let report = services.ingestion().run(&product, &sources).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", format_report(&report));
    }
    Ok(())
}

async fn print_stream(mut stream: FragmentStream) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        stdout.write_all(fragment.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the product is unknown or services cannot start.
pub(crate) async fn run_ask(config: &AppConfig, product_id: i64, question: &str) -> anyhow::Result<()> {
    let product = find_product(&load_catalog(config)?, product_id)?;
    let engine = Services::from_config(config).await?.engine()?;
    print_stream(engine.answer(question, &ProductRef::from(&product))).await
}

/// # Errors
///
/// Returns an error if the product is unknown or services cannot start.
pub(crate) async fn run_report(config: &AppConfig, product_id: i64) -> anyhow::Result<()> {
    let product = find_product(&load_catalog(config)?, product_id)?;
    let engine = Services::from_config(config).await?.engine()?;
    println!("# Feedback report: {}\n", product.name);
    print_stream(engine.generate_report(&ProductRef::from(&product))).await
}
