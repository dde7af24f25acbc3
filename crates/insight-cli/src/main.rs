mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "insight-cli")]
#[command(about = "Collect product feedback and ask questions about it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the products in the catalog
    Products,
    /// Scrape every configured source for a product and index the feedback
    Ingest {
        /// Product scope ID from the catalog
        #[arg(long)]
        product: i64,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask a question about a product; the answer streams as it is generated
    Ask {
        #[arg(long)]
        product: i64,

        question: String,
    },
    /// Run the fixed report battery (summary, pros, cons, feature requests)
    Report {
        #[arg(long)]
        product: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = insight_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout carries answers; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Products) => commands::run_products(&config)?,
        Some(Commands::Ingest { product, json }) => {
            commands::run_ingest(&config, product, json).await?;
        }
        Some(Commands::Ask { product, question }) => {
            commands::run_ask(&config, product, &question).await?;
        }
        Some(Commands::Report { product }) => commands::run_report(&config, product).await?,
        None => println!("insight-cli: run with --help to see available commands"),
    }

    Ok(())
}
