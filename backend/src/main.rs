//! Catalog import CLI - load a Shopify-style product CSV into the catalog
//!
//! # Main Commands
//!
//! ```bash
//! catalog-import products_export.csv        # Import into $DATABASE_URL
//! catalog-import serve                      # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! catalog-import group products_export.csv  # Print grouped products, no writes
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use catalog_import::{
    group_rows, ImportError, ImportOptions, ImportStats, Importer, RowReader, SqliteStore,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

#[derive(Parser)]
#[command(name = "catalog-import")]
#[command(about = "Import Shopify-style product CSV exports into the catalog", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    import: ImportArgs,
}

#[derive(clap::Args)]
struct ImportArgs {
    /// Input CSV file
    input: Option<PathBuf>,

    /// Catalog database URL (default: $DATABASE_URL or sqlite://catalog.db)
    #[arg(long)]
    database_url: Option<String>,

    /// Products materialized concurrently (default: $IMPORT_WORKERS or 4)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-call store timeout in seconds (default: $IMPORT_STORE_TIMEOUT_SECS or 30)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the import statistics as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Group a CSV by handle and print the products as JSON (no database writes)
    Group {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Catalog database URL (default: $DATABASE_URL or sqlite://catalog.db)
        #[arg(long)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing("info");

    let cli = Cli::parse();
    let options = ImportOptions::from_env();

    let result = match cli.command {
        Some(Commands::Group { input, output }) => cmd_group(&input, output.as_deref()),
        Some(Commands::Serve { port, database_url }) => cmd_serve(port, options, database_url).await,
        None => match cli.import.input.clone() {
            Some(input) => cmd_import(&input, options, cli.import).await,
            None => {
                eprintln!("error: missing <INPUT> CSV file (see --help)");
                std::process::exit(2);
            }
        },
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn cmd_import(input: &Path, options: ImportOptions, args: ImportArgs) -> Result<(), ImportError> {
    let mut options = options;
    if let Some(url) = args.database_url {
        options = options.with_database_url(url);
    }
    if let Some(workers) = args.workers {
        options = options.with_workers(workers);
    }
    if let Some(secs) = args.timeout_secs {
        options = options.with_store_timeout(Duration::from_secs(secs.max(1)));
    }

    let store = SqliteStore::connect(&options.database_url, options.workers as u32).await?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight products");
            on_ctrl_c.cancel();
        }
    });

    let stats = Importer::new(Arc::new(store), options)
        .with_cancellation(cancel)
        .import_path(input)
        .await?;

    print_summary(&stats);

    let json = serde_json::to_string_pretty(&stats)?;
    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            info!(path = %path.display(), "statistics written");
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn print_summary(stats: &ImportStats) {
    eprintln!("\nImport summary");
    eprintln!("   Rows:               {}", stats.total_rows);
    eprintln!("   Products created:   {}", stats.products_created);
    eprintln!("   Categories created: {}", stats.categories_created);
    eprintln!("   Images processed:   {}", stats.images_processed);
    if stats.partial_failures > 0 {
        eprintln!("   Partially created:  {}", stats.partial_failures);
    }
    if stats.cancelled {
        eprintln!("   Not attempted:      {}", stats.products_skipped);
    }
    eprintln!("   Errors:             {}", stats.errors.len());
    for failure in stats.errors.iter().take(10) {
        eprintln!("     - {}: {}", failure.product, failure.error);
    }
    if stats.errors.len() > 10 {
        eprintln!("     ... +{}", stats.errors.len() - 10);
    }
}

fn cmd_group(input: &Path, output: Option<&Path>) -> Result<(), ImportError> {
    info!(input = %input.display(), "grouping");

    let reader = RowReader::from_path(input)?;
    let catalog = group_rows(reader)?;
    info!(
        rows = catalog.total_rows,
        products = catalog.len(),
        skipped = catalog.skipped_rows,
        "grouped"
    );

    let json = serde_json::to_string_pretty(&catalog)?;
    match output {
        Some(p) => {
            fs::write(p, json)?;
            info!(path = %p.display(), "output written");
        }
        None => println!("{}", json),
    }

    Ok(())
}

async fn cmd_serve(port: u16, options: ImportOptions, database_url: Option<String>) -> Result<(), ImportError> {
    let options = match database_url {
        Some(url) => options.with_database_url(url),
        None => options,
    };
    let store = SqliteStore::connect(&options.database_url, options.workers as u32).await?;
    let importer = Importer::new(Arc::new(store), options);
    catalog_import::server::start_server(port, importer).await
}
