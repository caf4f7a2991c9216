use clap::Parser;
use tracing::{error, info};

use nyc_dataprep::app::clean_use_case::{CleanParams, CleanUseCase};
use nyc_dataprep::app::ports::{ArtifactStorePort, RunLogPort};
use nyc_dataprep::config::Config;
use nyc_dataprep::infra::fs_store::{FsArtifactStore, FsRunLog};
use nyc_dataprep::infra::http_store::{HttpArtifactStore, HttpRunLog};
use nyc_dataprep::logging;

/// Basic cleaning step: fetch a raw dataset artifact, drop price outliers,
/// coerce review dates, and publish the result as a new artifact version.
#[derive(Parser)]
#[command(name = "nyc_dataprep")]
#[command(about = "Data-cleaning stage of the NYC short-term-rental dataset release pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    /// Fully qualified input artifact to clean, e.g. 'sample.csv:latest'
    #[arg(long = "input_artifact")]
    input_artifact: String,

    /// Name for the cleaned CSV artifact to create, e.g. 'clean_sample.csv'
    #[arg(long = "output_artifact")]
    output_artifact: String,

    /// Artifact type for the cleaned data, e.g. 'clean_sample'
    #[arg(long = "output_type")]
    output_type: String,

    /// Short description of the cleaned artifact contents
    #[arg(long = "output_description")]
    output_description: String,

    /// Minimum nightly price to keep (inclusive)
    #[arg(long = "min_price")]
    min_price: f64,

    /// Maximum nightly price to keep (inclusive)
    #[arg(long = "max_price")]
    max_price: f64,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let (store, run_log): (Box<dyn ArtifactStorePort>, Box<dyn RunLogPort>) =
        match &config.store.remote_url {
            Some(url) => {
                info!(remote = %url, "using remote artifact store");
                (
                    Box::new(HttpArtifactStore::new(url, "downloads")) as Box<dyn ArtifactStorePort>,
                    Box::new(HttpRunLog::new(url)) as Box<dyn RunLogPort>,
                )
            }
            None => {
                info!(data_root = %config.store.data_root, "using local artifact store");
                (
                    Box::new(FsArtifactStore::new(&config.store.data_root)) as Box<dyn ArtifactStorePort>,
                    Box::new(FsRunLog::new(&config.store.data_root)) as Box<dyn RunLogPort>,
                )
            }
        };

    let use_case = CleanUseCase::new(store, run_log, config.tracking.clone());
    let params = CleanParams {
        input_artifact: cli.input_artifact,
        output_artifact: cli.output_artifact,
        output_type: cli.output_type,
        output_description: cli.output_description,
        min_price: cli.min_price,
        max_price: cli.max_price,
    };

    match use_case.run(params).await {
        Ok(summary) => {
            info!(output = %summary.output_ref, "cleaning run finished");
            println!("\n📊 Cleaning Results:");
            println!("   Input artifact: {}", summary.input_ref);
            println!("   Rows in: {}", summary.stats.rows_in);
            println!("   Rows kept: {}", summary.stats.rows_kept);
            println!("   Rows dropped: {}", summary.stats.rows_dropped());
            println!("   Dates coerced: {}", summary.stats.dates_coerced);
            println!("   Dates set to missing: {}", summary.stats.dates_missing);
            println!("   Staged file: {}", summary.staged_file);
            println!("   Published: {}", summary.output_ref);
        }
        Err(e) => {
            error!("Cleaning run failed: {}", e);
            eprintln!("❌ Cleaning run failed: {}", e);
            std::process::exit(1);
        }
    }
}
