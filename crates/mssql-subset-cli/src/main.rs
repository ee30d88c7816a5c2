//! mssql-subset CLI - export a connected subset of SQL Server rows as an INSERT script.

use clap::{Parser, Subcommand};
use mssql_subset::{
    Config, ExportEngine, ExportError, ExportOutcome, ExportRequest, MetadataProvider, MssqlProvider,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-subset")]
#[command(about = "Export a foreign-key connected subset of SQL Server rows as a re-keyed INSERT script")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// ADO.NET connection string (overrides the configuration file)
    #[arg(long)]
    connection_string: Option<String>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a row and everything the profile reaches from it
    Export {
        /// File the INSERT script is written to
        #[arg(long)]
        export_to: PathBuf,

        /// Export profile (JSON); created from the database schema if missing
        #[arg(long)]
        profile: PathBuf,

        /// Primary key value of the entry row
        #[arg(long)]
        id: String,

        /// Replace JPEG content with a small placeholder image
        #[arg(long)]
        dummy_files: bool,
    },

    /// Check database connectivity
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ExportError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(ExportError::Config)?;

    let config = match &cli.connection_string {
        Some(cs) => Config::from_connection_string(cs)?,
        None => {
            let config = Config::load(&cli.config)?;
            info!("Loaded configuration from {:?}", cli.config);
            config
        }
    };

    match cli.command {
        Commands::Export {
            export_to,
            profile,
            id,
            dummy_files,
        } => {
            let request = ExportRequest {
                output_path: export_to,
                profile_path: profile,
                entry_point_id: id,
                dummy_files: dummy_files || config.export.dummy_files,
            };

            let provider = MssqlProvider::new(config.source).await?;
            let engine = ExportEngine::new(provider);
            let outcome = engine.export(&request).await?;
            drop(engine);

            if cli.output_json {
                println!("{}", outcome.to_json()?);
                return Ok(());
            }

            match outcome {
                ExportOutcome::NeedsConfiguration {
                    profile_path,
                    tables,
                    foreign_keys,
                } => {
                    println!("Created new profile {}", profile_path.display());
                    println!("  Tables: {}", tables);
                    println!("  Foreign keys: {}", foreign_keys);
                    println!(
                        "\nEdit the profile (set IsEntryPoint, Export and GoToParent), then run the export again."
                    );
                }
                ExportOutcome::Completed(summary) => {
                    println!("\nExport completed!");
                    println!("  Output: {}", summary.output_path.display());
                    println!("  Duration: {:.2}s", summary.duration_seconds);
                    println!("  Rows: {}", summary.rows_exported);
                    println!("  Variables: {}", summary.variables_declared);
                    if summary.unresolved_rows > 0 {
                        println!(
                            "  Unresolved: {} (see '-- Warning' comments in the script)",
                            summary.unresolved_rows
                        );
                    }
                }
            }
        }

        Commands::HealthCheck => {
            let started = Instant::now();
            let provider = MssqlProvider::new(config.source).await?;
            provider.test_connection().await?;
            let latency_ms = started.elapsed().as_millis() as u64;

            if cli.output_json {
                let result = serde_json::json!({
                    "source_connected": true,
                    "source_latency_ms": latency_ms,
                    "db_type": provider.db_type(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!("  Source (MSSQL): OK ({}ms)", latency_ms);
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format '{}'", other)),
    }

    Ok(())
}
