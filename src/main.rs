//! CLI entry point for the subway arrivals tool.
//!
//! Provides subcommands for projecting arrivals at a stop, computing
//! headway statistics, finding the nearest stations, resolving stop names,
//! and sampling headways periodically into a CSV.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use subway_arrivals::{
    cache::{FeedCache, HttpSnapshotProvider},
    fetch::{BasicClient, HttpClient, auth::ApiKey},
    output::{self, HeadwaySample},
    service::{ArrivalsService, ServiceError},
    stops::StopDirectory,
};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_FEED_URL: &str =
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs";
const DEFAULT_STOPS_PATH: &str = "data/stops.txt";
const FEED_TTL_SECS: u64 = 15;

#[derive(Parser)]
#[command(name = "subway_arrivals")]
#[command(about = "Project arrivals and headways from a realtime subway feed", long_about = None)]
struct Cli {
    /// Route allow-list, comma separated
    #[arg(long, global = true, value_delimiter = ',', default_values_t = ["7".to_string(), "7X".to_string()])]
    routes: Vec<String>,

    /// Print results as JSON instead of text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project upcoming arrivals at a stop
    Arrivals {
        /// Target stop id (directional platform id, e.g. 721S)
        #[arg(short, long, default_value = "721S")]
        stop_id: String,

        /// Look-ahead window in minutes (clamped to 5..=60)
        #[arg(long, default_value_t = 30)]
        horizon_min: i64,
    },
    /// Compute headway statistics for a stop
    Headway {
        /// Target stop id
        #[arg(short, long, default_value = "721S")]
        stop_id: String,

        /// Look-ahead window in minutes (clamped to 10..=90)
        #[arg(long, default_value_t = 45)]
        horizon_min: i64,
    },
    /// List the stations nearest to a coordinate
    Nearest {
        #[arg(long)]
        lat: f64,

        #[arg(long)]
        lon: f64,

        /// Number of stations to show (clamped to 1..=10)
        #[arg(short, long, default_value_t = 3)]
        limit: usize,
    },
    /// Resolve a stop id to its station record
    StopName {
        #[arg(value_name = "STOP_ID")]
        stop_id: String,
    },
    /// Sample headway statistics periodically and append them to a CSV
    Watch {
        /// Target stop id
        #[arg(short, long, default_value = "721S")]
        stop_id: String,

        /// Look-ahead window in minutes (clamped to 10..=90)
        #[arg(long, default_value_t = 45)]
        horizon_min: i64,

        /// Sample interval in seconds
        #[arg(short = 'r', long, default_value_t = 60)]
        sample_rate: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_samples: usize,

        /// CSV file to append samples to
        #[arg(short, long, default_value = "headway.csv")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/subway_arrivals.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("subway_arrivals.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let stops_path =
        std::env::var("STOPS_PATH").unwrap_or_else(|_| DEFAULT_STOPS_PATH.to_string());
    let stops = StopDirectory::load(&stops_path)?;

    // Nearest and stop-name need only the stop directory, not the feed
    match &cli.command {
        Commands::Nearest { lat, lon, limit } => {
            return run_nearest(&stops, *lat, *lon, *limit, cli.json);
        }
        Commands::StopName { stop_id } => {
            return run_stop_name(&stops, stop_id);
        }
        _ => {}
    }

    let service = build_service(stops)?;

    match cli.command {
        Commands::Arrivals {
            stop_id,
            horizon_min,
        } => {
            let horizon_min = horizon_min.clamp(5, 60);
            let now = Utc::now().timestamp();
            let view = service
                .get_arrivals(&stop_id, &cli.routes, horizon_min * 60, now)
                .await?;
            if cli.json {
                output::print_json(&view)?;
            } else {
                output::print_arrivals(&view, horizon_min);
            }
        }
        Commands::Headway {
            stop_id,
            horizon_min,
        } => {
            let horizon_min = horizon_min.clamp(10, 90);
            let now = Utc::now().timestamp();
            let view = service
                .get_headway_stats(&stop_id, &cli.routes, horizon_min * 60, now)
                .await?;
            if cli.json {
                output::print_json(&view)?;
            } else {
                output::print_headway(&view, horizon_min);
            }
        }
        Commands::Watch {
            stop_id,
            horizon_min,
            sample_rate,
            num_samples,
            output,
        } => {
            let horizon_min = horizon_min.clamp(10, 90);
            watch(
                &service,
                &stop_id,
                &cli.routes,
                horizon_min,
                sample_rate,
                num_samples,
                &output,
            )
            .await?;
        }
        Commands::Nearest { .. } | Commands::StopName { .. } => unreachable!(),
    }

    Ok(())
}

type Service = ArrivalsService<HttpSnapshotProvider<Box<dyn HttpClient>>>;

fn build_service(stops: StopDirectory) -> Result<Service> {
    let feed_url = std::env::var("FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());

    let client: Box<dyn HttpClient> = match std::env::var("FEED_API_KEY") {
        Ok(key) if !key.is_empty() => Box::new(ApiKey::x_api_key(BasicClient::new(), key)),
        _ => Box::new(BasicClient::new()),
    };

    let provider = HttpSnapshotProvider::new(client, feed_url);
    let cache = FeedCache::new(provider, Duration::from_secs(FEED_TTL_SECS));
    Ok(ArrivalsService::new(cache, stops))
}

fn run_nearest(stops: &StopDirectory, lat: f64, lon: f64, limit: usize, json: bool) -> Result<()> {
    let scored = stops.nearest(lat, lon, limit);
    if json {
        let items: Vec<serde_json::Value> = scored
            .iter()
            .map(|(s, dist)| {
                serde_json::json!({
                    "base_id": s.base_id,
                    "name": s.name,
                    "distance_m": dist.round(),
                    "variants": s.variants,
                })
            })
            .collect();
        output::print_json(&items)?;
        return Ok(());
    }

    println!("Nearest stations to {lat:.5}, {lon:.5}");
    if scored.is_empty() {
        println!("No stations with coordinates in the stop directory.");
    }
    for (station, dist) in scored {
        println!(
            "{:<28} {:>6} m  [{}]",
            station.name,
            dist.round(),
            station.variants.join(", ")
        );
    }
    Ok(())
}

fn run_stop_name(stops: &StopDirectory, stop_id: &str) -> Result<()> {
    match stops.lookup(stop_id) {
        Some(record) => output::print_json(&record)?,
        None => println!("null"),
    }
    Ok(())
}

/// Samples headway statistics at a fixed interval, appending one CSV row
/// per sample. Feed outages produce an error row instead of aborting the
/// loop.
async fn watch(
    service: &Service,
    stop_id: &str,
    routes: &[String],
    horizon_min: i64,
    sample_rate: u64,
    num_samples: usize,
    output_path: &str,
) -> Result<()> {
    if num_samples == 0 {
        info!(sample_rate, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sample collection");
    }

    let mut sample_count = 0;
    loop {
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        let now = Utc::now().timestamp();
        let sample = match service
            .get_headway_stats(stop_id, routes, horizon_min * 60, now)
            .await
        {
            Ok(view) => {
                info!(
                    sample = sample_count,
                    arrivals = view.rows.len(),
                    next = ?view.stats.next_headway_min,
                    "Headway sampled"
                );
                HeadwaySample::from_view(&view)
            }
            Err(err @ ServiceError::FeedUnavailable(_)) => {
                warn!(error = %err, "Sample skipped, feed unavailable");
                HeadwaySample::from_error(stop_id, &err.to_string())
            }
        };

        if let Err(e) = output::append_sample(output_path, &sample) {
            error!(error = %e, path = output_path, "Failed to append sample");
        }

        if num_samples == 0 || sample_count < num_samples {
            tokio::time::sleep(Duration::from_secs(sample_rate)).await;
        }
    }

    info!(output_path, "Finished sampling");
    Ok(())
}
