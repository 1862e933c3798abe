//! Presentation and persistence plumbing: text tables, JSON, and CSV
//! append of periodic headway samples.

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::debug;

use crate::service::{ArrivalsView, HeadwayView};

/// How many upcoming arrivals the headway listing shows.
const HEADWAY_LIST_CAP: usize = 12;

/// One watch-mode sample row appended to CSV.
#[derive(Debug, Default, Serialize)]
pub struct HeadwaySample {
    pub timestamp: DateTime<Utc>,
    pub stop_id: String,
    pub arrivals_in_window: usize,
    pub next_headway_min: Option<f64>,
    pub mean_headway_min: Option<f64>,
    pub median_headway_min: Option<f64>,
    pub feed_age_secs: Option<i64>,
    pub error: Option<String>,
}

impl HeadwaySample {
    pub fn from_view(view: &HeadwayView) -> Self {
        HeadwaySample {
            timestamp: Utc::now(),
            stop_id: view.stop_id.clone(),
            arrivals_in_window: view.rows.len(),
            next_headway_min: view.stats.next_headway_min,
            mean_headway_min: view.stats.mean_headway_min,
            median_headway_min: view.stats.median_headway_min,
            feed_age_secs: Some(view.feed_age_secs),
            error: None,
        }
    }

    pub fn from_error(stop_id: &str, message: &str) -> Self {
        HeadwaySample {
            timestamp: Utc::now(),
            stop_id: stop_id.to_string(),
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

/// Appends a [`HeadwaySample`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_sample(path: &str, sample: &HeadwaySample) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(sample)?;
    writer.flush()?;

    Ok(())
}

/// Prints an arrivals view as an aligned text table.
pub fn print_arrivals(view: &ArrivalsView, horizon_min: i64) {
    println!("Arrivals — {} ({})", view.stop_label, view.stop_id);
    println!(
        "Feed ts {} • Source age {}s • Window {} min",
        view.header_epoch_sec.map(clock).unwrap_or_else(|| "—".to_string()),
        view.feed_age_secs,
        horizon_min
    );

    if view.rows.is_empty() {
        println!(
            "No arrivals to {} within {} minutes.",
            view.stop_id, horizon_min
        );
        return;
    }

    println!(
        "{:<6} {:<28} {:<34} {:>7}  {:<9} {}",
        "Route", "Trip", "Where now", "ETA", "Clock", "Status"
    );
    for row in &view.rows {
        println!(
            "{:<6} {:<28} {:<34} {:>4} min  {:<9} {}",
            row.route_id,
            row.trip_id,
            row.position_description,
            eta_min(row.eta_secs),
            clock(row.arrival_epoch_sec),
            row.status_text
        );
    }
}

/// Prints a headway view: the statistics followed by the next arrivals.
pub fn print_headway(view: &HeadwayView, horizon_min: i64) {
    println!("Headway — {} ({})", view.stop_label, view.stop_id);
    println!(
        "Feed ts {} • Source age {}s • Window {} min",
        view.header_epoch_sec.map(clock).unwrap_or_else(|| "—".to_string()),
        view.feed_age_secs,
        horizon_min
    );
    println!("Next headway:   {}", fmt_minutes(view.stats.next_headway_min));
    println!("Mean headway:   {}", fmt_minutes(view.stats.mean_headway_min));
    println!("Median headway: {}", fmt_minutes(view.stats.median_headway_min));

    if view.rows.is_empty() {
        println!("No arrivals within {} min.", horizon_min);
        return;
    }

    println!("Next arrivals:");
    for row in view.rows.iter().take(HEADWAY_LIST_CAP) {
        println!(
            "  {} — {} ({} min)",
            row.route_id,
            clock(row.arrival_epoch_sec),
            eta_min(row.eta_secs)
        );
    }
}

/// Prints any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn clock(epoch_sec: i64) -> String {
    match Local.timestamp_opt(epoch_sec, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%H:%M:%S").to_string(),
        _ => "—".to_string(),
    }
}

fn fmt_minutes(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1} min"),
        None => "—".to_string(),
    }
}

fn eta_min(eta_secs: i64) -> i64 {
    ((eta_secs as f64 / 60.0).round() as i64).max(0)
}
