//! Station reference data loaded from a GTFS `stops.txt`.
//!
//! Loaded once at startup and kept for the process lifetime; schedule
//! reference data changes rarely enough that staleness is acceptable.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One station row from the reference data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A base station with its directional platform ids, for the
/// nearest-station listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub base_id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub variants: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StopRow {
    stop_id: String,
    stop_name: Option<String>,
    stop_lat: Option<f64>,
    stop_lon: Option<f64>,
}

/// In-memory map of station records keyed by upper-cased stop id.
#[derive(Debug, Default)]
pub struct StopDirectory {
    by_id: HashMap<String, StationRecord>,
}

impl StopDirectory {
    /// Loads `stops.txt` from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening stops file {}", path.display()))?;
        let dir = Self::from_reader(file)?;
        debug!(stops = dir.by_id.len(), path = %path.display(), "Stop directory loaded");
        Ok(dir)
    }

    /// Parses GTFS stops CSV from any reader. Unknown columns are ignored;
    /// rows without a stop id are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut by_id = HashMap::new();
        for row in csv_reader.deserialize::<StopRow>() {
            let row = row.context("reading stops.txt row")?;
            if row.stop_id.is_empty() {
                continue;
            }
            let id = row.stop_id.to_uppercase();
            by_id.insert(
                id.clone(),
                StationRecord {
                    id: row.stop_id,
                    name: row.stop_name.unwrap_or_else(|| id.clone()),
                    lat: row.stop_lat,
                    lon: row.stop_lon,
                },
            );
        }
        Ok(StopDirectory { by_id })
    }

    /// Looks up a stop id, exact match first, then falling back from a
    /// directional platform id (trailing N/S/E/W) to its base station.
    /// The returned record keeps the id that was asked for.
    pub fn lookup(&self, stop_id: &str) -> Option<StationRecord> {
        if stop_id.is_empty() {
            return None;
        }
        let key = stop_id.to_uppercase();
        if let Some(rec) = self.by_id.get(&key) {
            return Some(rec.clone());
        }

        if let Some(base) = key.strip_suffix(['N', 'S', 'E', 'W']) {
            if !base.is_empty() {
                if let Some(rec) = self.by_id.get(base) {
                    let mut rec = rec.clone();
                    rec.id = key;
                    return Some(rec);
                }
            }
        }
        None
    }

    /// Display label for an optional stop id: the station name when known,
    /// the raw id on a lookup miss, an em-dash placeholder when absent.
    pub fn label(&self, stop_id: Option<&str>) -> String {
        match stop_id {
            None | Some("") => "—".to_string(),
            Some(id) => match self.lookup(id) {
                Some(rec) => rec.name,
                None => id.to_string(),
            },
        }
    }

    /// Base stations (ids without a directional suffix) that carry
    /// coordinates, with their directional platform variants attached.
    pub fn list_stations(&self) -> Vec<Station> {
        let mut stations: Vec<Station> = self
            .by_id
            .values()
            .filter(|rec| !has_direction_suffix(&rec.id))
            .filter_map(|rec| {
                let (lat, lon) = (rec.lat?, rec.lon?);
                let base = rec.id.to_uppercase();
                let variants = ["N", "S", "E", "W"]
                    .iter()
                    .map(|d| format!("{base}{d}"))
                    .filter(|v| self.by_id.contains_key(v))
                    .collect();
                Some(Station {
                    base_id: rec.id.clone(),
                    name: rec.name.clone(),
                    lat,
                    lon,
                    variants,
                })
            })
            .collect();
        stations.sort_by(|a, b| a.base_id.cmp(&b.base_id));
        stations
    }

    /// Stations sorted by haversine distance in meters from a point,
    /// truncated to `limit` (clamped to 1..=10).
    pub fn nearest(&self, lat: f64, lon: f64, limit: usize) -> Vec<(Station, f64)> {
        let limit = limit.clamp(1, 10);
        let mut scored: Vec<(Station, f64)> = self
            .list_stations()
            .into_iter()
            .map(|s| {
                let dist = haversine_m(lat, lon, s.lat, s.lon);
                (s, dist)
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(limit);
        scored
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn has_direction_suffix(id: &str) -> bool {
    id.len() > 1
        && matches!(
            id.chars().next_back(),
            Some('N') | Some('S') | Some('E') | Some('W')
        )
}

fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
