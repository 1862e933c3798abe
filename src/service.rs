//! Request-facing facade: one snapshot in, derived arrival and headway
//! views out.

use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::arrivals::{ArrivalRow, ProjectorConfig, STALE_GRACE_SECS, project_arrivals};
use crate::cache::{FeedCache, SnapshotProvider};
use crate::headway::{HeadwayStats, aggregate};
use crate::overlay::apply_vehicle_overlay;
use crate::stops::StopDirectory;

/// Failures a caller must be able to tell apart from an empty result.
///
/// An empty arrival list is a successful answer ("no trains"); this error
/// means the snapshot itself could not be retrieved or decoded ("no data").
/// Per-trip data problems never surface here, they are absorbed by the
/// projector.
#[derive(Debug)]
pub enum ServiceError {
    FeedUnavailable(anyhow::Error),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::FeedUnavailable(err) => write!(f, "feed unavailable: {err:#}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Projected arrivals for one stop, plus the snapshot metadata callers
/// display next to them.
#[derive(Debug, Serialize)]
pub struct ArrivalsView {
    pub stop_id: String,
    pub stop_label: String,
    pub rows: Vec<ArrivalRow>,
    pub header_epoch_sec: Option<i64>,
    pub feed_age_secs: i64,
}

/// Headway statistics plus the arrival list they were derived from.
#[derive(Debug, Serialize)]
pub struct HeadwayView {
    pub stop_id: String,
    pub stop_label: String,
    pub stats: HeadwayStats,
    pub rows: Vec<ArrivalRow>,
    pub header_epoch_sec: Option<i64>,
    pub feed_age_secs: i64,
}

/// Core service: snapshot cache plus station reference data.
pub struct ArrivalsService<P> {
    cache: FeedCache<P>,
    stops: StopDirectory,
    stale_grace_secs: i64,
}

impl<P: SnapshotProvider> ArrivalsService<P> {
    pub fn new(cache: FeedCache<P>, stops: StopDirectory) -> Self {
        ArrivalsService {
            cache,
            stops,
            stale_grace_secs: STALE_GRACE_SECS,
        }
    }

    pub fn stops(&self) -> &StopDirectory {
        &self.stops
    }

    /// Deduplicated, time-ordered arrivals for a stop, with vehicle
    /// telemetry overlaid where available.
    pub async fn get_arrivals(
        &self,
        target_stop_id: &str,
        allowed_routes: &[String],
        horizon_secs: i64,
        now_epoch_sec: i64,
    ) -> Result<ArrivalsView, ServiceError> {
        let stop_id = normalize_stop_id(target_stop_id);
        let snapshot = self
            .cache
            .get(now_epoch_sec * 1000)
            .await
            .map_err(ServiceError::FeedUnavailable)?;

        let config = self.projector_config(allowed_routes, horizon_secs);
        let vehicles = snapshot.vehicles_by_trip(allowed_routes);
        let rows: Vec<ArrivalRow> =
            project_arrivals(&snapshot, &stop_id, &config, now_epoch_sec, &self.stops)
                .into_iter()
                .map(|row| apply_vehicle_overlay(row, &vehicles, &self.stops))
                .collect();

        debug!(stop_id = %stop_id, rows = rows.len(), "Arrivals projected");

        Ok(ArrivalsView {
            stop_label: self.stops.label(Some(&stop_id)),
            stop_id,
            rows,
            header_epoch_sec: snapshot.header_epoch_sec,
            feed_age_secs: snapshot.age_secs(now_epoch_sec),
        })
    }

    /// Consecutive-gap statistics over the same filtered, deduplicated
    /// arrival sequence that [`Self::get_arrivals`] produces.
    pub async fn get_headway_stats(
        &self,
        target_stop_id: &str,
        allowed_routes: &[String],
        horizon_secs: i64,
        now_epoch_sec: i64,
    ) -> Result<HeadwayView, ServiceError> {
        let stop_id = normalize_stop_id(target_stop_id);
        let snapshot = self
            .cache
            .get(now_epoch_sec * 1000)
            .await
            .map_err(ServiceError::FeedUnavailable)?;

        let config = self.projector_config(allowed_routes, horizon_secs);
        let rows = project_arrivals(&snapshot, &stop_id, &config, now_epoch_sec, &self.stops);
        let times: Vec<i64> = rows.iter().map(|r| r.arrival_epoch_sec).collect();
        let stats = aggregate(&times, now_epoch_sec);

        Ok(HeadwayView {
            stop_label: self.stops.label(Some(&stop_id)),
            stop_id,
            stats,
            rows,
            header_epoch_sec: snapshot.header_epoch_sec,
            feed_age_secs: snapshot.age_secs(now_epoch_sec),
        })
    }

    fn projector_config(&self, allowed_routes: &[String], horizon_secs: i64) -> ProjectorConfig {
        ProjectorConfig {
            allowed_routes: allowed_routes.to_vec(),
            horizon_secs,
            stale_grace_secs: self.stale_grace_secs,
        }
    }
}

fn normalize_stop_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}
