//! Normalized, point-in-time view of one decoded GTFS-RT feed.
//!
//! All wide protobuf timestamps (u64/i64) are converted to plain `i64`
//! epoch-seconds here, at the ingestion boundary, so the rest of the crate
//! works with one uniform representation.

use crate::gtfs_rt;
use crate::gtfs_rt::vehicle_position::VehicleStopStatus;
use std::collections::HashMap;

/// One stop-time estimate in a trip's remaining stop sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTime {
    pub stop_id: String,
    pub arrival: Option<i64>,
    pub departure: Option<i64>,
}

/// A trip's remaining/complete ordered stop estimates at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdate {
    pub trip_id: String,
    pub route_id: String,
    pub stop_times: Vec<StopTime>,
}

/// Closed set of vehicle stop statuses. Feed values outside the published
/// enum map to `Unknown` rather than falling through to a default string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleStatus {
    InTransitTo,
    StoppedAt,
    IncomingAt,
    Unknown,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::InTransitTo => "IN_TRANSIT_TO",
            VehicleStatus::StoppedAt => "STOPPED_AT",
            VehicleStatus::IncomingAt => "INCOMING_AT",
            VehicleStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Last-known physical/operational status of one trip's vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePosition {
    pub trip_id: String,
    pub route_id: String,
    pub status: VehicleStatus,
    pub stop_id: Option<String>,
    pub coordinates: Option<(f64, f64)>,
    pub timestamp: Option<i64>,
}

/// Either side of a feed entity this crate cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Trip(TripUpdate),
    Vehicle(VehiclePosition),
}

/// One fetched-and-decoded capture of all active trip and vehicle data.
///
/// Immutable for the duration of a request; every derived row is rebuilt
/// from scratch on the next request.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entities: Vec<Entity>,
    pub header_epoch_sec: Option<i64>,
    pub fetched_at_ms: i64,
}

impl Snapshot {
    /// Normalizes a decoded [`gtfs_rt::FeedMessage`] into a [`Snapshot`].
    ///
    /// Entities that carry neither a trip update nor a usable vehicle
    /// record are dropped. Vehicle records without a trip id are dropped
    /// too since nothing downstream can correlate them.
    pub fn from_feed(feed: &gtfs_rt::FeedMessage, fetched_at_ms: i64) -> Self {
        let mut entities = Vec::with_capacity(feed.entity.len());

        for e in &feed.entity {
            if let Some(tu) = &e.trip_update {
                entities.push(Entity::Trip(normalize_trip_update(tu)));
            }
            if let Some(v) = &e.vehicle {
                if let Some(vp) = normalize_vehicle(v) {
                    entities.push(Entity::Vehicle(vp));
                }
            }
        }

        Snapshot {
            entities,
            header_epoch_sec: feed.header.timestamp.map(to_epoch_sec),
            fetched_at_ms,
        }
    }

    /// Trip updates whose route is in the allow-list.
    pub fn trip_updates<'a>(
        &'a self,
        allowed_routes: &'a [String],
    ) -> impl Iterator<Item = &'a TripUpdate> {
        self.entities.iter().filter_map(move |e| match e {
            Entity::Trip(tu) if allowed_routes.iter().any(|r| r == &tu.route_id) => Some(tu),
            _ => None,
        })
    }

    /// Vehicle records keyed by trip id, filtered to the route allow-list.
    /// When a trip id appears more than once the last record wins.
    pub fn vehicles_by_trip(&self, allowed_routes: &[String]) -> HashMap<String, &VehiclePosition> {
        let mut map = HashMap::new();
        for e in &self.entities {
            if let Entity::Vehicle(vp) = e {
                if allowed_routes.iter().any(|r| r == &vp.route_id) {
                    map.insert(vp.trip_id.clone(), vp);
                }
            }
        }
        map
    }

    /// Seconds since the feed was produced, preferring the header timestamp
    /// and falling back to the local fetch time.
    pub fn age_secs(&self, now_epoch_sec: i64) -> i64 {
        match self.header_epoch_sec {
            Some(ts) => (now_epoch_sec - ts).max(0),
            None => ((now_epoch_sec * 1000 - self.fetched_at_ms) / 1000).max(0),
        }
    }
}

fn normalize_trip_update(tu: &gtfs_rt::TripUpdate) -> TripUpdate {
    let stop_times = tu
        .stop_time_update
        .iter()
        .map(|stu| StopTime {
            stop_id: stu.stop_id().to_string(),
            arrival: stu.arrival.as_ref().and_then(|ev| ev.time),
            departure: stu.departure.as_ref().and_then(|ev| ev.time),
        })
        .collect();

    TripUpdate {
        trip_id: tu.trip.trip_id().to_string(),
        route_id: tu.trip.route_id().to_string(),
        stop_times,
    }
}

fn normalize_vehicle(v: &gtfs_rt::VehiclePosition) -> Option<VehiclePosition> {
    let trip = v.trip.as_ref()?;
    let trip_id = trip.trip_id.clone()?;

    let status = match v.current_status.map(VehicleStopStatus::try_from) {
        Some(Ok(VehicleStopStatus::InTransitTo)) => VehicleStatus::InTransitTo,
        Some(Ok(VehicleStopStatus::StoppedAt)) => VehicleStatus::StoppedAt,
        Some(Ok(VehicleStopStatus::IncomingAt)) => VehicleStatus::IncomingAt,
        Some(Err(_)) | None => VehicleStatus::Unknown,
    };

    Some(VehiclePosition {
        trip_id,
        route_id: trip.route_id().to_string(),
        status,
        stop_id: v.stop_id.clone(),
        coordinates: v
            .position
            .as_ref()
            .map(|p| (p.latitude as f64, p.longitude as f64)),
        timestamp: v.timestamp.map(to_epoch_sec),
    })
}

fn to_epoch_sec(raw: u64) -> i64 {
    i64::try_from(raw).unwrap_or(i64::MAX)
}
