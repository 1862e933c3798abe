//! Projects one feed snapshot into a deduplicated, time-ordered arrival
//! list for a target stop.

use serde::Serialize;
use std::collections::HashMap;

use crate::classify::{PositionState, classify};
use crate::snapshot::Snapshot;
use crate::stops::StopDirectory;

/// How long after a projected arrival time a trip still shows up, absorbing
/// clock and feed jitter around real-time arrivals.
pub const STALE_GRACE_SECS: i64 = 60;

/// ETA at or under this many seconds reads as "Arriving".
pub const ARRIVING_THRESHOLD_SECS: i64 = 15;

/// Caller-supplied projection bounds.
#[derive(Debug, Clone)]
pub struct ProjectorConfig {
    pub allowed_routes: Vec<String>,
    pub horizon_secs: i64,
    pub stale_grace_secs: i64,
}

impl ProjectorConfig {
    pub fn new(allowed_routes: Vec<String>, horizon_secs: i64) -> Self {
        ProjectorConfig {
            allowed_routes,
            horizon_secs,
            stale_grace_secs: STALE_GRACE_SECS,
        }
    }
}

/// One projected arrival, rebuilt fresh per request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrivalRow {
    pub route_id: String,
    pub trip_id: String,
    pub arrival_epoch_sec: i64,
    pub eta_secs: i64,
    pub position_description: String,
    pub status_text: String,
}

/// Scans a snapshot's trip updates for arrivals at `target_stop_id`.
///
/// Applies the route allow-list, picks the first stop-time event matching
/// the target (case-insensitive), takes its arrival time (departure as a
/// fallback), drops trips outside `[-stale_grace, horizon]`, keeps the
/// earliest row per trip id, and returns the rows sorted by arrival time.
/// Trips with no usable timestamp for the target stop contribute nothing;
/// an empty result is a valid answer, not an error.
pub fn project_arrivals(
    snapshot: &Snapshot,
    target_stop_id: &str,
    config: &ProjectorConfig,
    now_epoch_sec: i64,
    stops: &StopDirectory,
) -> Vec<ArrivalRow> {
    let mut rows: Vec<ArrivalRow> = Vec::new();

    for tu in snapshot.trip_updates(&config.allowed_routes) {
        let Some(target) = tu
            .stop_times
            .iter()
            .find(|st| st.stop_id.eq_ignore_ascii_case(target_stop_id))
        else {
            continue;
        };

        let Some(t) = target.arrival.or(target.departure) else {
            continue;
        };

        let eta_secs = t - now_epoch_sec;
        if eta_secs < -config.stale_grace_secs || eta_secs > config.horizon_secs {
            continue;
        }

        // classify over the full stop sequence, not the target truncation
        let position = classify(&tu.stop_times, now_epoch_sec);
        let status_text = if eta_secs <= ARRIVING_THRESHOLD_SECS {
            "Arriving".to_string()
        } else {
            "En-route".to_string()
        };

        rows.push(ArrivalRow {
            route_id: tu.route_id.clone(),
            trip_id: tu.trip_id.clone(),
            arrival_epoch_sec: t,
            eta_secs,
            position_description: position_text(&position, stops),
            status_text,
        });
    }

    // Duplicate feed entities can repeat a trip id; keep the earliest
    // target-stop time per trip, first encountered on ties.
    let mut earliest_by_trip: HashMap<String, usize> = HashMap::new();
    let mut keep = vec![true; rows.len()];
    for (i, row) in rows.iter().enumerate() {
        match earliest_by_trip.get(&row.trip_id).copied() {
            Some(j) if rows[j].arrival_epoch_sec <= row.arrival_epoch_sec => {
                keep[i] = false;
            }
            Some(j) => {
                keep[j] = false;
                earliest_by_trip.insert(row.trip_id.clone(), i);
            }
            None => {
                earliest_by_trip.insert(row.trip_id.clone(), i);
            }
        }
    }
    let mut deduped: Vec<ArrivalRow> = rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, k)| k.then_some(row))
        .collect();

    deduped.sort_by_key(|r| r.arrival_epoch_sec);
    deduped
}

/// Renders a classified position with station names from the directory.
pub fn position_text(state: &PositionState, stops: &StopDirectory) -> String {
    match state {
        PositionState::Unknown => "—".to_string(),
        PositionState::At(stop) => format!("At {}", stops.label(stop.as_deref())),
        PositionState::Between { from, to } => format!(
            "{} → {}",
            stops.label(from.as_deref()),
            stops.label(to.as_deref())
        ),
        PositionState::Past(stop) => format!("Past {}", stops.label(stop.as_deref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Entity, StopTime, TripUpdate};

    fn trip(trip_id: &str, route_id: &str, stop_times: Vec<StopTime>) -> Entity {
        Entity::Trip(TripUpdate {
            trip_id: trip_id.to_string(),
            route_id: route_id.to_string(),
            stop_times,
        })
    }

    fn st(stop_id: &str, arrival: Option<i64>) -> StopTime {
        StopTime {
            stop_id: stop_id.to_string(),
            arrival,
            departure: None,
        }
    }

    fn snapshot(entities: Vec<Entity>) -> Snapshot {
        Snapshot {
            entities,
            header_epoch_sec: None,
            fetched_at_ms: 0,
        }
    }

    fn config() -> ProjectorConfig {
        ProjectorConfig::new(vec!["7".to_string(), "7X".to_string()], 1800)
    }

    fn empty_stops() -> StopDirectory {
        StopDirectory::default()
    }

    const NOW: i64 = 1_000_000;

    #[test]
    fn filters_routes_outside_allow_list() {
        let snap = snapshot(vec![
            trip("T1", "7", vec![st("721S", Some(NOW + 100))]),
            trip("T2", "E", vec![st("721S", Some(NOW + 200))]),
        ]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].trip_id, "T1");
    }

    #[test]
    fn target_stop_match_is_case_insensitive() {
        let snap = snapshot(vec![trip("T1", "7", vec![st("721s", Some(NOW + 100))])]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn departure_is_fallback_when_arrival_missing() {
        let snap = snapshot(vec![trip(
            "T1",
            "7",
            vec![StopTime {
                stop_id: "721S".to_string(),
                arrival: None,
                departure: Some(NOW + 300),
            }],
        )]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(rows[0].arrival_epoch_sec, NOW + 300);
    }

    #[test]
    fn trip_without_usable_timestamp_is_skipped() {
        let snap = snapshot(vec![trip("T1", "7", vec![st("721S", None)])]);
        assert!(project_arrivals(&snap, "721S", &config(), NOW, &empty_stops()).is_empty());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let cfg = config();
        let snap = snapshot(vec![
            trip("GRACE", "7", vec![st("721S", Some(NOW - 60))]),
            trip("STALE", "7", vec![st("721S", Some(NOW - 61))]),
            trip("EDGE", "7", vec![st("721S", Some(NOW + cfg.horizon_secs))]),
            trip("FAR", "7", vec![st("721S", Some(NOW + cfg.horizon_secs + 1))]),
        ]);
        let rows = project_arrivals(&snap, "721S", &cfg, NOW, &empty_stops());
        let ids: Vec<&str> = rows.iter().map(|r| r.trip_id.as_str()).collect();
        assert_eq!(ids, vec!["GRACE", "EDGE"]);
    }

    #[test]
    fn status_text_boundary_at_fifteen_seconds() {
        let snap = snapshot(vec![
            trip("SOON", "7", vec![st("721S", Some(NOW + 15))]),
            trip("LATER", "7", vec![st("721S", Some(NOW + 16))]),
        ]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(rows[0].status_text, "Arriving");
        assert_eq!(rows[1].status_text, "En-route");
    }

    #[test]
    fn dedupes_by_trip_keeping_earliest() {
        let snap = snapshot(vec![
            trip("T1", "7", vec![st("721S", Some(NOW + 500))]),
            trip("T1", "7", vec![st("721S", Some(NOW + 200))]),
            trip("T1", "7", vec![st("721S", Some(NOW + 400))]),
        ]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].arrival_epoch_sec, NOW + 200);
    }

    #[test]
    fn sorted_ascending_with_stable_ties() {
        let snap = snapshot(vec![
            trip("B", "7", vec![st("721S", Some(NOW + 300))]),
            trip("A", "7", vec![st("721S", Some(NOW + 100))]),
            trip("C", "7X", vec![st("721S", Some(NOW + 300))]),
        ]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        let ids: Vec<&str> = rows.iter().map(|r| r.trip_id.as_str()).collect();
        // B and C tie at +300; B came first in the feed and stays first
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn classifies_over_full_sequence() {
        // now sits between an upstream stop and the target
        let snap = snapshot(vec![trip(
            "T1",
            "7",
            vec![st("719S", Some(NOW - 120)), st("721S", Some(NOW + 200))],
        )]);
        let rows = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(rows[0].position_description, "719S → 721S");
    }

    #[test]
    fn projector_is_idempotent() {
        let snap = snapshot(vec![
            trip("T1", "7", vec![st("721S", Some(NOW + 100))]),
            trip("T2", "7X", vec![st("721S", Some(NOW + 400))]),
        ]);
        let first = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        let second = project_arrivals(&snap, "721S", &config(), NOW, &empty_stops());
        assert_eq!(first, second);
    }

    #[test]
    fn empty_snapshot_yields_empty_rows() {
        let rows = project_arrivals(&snapshot(vec![]), "721S", &config(), NOW, &empty_stops());
        assert!(rows.is_empty());
    }
}
