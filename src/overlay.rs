//! Overrides trip-update-derived status/position text with vehicle
//! telemetry, which reflects sensor data rather than schedule inference.

use std::collections::HashMap;

use crate::arrivals::ArrivalRow;
use crate::snapshot::{VehiclePosition, VehicleStatus};
use crate::stops::StopDirectory;

/// Applies a trip's vehicle record, if any, to a projected arrival row.
///
/// With a vehicle record present, the status text becomes the raw status
/// name, suffixed with the station label when a stop id is known, and the
/// position description is unconditionally rewritten to `Near <label>`
/// whenever the record carries a stop id. Without a record, the row passes
/// through untouched.
pub fn apply_vehicle_overlay(
    row: ArrivalRow,
    vehicles_by_trip: &HashMap<String, &VehiclePosition>,
    stops: &StopDirectory,
) -> ArrivalRow {
    let Some(vehicle) = vehicles_by_trip.get(&row.trip_id) else {
        return row;
    };

    let mut row = row;
    let stop_id = vehicle.stop_id.as_deref().filter(|s| !s.is_empty());

    row.status_text = match (vehicle.status, stop_id) {
        (VehicleStatus::Unknown, _) | (_, None) => vehicle.status.as_str().to_string(),
        (status, Some(id)) => format!("{} {}", status.as_str(), stops.label(Some(id))),
    };

    if let Some(id) = stop_id {
        row.position_description = format!("Near {}", stops.label(Some(id)));
    }

    row
}
