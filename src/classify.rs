//! Best-effort "where is this train now" classification from a trip's
//! stop-time sequence.

use crate::snapshot::StopTime;

/// Where a trip sits relative to its listed stop sequence at a given time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionState {
    /// No stop-time events to reason from.
    Unknown,
    /// Inside the dwell window `[arrival, departure]` of this stop.
    At(Option<String>),
    /// Past `from` (if any) but not yet arrived at `to`.
    Between {
        from: Option<String>,
        to: Option<String>,
    },
    /// After every listed arrival, likely near or beyond the terminal.
    Past(Option<String>),
}

/// Classifies a trip's position from its ordered stop-time sequence.
///
/// Walks the sequence in feed order, trusting it to reflect travel order.
/// A missing departure falls back to the arrival time, so a stop with only
/// an arrival has a zero-width dwell window. Events with neither timestamp
/// never match directly but still count as the previous stop for the
/// `Between`/`Past` reports.
pub fn classify(stop_times: &[StopTime], now_epoch_sec: i64) -> PositionState {
    if stop_times.is_empty() {
        return PositionState::Unknown;
    }

    let mut prev: Option<&StopTime> = None;
    for st in stop_times {
        let arr = st.arrival;
        let dep = st.departure.or(arr);

        if let Some(arr) = arr {
            if now_epoch_sec < arr {
                return PositionState::Between {
                    from: prev.and_then(some_id),
                    to: some_id(st),
                };
            }
            if let Some(dep) = dep {
                if now_epoch_sec >= arr && now_epoch_sec <= dep {
                    return PositionState::At(some_id(st));
                }
            }
        }
        prev = Some(st);
    }

    PositionState::Past(prev.and_then(some_id))
}

fn some_id(st: &StopTime) -> Option<String> {
    if st.stop_id.is_empty() {
        None
    } else {
        Some(st.stop_id.clone())
    }
}
