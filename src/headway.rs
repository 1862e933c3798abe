//! Consecutive-gap statistics over a stop's projected arrival times.

use serde::Serialize;

/// Gap statistics in minutes. Each field is independently absent when the
/// input holds too few arrivals to compute it; absence is a valid result,
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadwayStats {
    pub next_headway_min: Option<f64>,
    pub mean_headway_min: Option<f64>,
    pub median_headway_min: Option<f64>,
}

/// Computes headway statistics from an ascending, per-trip-deduplicated
/// sequence of arrival epoch-seconds.
///
/// `next_headway_min` is the gap between the first two arrivals at or
/// after `now`; mean and median cover every consecutive pair in the input.
pub fn aggregate(sorted_arrivals: &[i64], now_epoch_sec: i64) -> HeadwayStats {
    let gaps_min: Vec<f64> = sorted_arrivals
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / 60.0)
        .collect();

    let next_headway_min = sorted_arrivals
        .iter()
        .position(|&t| t >= now_epoch_sec)
        .and_then(|i| {
            let pair = sorted_arrivals.get(i..=i + 1)?;
            Some((pair[1] - pair[0]) as f64 / 60.0)
        });

    HeadwayStats {
        next_headway_min,
        mean_headway_min: mean(&gaps_min),
        median_headway_min: median(&gaps_min),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_example() {
        // arrivals at 100/280/400 with now=90: gaps 3.0 and 2.0 minutes
        let stats = aggregate(&[100, 280, 400], 90);
        assert_eq!(stats.mean_headway_min, Some(2.5));
        assert_eq!(stats.median_headway_min, Some(2.5));
        assert_eq!(stats.next_headway_min, Some(3.0));
    }

    #[test]
    fn empty_and_single_inputs_are_all_absent() {
        for input in [&[][..], &[100][..]] {
            let stats = aggregate(input, 0);
            assert_eq!(stats.next_headway_min, None);
            assert_eq!(stats.mean_headway_min, None);
            assert_eq!(stats.median_headway_min, None);
        }
    }

    #[test]
    fn odd_gap_count_takes_middle() {
        // gaps: 1, 2, 6 minutes
        let stats = aggregate(&[0, 60, 180, 540], 0);
        assert_eq!(stats.median_headway_min, Some(2.0));
        assert_eq!(stats.mean_headway_min, Some(3.0));
    }

    #[test]
    fn next_headway_skips_past_arrivals() {
        // first arrival is in the past; the next pair is 300/480
        let stats = aggregate(&[100, 300, 480], 200);
        assert_eq!(stats.next_headway_min, Some(3.0));
    }

    #[test]
    fn next_headway_absent_with_fewer_than_two_future_arrivals() {
        // only one arrival at or after now
        let stats = aggregate(&[100, 300], 200);
        assert_eq!(stats.next_headway_min, None);
        // mean/median still cover the full pair list
        assert_eq!(stats.mean_headway_min, Some(10.0 / 3.0));
    }

    #[test]
    fn arrival_exactly_at_now_counts_as_future() {
        let stats = aggregate(&[200, 320], 200);
        assert_eq!(stats.next_headway_min, Some(2.0));
    }
}
