//! Consolidation - merging co-located events.
//!
//! At map resolution many probes land on the same coordinate and would be
//! drawn as indistinguishable dots. Consolidation replaces every group of
//! events sharing an exact (lat, lon) with one aggregate event carrying the
//! fraction of the group that was measured.
//!
//! # Algorithm
//!
//! ```text
//! sort by (lat, lon, timestamp)
//!   -> scan runs of identical (lat, lon)
//!        run of 1   -> keep as-is (fallback included)
//!        run of n>1 -> Consolidated { success_ratio = measured / n }
//!                      at the run's earliest timestamp
//!   -> stable sort by timestamp
//!   -> re-batch by timestamp
//! ```
//!
//! Fallback markers are owned by their principals and are not consolidated
//! on their own. An aggregate drops the fallbacks of its members.

use crate::event::Event;
use crate::grouping::{group_by_timestamp, EventBatch};
use netviz_env::LatLon;
use std::cmp::Ordering;
use tracing::debug;

/// Total order on coordinates: latitude first, longitude as tie-break.
///
/// `-0.0` and `0.0` draw the same point, so both compare equal.
fn compare_location(a: &LatLon, b: &LatLon) -> Ordering {
    let (a_lat, a_lon) = (a.lat + 0.0, a.lon + 0.0);
    let (b_lat, b_lon) = (b.lat + 0.0, b.lon + 0.0);
    a_lat.total_cmp(&b_lat).then_with(|| a_lon.total_cmp(&b_lon))
}

fn same_location(a: &LatLon, b: &LatLon) -> bool {
    compare_location(a, b) == Ordering::Equal
}

/// Merges co-located events.
///
/// The result is ordered by coordinate. No two events in it share a
/// coordinate, so consolidating it again returns it unchanged.
pub fn consolidate(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| {
        compare_location(&a.location, &b.location).then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    let input_len = events.len();
    let mut output = Vec::with_capacity(input_len);
    let mut iter = events.into_iter().peekable();

    while let Some(first) = iter.next() {
        let mut run_len = 1usize;
        let mut measured = usize::from(first.outcome.is_measured());

        while let Some(next) = iter.peek() {
            if !same_location(&next.location, &first.location) {
                break;
            }
            if next.outcome.is_measured() {
                measured += 1;
            }
            run_len += 1;
            iter.next();
        }

        if run_len == 1 {
            output.push(first);
        } else {
            let ratio = measured as f64 / run_len as f64;
            output.push(Event::consolidated(first.location, first.timestamp, ratio));
        }
    }

    debug!("Consolidated {} events into {}", input_len, output.len());
    output
}

/// Consolidates every event in `batches` and re-batches the result in
/// chronological order.
///
/// Events sharing a timestamp keep their coordinate order inside the new
/// batch.
pub fn consolidate_batches(batches: Vec<EventBatch>) -> Vec<EventBatch> {
    let events: Vec<Event> = batches.into_iter().flat_map(EventBatch::into_events).collect();

    let mut consolidated = consolidate(events);
    consolidated.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    group_by_timestamp(consolidated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::TimeStamp;
    use approx::assert_relative_eq;
    use netviz_env::Outcome;
    use proptest::prelude::*;

    fn ev(lat: f64, lon: f64, minute: u32, outcome: Outcome) -> Event {
        Event {
            location: LatLon::new(lat, lon),
            timestamp: TimeStamp::new(20, 1, 1, 0, minute),
            outcome,
            source_id: format!("{}:{}", lat, lon),
            protocol: "TCP".to_string(),
            fallback: None,
        }
    }

    fn measured() -> Outcome {
        Outcome::Measured { intensity: 0.1 }
    }

    #[test]
    fn test_measured_and_unreached_pair() {
        let out = consolidate(vec![
            ev(10.0, 20.0, 0, measured()),
            ev(10.0, 20.0, 0, Outcome::Unreached),
        ]);

        assert_eq!(out.len(), 1);
        assert!(out[0].is_consolidated());
        match out[0].outcome {
            Outcome::Consolidated { success_ratio } => assert_relative_eq!(success_ratio, 0.5),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_signed_zero_coordinates_merge() {
        let out = consolidate(vec![
            ev(-0.0, 0.0, 0, measured()),
            ev(0.0, -0.0, 1, Outcome::Unreached),
            ev(0.0, 0.0, 2, measured()),
        ]);

        assert_eq!(out.len(), 1);
        match out[0].outcome {
            Outcome::Consolidated { success_ratio } => assert_relative_eq!(success_ratio, 2.0 / 3.0),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_singletons_kept_unchanged() {
        let mut lonely = ev(1.0, 1.0, 3, Outcome::Unreached);
        lonely.fallback = Some(Box::new(ev(2.0, 2.0, 3, Outcome::FallbackMarker)));

        let out = consolidate(vec![lonely.clone(), ev(5.0, 5.0, 1, measured())]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], lonely);
        assert!(!out[1].is_consolidated());
    }

    #[test]
    fn test_aggregate_takes_earliest_timestamp() {
        let out = consolidate(vec![
            ev(3.0, 4.0, 30, measured()),
            ev(3.0, 4.0, 10, Outcome::Unreached),
            ev(3.0, 4.0, 20, measured()),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp, TimeStamp::new(20, 1, 1, 0, 10));
        match out[0].outcome {
            Outcome::Consolidated { success_ratio } => assert_relative_eq!(success_ratio, 2.0 / 3.0),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_longitude_breaks_latitude_ties() {
        let out = consolidate(vec![
            ev(3.0, 5.0, 0, measured()),
            ev(3.0, 4.0, 0, measured()),
            ev(3.0, 5.0, 0, measured()),
        ]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].location, LatLon::new(3.0, 4.0));
        assert_eq!(out[1].outcome, Outcome::Consolidated { success_ratio: 1.0 });
    }

    #[test]
    fn test_rebatch_is_chronological() {
        let batches = vec![
            EventBatch::new(
                TimeStamp::new(20, 1, 1, 0, 5),
                vec![ev(9.0, 9.0, 5, measured()), ev(1.0, 1.0, 5, measured())],
            ),
            EventBatch::new(
                TimeStamp::new(20, 1, 1, 0, 0),
                vec![ev(1.0, 1.0, 0, Outcome::Unreached), ev(4.0, 4.0, 0, measured())],
            ),
        ];

        let out = consolidate_batches(batches);

        // (1,1) merges at minute 0; (4,4) stays at minute 0; (9,9) stays at minute 5
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].timestamp(), TimeStamp::new(20, 1, 1, 0, 0));
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[1].timestamp(), TimeStamp::new(20, 1, 1, 0, 5));
        assert_eq!(out[1].len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(consolidate(Vec::new()).is_empty());
        assert!(consolidate_batches(Vec::new()).is_empty());
    }

    fn arb_outcome() -> impl Strategy<Value = Outcome> {
        prop_oneof![
            (0.0f64..=1.0).prop_map(|intensity| Outcome::Measured { intensity }),
            Just(Outcome::Unreached),
        ]
    }

    fn arb_events() -> impl Strategy<Value = Vec<Event>> {
        // Small coordinate grid so collisions are common
        prop::collection::vec((0i32..4, 0i32..4, 0u32..60, arb_outcome()), 0..40).prop_map(|rows| {
            rows.into_iter()
                .map(|(lat, lon, minute, outcome)| ev(lat as f64, lon as f64, minute, outcome))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_consolidation_is_idempotent(events in arb_events()) {
            let once = consolidate(events);
            let twice = consolidate(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_consolidated_coordinates_are_unique(events in arb_events()) {
            let out = consolidate(events);
            for pair in out.windows(2) {
                prop_assert!(!same_location(&pair[0].location, &pair[1].location));
            }
        }

        #[test]
        fn prop_success_ratio_in_unit_range(events in arb_events()) {
            for event in consolidate(events) {
                if let Outcome::Consolidated { success_ratio } = event.outcome {
                    prop_assert!((0.0..=1.0).contains(&success_ratio));
                }
            }
        }
    }
}
