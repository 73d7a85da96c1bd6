//! Renderable events ("pins") built from trace records.

use crate::timestamp::TimeStamp;
use crate::trace::{TraceRecord, FALLBACK_MARKER, UNREACHED};
use netviz_env::{GeoLocator, LatLon, Outcome, Renderer};
use serde::{Deserialize, Serialize};

/// Response ceilings used to normalize measured responses.
///
/// Network probes report milliseconds, web probes report seconds, so
/// each gets its own ceiling. A response above the ceiling counts as
/// unreached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseCeilings {
    /// Ceiling for network-layer probes, in milliseconds
    pub max_response_ms: f64,

    /// Ceiling for web probes, in seconds
    pub max_response_sec: f64,
}

impl Default for ResponseCeilings {
    fn default() -> Self {
        Self {
            max_response_ms: 1000.0,
            max_response_sec: 15.0,
        }
    }
}

impl ResponseCeilings {
    /// Returns the ceiling that applies to a protocol.
    pub fn for_web(&self, web: bool) -> f64 {
        if web {
            self.max_response_sec
        } else {
            self.max_response_ms
        }
    }
}

/// Classifies a measured response against its ceiling.
///
/// The derived intensity always lies in `[0, 1]`; responses slower than
/// the ceiling are clamped to `Unreached`.
pub fn classify_response(value: f64, ceiling: f64) -> Outcome {
    if value > ceiling {
        return Outcome::Unreached;
    }
    let intensity = if ceiling > 0.0 { value / ceiling } else { 0.0 };
    Outcome::Measured {
        intensity: intensity.clamp(0.0, 1.0),
    }
}

/// One geolocated, timestamped occurrence.
///
/// An unreached network probe owns a nested fallback event marking the
/// last reachable hop. The nesting is one level deep by construction:
/// fallback markers never carry a fallback of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Raw coordinate (sentinel if the address could not be located)
    pub location: LatLon,

    /// When the event fires
    pub timestamp: TimeStamp,

    /// Classification
    pub outcome: Outcome,

    /// Address the event was derived from (empty for aggregates)
    pub source_id: String,

    /// Protocol tag (empty for aggregates)
    pub protocol: String,

    /// Last-known-location marker, drawn before this event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Box<Event>>,
}

impl Event {
    /// Builds an event from a parsed record.
    ///
    /// Unreached non-web records get a fallback event built from the
    /// record's fallback column.
    pub fn from_record<G: GeoLocator + ?Sized>(
        record: &TraceRecord,
        geo: &G,
        ceilings: &ResponseCeilings,
    ) -> Self {
        let web = record.is_web();

        let (outcome, fallback) = if record.outcome == UNREACHED {
            let fallback = if web {
                None
            } else {
                Some(Box::new(Self::from_record(&record.fallback_record(), geo, ceilings)))
            };
            (Outcome::Unreached, fallback)
        } else if record.outcome == FALLBACK_MARKER {
            (Outcome::FallbackMarker, None)
        } else {
            (classify_response(record.outcome, ceilings.for_web(web)), None)
        };

        Self {
            location: geo.locate(&record.source_id),
            timestamp: record.timestamp,
            outcome,
            source_id: record.source_id.clone(),
            protocol: record.protocol.clone(),
            fallback,
        }
    }

    /// Builds the aggregate that replaces a run of co-located events.
    pub fn consolidated(location: LatLon, timestamp: TimeStamp, success_ratio: f64) -> Self {
        Self {
            location,
            timestamp,
            outcome: Outcome::Consolidated {
                success_ratio: success_ratio.clamp(0.0, 1.0),
            },
            source_id: String::new(),
            protocol: String::new(),
            fallback: None,
        }
    }

    /// Returns true if this event came out of consolidation.
    pub fn is_consolidated(&self) -> bool {
        self.outcome.is_consolidated()
    }

    /// Number of renderer calls releasing this event makes.
    pub fn render_count(&self) -> usize {
        1 + self.fallback.as_ref().map_or(0, |f| f.render_count())
    }

    /// Hands the event to a renderer, fallback first.
    ///
    /// Returns the number of renderer calls made.
    pub fn release<R: Renderer + ?Sized>(&self, renderer: &mut R) -> usize {
        let mut released = 0;
        if let Some(fallback) = &self.fallback {
            released += fallback.release(renderer);
        }
        renderer.render(self.location, self.outcome, self.is_consolidated());
        released + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use netviz_env::TableGeoLocator;

    fn geo() -> TableGeoLocator {
        let mut table = TableGeoLocator::new();
        table.insert("1.2.3.4", LatLon::new(10.0, 20.0));
        table.insert("9.9.9.9", LatLon::new(-5.0, 100.0));
        table
    }

    fn event(line: &str) -> Event {
        let record = TraceRecord::parse_line(line).unwrap();
        Event::from_record(&record, &geo(), &ResponseCeilings::default())
    }

    /// Records the order of render calls.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(LatLon, Outcome)>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, location: LatLon, outcome: Outcome, _consolidated: bool) {
            self.calls.push((location, outcome));
        }

        fn on_playback_complete(&mut self, _snapshot_requested: bool, _label: &str) {}
    }

    #[test]
    fn test_measured_intensity() {
        let e = event("1.2.3.4\t20_01_01-00:00\t250\t0\tICMP");

        assert_eq!(e.location, LatLon::new(10.0, 20.0));
        match e.outcome {
            Outcome::Measured { intensity } => assert_relative_eq!(intensity, 0.25),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(e.fallback.is_none());
    }

    #[test]
    fn test_slow_response_clamped_to_unreached() {
        let e = event("1.2.3.4\t20_01_01-00:00\t1500\t0\tICMP");
        assert_eq!(e.outcome, Outcome::Unreached);
        assert!(e.fallback.is_none());
    }

    #[test]
    fn test_unreached_owns_fallback() {
        let e = event("1.2.3.4\t20_01_01-00:00\t-1\t9.9.9.9\tTCP");

        assert_eq!(e.outcome, Outcome::Unreached);
        let fallback = e.fallback.as_ref().unwrap();
        assert_eq!(fallback.outcome, Outcome::FallbackMarker);
        assert_eq!(fallback.location, LatLon::new(-5.0, 100.0));
        assert_eq!(fallback.timestamp, e.timestamp);
        assert!(fallback.fallback.is_none());
        assert_eq!(e.render_count(), 2);
    }

    #[test]
    fn test_release_draws_fallback_first() {
        let e = event("1.2.3.4\t20_01_01-00:00\t-1\t9.9.9.9\tTCP");
        let mut recorder = Recorder::default();

        assert_eq!(e.release(&mut recorder), 2);
        assert_eq!(
            recorder.calls,
            vec![
                (LatLon::new(-5.0, 100.0), Outcome::FallbackMarker),
                (LatLon::new(10.0, 20.0), Outcome::Unreached),
            ]
        );
    }

    #[test]
    fn test_unknown_address_uses_sentinel() {
        let e = event("7.7.7.7\t20_01_01-00:00\t-1\t8.8.8.8\tTCP");
        assert!(e.location.is_sentinel());
        assert!(e.fallback.unwrap().location.is_sentinel());
    }

    #[test]
    fn test_web_uses_seconds_ceiling() {
        let ceilings = ResponseCeilings::default();
        assert_eq!(ceilings.for_web(true), 15.0);
        assert_eq!(ceilings.for_web(false), 1000.0);

        // Reshaped web lines carry a zero response
        let e = event("1.2.3.4\t20_01_01-00:00\t5\tWEB");
        assert_eq!(e.outcome, Outcome::Measured { intensity: 0.0 });
    }

    #[test]
    fn test_consolidated_event() {
        let e = Event::consolidated(LatLon::new(1.0, 2.0), TimeStamp::new(20, 1, 1, 0, 0), 0.5);
        assert!(e.is_consolidated());
        assert_eq!(e.outcome, Outcome::Consolidated { success_ratio: 0.5 });
        assert_eq!(e.render_count(), 1);
    }

    proptest::proptest! {
        #[test]
        fn prop_measured_intensity_in_unit_range(value in 0.0f64..1e6, ceiling in 0.0f64..1e5) {
            if let Outcome::Measured { intensity } = classify_response(value, ceiling) {
                proptest::prop_assert!((0.0..=1.0).contains(&intensity));
            }
        }
    }
}
