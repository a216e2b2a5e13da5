//! Zone alert state tracker
//!
//! Rising-edge alerting: a vessel fires one alert when it enters the inner
//! zone and re-arms only after it leaves the inner zone or drops out of the
//! feed. The tracker is pure; the engine owns the `AlertStateMap` and swaps
//! in the map returned by [`AlertTracker::evaluate_batch`] after each poll.

use chrono::{DateTime, Utc};

use crate::geodesy::{classify_zone, distance_meters};
use crate::types::{
    AlertEvent, AlertState, AlertStateMap, Coordinate, TrackedVessel, VesselSnapshot, Zone,
    ZoneCounts, ZoneRadii,
};

/// Result of evaluating one snapshot.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub vessel: TrackedVessel,
    pub state: AlertState,
    pub event: Option<AlertEvent>,
}

/// Result of evaluating one poll.
#[derive(Debug, Clone, Default)]
pub struct BatchEvaluation {
    /// Alert flags for exactly the vessels present in the batch
    pub state: AlertStateMap,
    /// Rising edges, in batch order
    pub events: Vec<AlertEvent>,
    /// Annotated vessels, in batch order, duplicates removed
    pub vessels: Vec<TrackedVessel>,
    pub zone_counts: ZoneCounts,
}

/// Classifies vessels against the observer's rings and computes alert
/// transitions.
#[derive(Debug, Clone, Copy)]
pub struct AlertTracker {
    observer: Coordinate,
    radii: ZoneRadii,
}

impl AlertTracker {
    pub const fn new(observer: Coordinate, radii: ZoneRadii) -> Self {
        Self { observer, radii }
    }

    pub const fn observer(&self) -> Coordinate {
        self.observer
    }

    pub const fn radii(&self) -> ZoneRadii {
        self.radii
    }

    /// Evaluate one snapshot against the prior flags.
    ///
    /// | zone      | prior flag | new flag | event |
    /// |-----------|------------|----------|-------|
    /// | Inner     | false      | true     | yes   |
    /// | Inner     | true       | true     | no    |
    /// | not Inner | any        | false    | no    |
    pub fn evaluate(
        &self,
        previous: &AlertStateMap,
        snapshot: &VesselSnapshot,
        at: DateTime<Utc>,
    ) -> Evaluation {
        let prior = previous
            .get(&snapshot.track_id)
            .copied()
            .unwrap_or_default();
        self.transition(prior, snapshot.clone(), at)
    }

    /// Evaluate one poll.
    ///
    /// Every vessel is judged against `previous` as it stood when the poll
    /// started. The returned map holds only vessels present in `snapshots`,
    /// so a vessel that vanished is forgotten and alerts again if it comes
    /// back inside the inner zone. A track id repeated within one batch is
    /// evaluated once (first record wins).
    pub fn evaluate_batch(
        &self,
        previous: &AlertStateMap,
        snapshots: Vec<VesselSnapshot>,
        at: DateTime<Utc>,
    ) -> BatchEvaluation {
        let mut out = BatchEvaluation::default();

        for snapshot in snapshots {
            if out.state.contains_key(&snapshot.track_id) {
                continue;
            }
            let prior = previous
                .get(&snapshot.track_id)
                .copied()
                .unwrap_or_default();
            let eval = self.transition(prior, snapshot, at);

            out.zone_counts.record(eval.vessel.zone);
            out.state
                .insert(eval.vessel.snapshot.track_id.clone(), eval.state);
            out.events.extend(eval.event);
            out.vessels.push(eval.vessel);
        }

        out
    }

    fn transition(&self, prior: AlertState, snapshot: VesselSnapshot, at: DateTime<Utc>) -> Evaluation {
        let distance = distance_meters(self.observer, snapshot.position);
        let zone = classify_zone(distance, &self.radii);

        let (state, event) = match (zone, prior.currently_alerted) {
            (Zone::Inner, false) => (
                AlertState::alerted(at),
                Some(AlertEvent::new(&snapshot.track_id, &snapshot.name, distance, at)),
            ),
            (Zone::Inner, true) => (prior, None),
            _ => (AlertState::armed(), None),
        };

        Evaluation {
            vessel: TrackedVessel::new(snapshot, distance, zone),
            state,
            event,
        }
    }
}
