//! History replayer and verifier.
//!
//! Replay always runs on a fresh state owned by the replayer and never
//! touches the live tracker. A log whose first sequence is 1 is replayed from
//! the layout's initial state; a truncated log is seeded from the pre-event
//! copy stored in its first snapshot. Logs are replayed in ascending sequence
//! order whatever order the slice comes in.

use std::borrow::Cow;

use occutrack_domain::difference::{
    Checkpoint, StateDifference, compare_maps, compare_open_warnings,
};
use occutrack_domain::layout::Layout;
use occutrack_domain::snapshot::MapSnapshot;
use occutrack_domain::state::TrackerState;

use crate::pipeline::Engine;
use crate::settings::TrackerSettings;

#[derive(Debug, Clone, Copy)]
pub struct HistoryReplayer<'a> {
    layout: &'a Layout,
    engine: Engine<'a>,
}

impl<'a> HistoryReplayer<'a> {
    #[must_use]
    pub fn new(layout: &'a Layout, settings: &'a TrackerSettings) -> Self {
        Self {
            layout,
            engine: Engine::new(layout, settings),
        }
    }

    fn initial_state(&self, log: &[MapSnapshot]) -> TrackerState {
        match log.first() {
            Some(first) if first.sequence > 1 => first.state_before(),
            _ => TrackerState::from_layout(self.layout),
        }
    }

    fn step(&self, state: &mut TrackerState, snapshot: &MapSnapshot) {
        if let Err(err) = self.engine.apply(state, &snapshot.event, snapshot.timestamp) {
            tracing::warn!(
                sequence = snapshot.sequence,
                event = %snapshot.event,
                error = %err,
                "snapshot event could not be replayed"
            );
        }
    }

    /// Replay `log` in ascending sequence order and return the final state.
    #[must_use]
    pub fn rebuild(&self, log: &[MapSnapshot]) -> TrackerState {
        let log = in_sequence_order(log);
        let mut state = self.initial_state(&log);
        for snapshot in log.iter() {
            self.step(&mut state, snapshot);
        }
        tracing::debug!(snapshots = log.len(), "history replayed");
        state
    }

    /// Replay `log` and compare the result with `live`.
    ///
    /// An empty result means the live state is reproducible from the log.
    #[must_use]
    pub fn verify(
        &self,
        log: &[MapSnapshot],
        live: &TrackerState,
        include_warnings: bool,
    ) -> Vec<StateDifference> {
        let log = in_sequence_order(log);
        let replayed = self.rebuild(&log);
        let checkpoint = log.last().map(|s| Checkpoint {
            sequence: s.sequence,
            timestamp: s.timestamp,
        });
        let mut differences = compare_maps(
            checkpoint,
            &live.areas,
            &live.sensors,
            &replayed.areas,
            &replayed.sensors,
        );
        if include_warnings {
            differences.extend(compare_open_warnings(
                checkpoint,
                &live.warnings,
                &replayed.warnings,
            ));
        }
        report(&differences, log.len());
        differences
    }

    /// Replay step by step and compare each snapshot's recorded pre-state with
    /// the replayed state at that point.
    #[must_use]
    pub fn verify_all_snapshots(&self, log: &[MapSnapshot]) -> Vec<StateDifference> {
        let log = in_sequence_order(log);
        let mut state = self.initial_state(&log);
        let mut differences = Vec::new();
        for snapshot in log.iter() {
            differences.extend(compare_maps(
                Some(Checkpoint {
                    sequence: snapshot.sequence,
                    timestamp: snapshot.timestamp,
                }),
                &snapshot.areas_before,
                &snapshot.sensors_before,
                &state.areas,
                &state.sensors,
            ));
            self.step(&mut state, snapshot);
        }
        report(&differences, log.len());
        differences
    }
}

fn in_sequence_order(log: &[MapSnapshot]) -> Cow<'_, [MapSnapshot]> {
    if log.is_sorted_by_key(|s| s.sequence) {
        return Cow::Borrowed(log);
    }
    let mut sorted = log.to_vec();
    sorted.sort_by_key(|s| s.sequence);
    Cow::Owned(sorted)
}

fn report(differences: &[StateDifference], snapshots: usize) {
    if differences.is_empty() {
        tracing::info!(snapshots, "history verification passed");
        return;
    }
    tracing::warn!(
        snapshots,
        differences = differences.len(),
        "history verification failed"
    );
    for diff in differences.iter().take(10) {
        tracing::warn!(%diff, "state difference");
    }
}
