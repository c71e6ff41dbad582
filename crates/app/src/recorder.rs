//! Snapshot recorder: append-only log of pre-event state copies.

use occutrack_domain::snapshot::{MapSnapshot, SnapshotEvent};
use occutrack_domain::state::TrackerState;
use occutrack_domain::time::Timestamp;

#[derive(Debug, Clone)]
pub struct SnapshotRecorder {
    snapshots: Vec<MapSnapshot>,
    next_sequence: u64,
}

impl Default for SnapshotRecorder {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
            next_sequence: 1,
        }
    }
}

impl SnapshotRecorder {
    /// Resume from a persisted log. Entries are sorted by sequence and numbering
    /// continues after the highest one.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<MapSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.sequence);
        let next_sequence = snapshots.last().map_or(1, |s| s.sequence + 1);
        Self {
            snapshots,
            next_sequence,
        }
    }

    /// Capture `state` as it is now, before `event` is applied.
    pub fn record(
        &mut self,
        event: SnapshotEvent,
        state: &TrackerState,
        timestamp: Timestamp,
    ) -> &MapSnapshot {
        let snapshot = MapSnapshot::capture(self.next_sequence, timestamp, event, state);
        self.next_sequence += 1;
        tracing::debug!(sequence = snapshot.sequence, event = %snapshot.event, "snapshot recorded");
        self.snapshots.push(snapshot);
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Drop the most recent snapshot. Used when the event it precedes was
    /// rejected after recording.
    pub(crate) fn discard_last(&mut self) {
        if self.snapshots.pop().is_some() {
            self.next_sequence -= 1;
        }
    }

    #[must_use]
    pub fn snapshots(&self) -> &[MapSnapshot] {
        &self.snapshots
    }

    /// Snapshots with a sequence strictly greater than `sequence`.
    #[must_use]
    pub fn since(&self, sequence: u64) -> &[MapSnapshot] {
        let start = self.snapshots.partition_point(|s| s.sequence <= sequence);
        &self.snapshots[start..]
    }

    /// Sequence of the newest snapshot, `0` when empty.
    #[must_use]
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Keep only the newest `count` snapshots. Kept entries are not modified
    /// and sequence numbering continues. Returns how many were dropped.
    pub fn retain_last(&mut self, count: usize) -> usize {
        let dropped = self.snapshots.len().saturating_sub(count);
        self.snapshots.drain(..dropped);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use occutrack_domain::area::Area;
    use occutrack_domain::layout::Layout;

    fn ts(secs: i64) -> Timestamp {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn state() -> TrackerState {
        let layout = Layout::builder()
            .area(Area::builder().id("hall").build().unwrap())
            .build()
            .unwrap();
        TrackerState::from_layout(&layout)
    }

    #[test]
    fn should_number_snapshots_from_one() {
        let mut recorder = SnapshotRecorder::default();
        let state = state();
        assert_eq!(recorder.last_sequence(), 0);

        let first = recorder.record(SnapshotEvent::TimeoutScan, &state, ts(0)).sequence;
        let second = recorder.record(SnapshotEvent::TimeoutScan, &state, ts(1)).sequence;

        assert_eq!((first, second), (1, 2));
        assert_eq!(recorder.last_sequence(), 2);
    }

    #[test]
    fn should_continue_numbering_after_retention() {
        let mut recorder = SnapshotRecorder::default();
        let state = state();
        for i in 0..5 {
            recorder.record(SnapshotEvent::TimeoutScan, &state, ts(i));
        }

        assert_eq!(recorder.retain_last(2), 3);
        let next = recorder.record(SnapshotEvent::TimeoutScan, &state, ts(9)).sequence;

        assert_eq!(next, 6);
        let sequences: Vec<u64> = recorder.snapshots().iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![4, 5, 6]);
    }

    #[test]
    fn should_resume_after_highest_persisted_sequence() {
        let state = state();
        let snapshots = vec![
            MapSnapshot::capture(8, ts(8), SnapshotEvent::TimeoutScan, &state),
            MapSnapshot::capture(7, ts(7), SnapshotEvent::TimeoutScan, &state),
        ];

        let mut recorder = SnapshotRecorder::from_snapshots(snapshots);

        assert_eq!(recorder.snapshots()[0].sequence, 7);
        assert_eq!(recorder.record(SnapshotEvent::TimeoutScan, &state, ts(9)).sequence, 9);
    }

    #[test]
    fn should_return_snapshots_after_sequence() {
        let mut recorder = SnapshotRecorder::default();
        let state = state();
        for i in 0..4 {
            recorder.record(SnapshotEvent::TimeoutScan, &state, ts(i));
        }

        let tail: Vec<u64> = recorder.since(2).iter().map(|s| s.sequence).collect();

        assert_eq!(tail, vec![3, 4]);
        assert!(recorder.since(4).is_empty());
    }

    #[test]
    fn should_discard_last_snapshot_and_reuse_sequence() {
        let mut recorder = SnapshotRecorder::default();
        let state = state();
        recorder.record(SnapshotEvent::TimeoutScan, &state, ts(0));

        recorder.discard_last();

        assert!(recorder.is_empty());
        assert_eq!(recorder.record(SnapshotEvent::TimeoutScan, &state, ts(1)).sequence, 1);
    }
}
