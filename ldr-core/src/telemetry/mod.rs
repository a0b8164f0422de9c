//! Event history shared by firmware and host targets.
//!
//! The loop's per-iteration log lines are fire-and-forget. Notable events
//! (which calibration source was picked, alarm edges) are additionally kept in
//! a fixed-capacity ring so tooling can inspect recent behavior, for example
//! how often the alarm chattered around its threshold.

use core::fmt;

use heapless::HistoryBuf;

use crate::actuator::ActuatorState;
use crate::calibration::CalibrationSource;
use crate::control::{Iteration, Outcome};

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Number of events retained.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Telemetry ring buffer type alias.
pub type TelemetryRing = HistoryBuf<TelemetryRecord, TELEMETRY_RING_CAPACITY>;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    Characterized(CalibrationSource),
    ActuatorOn,
    ActuatorOff,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Characterized(source) => write!(f, "calibration {source}"),
            TelemetryEventKind::ActuatorOn => f.write_str("actuator-on"),
            TelemetryEventKind::ActuatorOff => f.write_str("actuator-off"),
        }
    }
}

impl TelemetryEventKind {
    /// Event describing an alarm edge.
    #[must_use]
    pub const fn for_state(state: ActuatorState) -> Self {
        match state {
            ActuatorState::On => TelemetryEventKind::ActuatorOn,
            ActuatorState::Off => TelemetryEventKind::ActuatorOff,
        }
    }
}

/// Telemetry record stored in the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Loop iteration the event belongs to; `None` for startup events.
    pub iteration: Option<u32>,
    /// Averaged raw code that triggered the event, if any.
    pub raw: Option<u16>,
    pub event: TelemetryEventKind,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "telemetry:#{} {}", self.id, self.event)?;
        if let Some(iteration) = self.iteration {
            write!(f, " iter={iteration}")?;
        }
        if let Some(raw) = self.raw {
            write!(f, " raw={raw}")?;
        }
        Ok(())
    }
}

/// Records notable events into a fixed-size ring.
pub struct TelemetryRecorder {
    ring: TelemetryRing,
    next_event_id: EventId,
    transitions: u32,
}

impl TelemetryRecorder {
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
            transitions: 0,
        }
    }

    /// Records the calibration source chosen at startup.
    pub fn record_characterization(&mut self, source: CalibrationSource) -> EventId {
        self.record(TelemetryEventKind::Characterized(source), None, None)
    }

    /// Records an actuator edge; iterations without a state change are ignored.
    pub fn record_iteration<O: Outcome>(&mut self, iteration: &Iteration<O>) -> Option<EventId> {
        let state = iteration.outcome.transition()?;

        self.transitions = self.transitions.wrapping_add(1);
        Some(self.record(
            TelemetryEventKind::for_state(state),
            Some(iteration.index),
            Some(iteration.raw),
        ))
    }

    /// Records an arbitrary event.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        iteration: Option<u32>,
        raw: Option<u16>,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            iteration,
            raw,
            event,
        });

        id
    }

    /// Iterates the retained records from oldest to newest.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Number of retained records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Total actuator edges recorded since startup, including evicted ones.
    #[must_use]
    pub fn transitions(&self) -> u32 {
        self.transitions
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{AlarmCommand, DimmerCommand};

    fn alarm(index: u32, state: ActuatorState, changed: bool) -> Iteration<AlarmCommand> {
        Iteration {
            index,
            raw: 1000,
            millivolts: 953,
            outcome: AlarmCommand { state, changed },
        }
    }

    #[test]
    fn steady_iterations_are_not_recorded() {
        let mut recorder = TelemetryRecorder::new();
        let dimmed = Iteration {
            index: 0,
            raw: 2048,
            millivolts: 1650,
            outcome: DimmerCommand { duty: 511 },
        };

        assert_eq!(recorder.record_iteration(&alarm(3, ActuatorState::On, false)), None);
        assert_eq!(recorder.record_iteration(&dimmed), None);
        assert!(recorder.is_empty());
        assert_eq!(recorder.transitions(), 0);
    }

    #[test]
    fn ring_keeps_most_recent_events() {
        let mut recorder = TelemetryRecorder::new();
        recorder.record_characterization(CalibrationSource::FactoryReference);

        for iteration in 0..40u32 {
            let state = if iteration % 2 == 0 {
                ActuatorState::On
            } else {
                ActuatorState::Off
            };
            recorder.record_iteration(&alarm(iteration, state, true));
        }

        assert_eq!(recorder.len(), TELEMETRY_RING_CAPACITY);
        assert_eq!(recorder.transitions(), 40);

        let latest = recorder.latest().copied().unwrap();
        assert_eq!(latest.id, 40);
        assert_eq!(latest.iteration, Some(39));
        assert_eq!(latest.event, TelemetryEventKind::ActuatorOff);
        assert_eq!(
            latest.to_string(),
            "telemetry:#40 actuator-off iter=39 raw=1000"
        );

        let oldest = recorder.oldest_first().next().copied().unwrap();
        assert_eq!(oldest.id, 9, "startup event and first edges were evicted");
    }
}
