//! BLE / Classic scan alternation.
//!
//! The radio can only do one kind of discovery at a time, so scanning
//! alternates: BLE for a fixed dwell time, then Classic inquiry for a fixed
//! number of inquiry cycles, then back to BLE, forever.
//!
//! The scheduler owns no I/O. It turns ticks and cycle-complete events into
//! [`Transition`]s; the controller applies them to the radio. Transition
//! conditions live in [`next_transition`], a pure function of the state and
//! the current time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::radio::CLASSIC_INQUIRY_CYCLE_MS;
use crate::types::{Millis, ScanKind};

/// How many nominal inquiry cycles' worth of time the Classic phase may
/// run without cycle reports before it is abandoned.
const CLASSIC_STALL_FACTOR: u64 = 2;

/// Phase timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTiming {
    /// BLE dwell time before switching to Classic.
    pub switch_time_ms: Millis,

    /// Classic inquiry cycles per Classic phase.
    pub classic_cycles: u32,
}

impl ScanTiming {
    /// Longest the Classic phase may last if cycle reports stop arriving.
    #[must_use]
    pub fn classic_stall_ms(&self) -> Millis {
        u64::from(self.classic_cycles.max(1)) * CLASSIC_INQUIRY_CYCLE_MS * CLASSIC_STALL_FACTOR
    }
}

/// Why the phase changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// BLE dwell time elapsed.
    SwitchTimeElapsed,
    /// All Classic inquiry cycles completed.
    CyclesExhausted,
    /// Classic phase deadline passed without enough cycle reports.
    ClassicStalled,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwitchTimeElapsed => write!(f, "switch time elapsed"),
            Self::CyclesExhausted => write!(f, "inquiry cycles exhausted"),
            Self::ClassicStalled => write!(f, "inquiry stalled"),
        }
    }
}

/// A phase change the radio must follow: stop `from`, start `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Phase being left.
    pub from: ScanKind,
    /// Phase being entered.
    pub to: ScanKind,
    /// What caused it.
    pub reason: TransitionReason,
    /// When it happened.
    pub at: Millis,
}

/// Current phase and its timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    /// Active scan kind.
    pub phase: ScanKind,
    /// When the active phase began.
    pub phase_started: Millis,
    /// When the active phase ends on time alone.
    pub phase_deadline: Millis,
    /// Classic inquiry cycles left; zero during BLE.
    pub cycles_remaining: u32,
}

impl ScheduleState {
    fn enter(phase: ScanKind, now: Millis, timing: &ScanTiming) -> Self {
        match phase {
            ScanKind::Ble => Self {
                phase,
                phase_started: now,
                phase_deadline: now.saturating_add(timing.switch_time_ms),
                cycles_remaining: 0,
            },
            ScanKind::Classic => Self {
                phase,
                phase_started: now,
                phase_deadline: now.saturating_add(timing.classic_stall_ms()),
                cycles_remaining: timing.classic_cycles,
            },
        }
    }
}

/// Decide whether `state` must change phase at `now`.
///
/// In Classic, cycle exhaustion is checked before the stall deadline, so
/// when both hold the reason is [`TransitionReason::CyclesExhausted`].
#[must_use]
pub const fn next_transition(state: &ScheduleState, now: Millis) -> Option<TransitionReason> {
    match state.phase {
        ScanKind::Ble => {
            if now >= state.phase_deadline {
                Some(TransitionReason::SwitchTimeElapsed)
            } else {
                None
            }
        }
        ScanKind::Classic => {
            if state.cycles_remaining == 0 {
                Some(TransitionReason::CyclesExhausted)
            } else if now >= state.phase_deadline {
                Some(TransitionReason::ClassicStalled)
            } else {
                None
            }
        }
    }
}

/// The BLE / Classic alternation state machine. Starts in BLE.
#[derive(Debug, Clone)]
pub struct ScanScheduler {
    timing: ScanTiming,
    state: ScheduleState,
}

impl ScanScheduler {
    /// Start a schedule whose first BLE phase begins at `now`.
    #[must_use]
    pub fn new(timing: ScanTiming, now: Millis) -> Self {
        Self {
            timing,
            state: ScheduleState::enter(ScanKind::Ble, now, &timing),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ScheduleState {
        &self.state
    }

    /// Active scan kind.
    #[must_use]
    pub const fn phase(&self) -> ScanKind {
        self.state.phase
    }

    /// Timing in force.
    #[must_use]
    pub const fn timing(&self) -> &ScanTiming {
        &self.timing
    }

    /// Advance on time alone.
    pub fn poll(&mut self, now: Millis) -> Option<Transition> {
        let reason = next_transition(&self.state, now)?;
        Some(self.switch(reason, now))
    }

    /// Count one finished Classic inquiry cycle.
    ///
    /// Reports arriving outside the Classic phase are stale and ignored.
    pub fn on_cycle_complete(&mut self, now: Millis) -> Option<Transition> {
        if self.state.phase != ScanKind::Classic {
            return None;
        }
        self.state.cycles_remaining = self.state.cycles_remaining.saturating_sub(1);
        self.poll(now)
    }

    fn switch(&mut self, reason: TransitionReason, now: Millis) -> Transition {
        let from = self.state.phase;
        let to = from.other();
        self.state = ScheduleState::enter(to, now, &self.timing);
        Transition {
            from,
            to,
            reason,
            at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: ScanTiming = ScanTiming {
        switch_time_ms: 10_000,
        classic_cycles: 5,
    };

    #[test]
    fn test_starts_in_ble() {
        let scheduler = ScanScheduler::new(TIMING, 0);
        assert_eq!(scheduler.phase(), ScanKind::Ble);
        assert_eq!(scheduler.state().phase_deadline, 10_000);
        assert_eq!(scheduler.state().cycles_remaining, 0);
    }

    #[test]
    fn test_ble_switches_after_switch_time() {
        let mut scheduler = ScanScheduler::new(TIMING, 500);
        assert_eq!(scheduler.poll(10_499), None);

        let transition = scheduler.poll(10_500).unwrap();
        assert_eq!(transition.from, ScanKind::Ble);
        assert_eq!(transition.to, ScanKind::Classic);
        assert_eq!(transition.reason, TransitionReason::SwitchTimeElapsed);
        assert_eq!(scheduler.phase(), ScanKind::Classic);
        assert_eq!(scheduler.state().cycles_remaining, 5);
    }

    #[test]
    fn test_full_alternation() {
        let mut scheduler = ScanScheduler::new(TIMING, 0);
        scheduler.poll(10_000).unwrap();

        for i in 1..5 {
            assert_eq!(scheduler.on_cycle_complete(10_000 + i * 1_280), None);
            assert_eq!(scheduler.phase(), ScanKind::Classic);
        }
        let back = scheduler.on_cycle_complete(16_400).unwrap();
        assert_eq!(back.to, ScanKind::Ble);
        assert_eq!(back.reason, TransitionReason::CyclesExhausted);
        assert_eq!(scheduler.state().phase_started, 16_400);

        assert_eq!(scheduler.poll(26_399), None);
        assert_eq!(scheduler.poll(26_400).unwrap().to, ScanKind::Classic);
        assert_eq!(scheduler.state().cycles_remaining, 5);
    }

    #[test]
    fn test_classic_does_not_leave_on_time_before_stall_deadline() {
        let mut scheduler = ScanScheduler::new(TIMING, 0);
        scheduler.poll(10_000).unwrap();
        assert_eq!(scheduler.poll(10_000 + 12_799), None);
        assert_eq!(scheduler.phase(), ScanKind::Classic);
    }

    #[test]
    fn test_stalled_classic_phase_returns_to_ble() {
        let mut scheduler = ScanScheduler::new(TIMING, 0);
        scheduler.poll(10_000).unwrap();
        let transition = scheduler.poll(10_000 + TIMING.classic_stall_ms()).unwrap();
        assert_eq!(transition.reason, TransitionReason::ClassicStalled);
        assert_eq!(scheduler.phase(), ScanKind::Ble);
    }

    #[test]
    fn test_cycle_completion_wins_over_deadline() {
        let mut scheduler = ScanScheduler::new(
            ScanTiming {
                switch_time_ms: 1_000,
                classic_cycles: 1,
            },
            0,
        );
        scheduler.poll(1_000).unwrap();
        let late = 1_000 + 10 * CLASSIC_INQUIRY_CYCLE_MS;
        let transition = scheduler.on_cycle_complete(late).unwrap();
        assert_eq!(transition.reason, TransitionReason::CyclesExhausted);
    }

    #[test]
    fn test_cycle_reports_during_ble_are_ignored() {
        let mut scheduler = ScanScheduler::new(TIMING, 0);
        assert_eq!(scheduler.on_cycle_complete(100), None);
        assert_eq!(scheduler.phase(), ScanKind::Ble);
        assert_eq!(scheduler.state().cycles_remaining, 0);
    }

    #[test]
    fn test_zero_cycles_leaves_classic_on_next_poll() {
        let mut scheduler = ScanScheduler::new(
            ScanTiming {
                switch_time_ms: 100,
                classic_cycles: 0,
            },
            0,
        );
        scheduler.poll(100).unwrap();
        assert_eq!(scheduler.phase(), ScanKind::Classic);
        let transition = scheduler.poll(100).unwrap();
        assert_eq!(transition.reason, TransitionReason::CyclesExhausted);
    }

    #[test]
    fn test_next_transition_is_pure() {
        let state = ScheduleState {
            phase: ScanKind::Classic,
            phase_started: 0,
            phase_deadline: 50,
            cycles_remaining: 0,
        };
        assert_eq!(
            next_transition(&state, 100),
            Some(TransitionReason::CyclesExhausted)
        );
        assert_eq!(
            next_transition(&ScheduleState { cycles_remaining: 2, ..state }, 100),
            Some(TransitionReason::ClassicStalled)
        );
        assert_eq!(
            next_transition(&ScheduleState { cycles_remaining: 2, ..state }, 10),
            None
        );
    }
}
