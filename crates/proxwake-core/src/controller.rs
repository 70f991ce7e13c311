//! The presence controller: one cooperative loop around the scheduler,
//! matcher and wake trigger.
//!
//! Radio events and timer ticks are handled one at a time on a single task,
//! so none of the state here needs locking. Status snapshots go out through
//! a [`watch`] channel for anyone who wants to observe the loop.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, trace, warn};

use crate::clock::Clock;
use crate::config::ControllerSettings;
use crate::matcher::{normalize_address, DeviceMatcher};
use crate::radio::{Radio, RadioError, RadioEvent};
use crate::scheduler::{ScanScheduler, Transition, TransitionReason};
use crate::types::{Millis, ScanKind};
use crate::wake::{NetworkLink, WakeOutcome, WakeTrigger};

/// Default interval between scheduler ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Snapshot of what the controller is doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStatus {
    /// Active scan kind.
    pub phase: ScanKind,

    /// Classic inquiry cycles left in the current Classic phase.
    pub cycles_remaining: u32,

    /// Discovery events received.
    pub discoveries: u64,

    /// Discoveries that were on an allow-list.
    pub matches: u64,

    /// Magic packets sent.
    pub wakes_sent: u64,

    /// Matches that fell inside the cooldown.
    pub wakes_suppressed: u64,

    /// Wake attempts that failed on the network side.
    pub wake_failures: u64,

    /// Scan start/stop failures.
    pub radio_errors: u64,

    /// Monotonic time of the last magic packet.
    pub last_wake_at_ms: Option<Millis>,

    /// Wall-clock time of the last magic packet.
    pub last_wake_at_utc: Option<DateTime<Utc>>,

    /// Last authorized address seen, lowercase.
    pub last_match: Option<String>,
}

impl ControllerStatus {
    fn new(phase: ScanKind) -> Self {
        Self {
            phase,
            cycles_remaining: 0,
            discoveries: 0,
            matches: 0,
            wakes_sent: 0,
            wakes_suppressed: 0,
            wake_failures: 0,
            radio_errors: 0,
            last_wake_at_ms: None,
            last_wake_at_utc: None,
            last_match: None,
        }
    }
}

/// What happened to one discovered address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Not on the allow-list for its scan kind.
    Unauthorized,
    /// Authorized; the wake trigger sent or suppressed.
    Wake(WakeOutcome),
    /// Authorized, but the magic packet could not be sent.
    WakeFailed,
}

enum Step {
    Shutdown,
    Event(Option<RadioEvent>),
    Tick,
}

/// Drives scanning and wakes the PC when an authorized device shows up.
pub struct PresenceController<R, L, C> {
    radio: R,
    clock: C,
    matcher: DeviceMatcher,
    trigger: WakeTrigger<L>,
    scheduler: ScanScheduler,
    status: ControllerStatus,
    status_tx: watch::Sender<ControllerStatus>,
}

impl<R, L, C> PresenceController<R, L, C>
where
    R: Radio,
    L: NetworkLink,
    C: Clock,
{
    /// Build a controller from validated settings and its collaborators.
    pub fn new(settings: &ControllerSettings, radio: R, link: L, clock: C) -> Self {
        let now = clock.now();
        let scheduler = ScanScheduler::new(settings.timing, now);
        let status = ControllerStatus::new(scheduler.phase());
        let (status_tx, _) = watch::channel(status.clone());

        Self {
            radio,
            clock,
            matcher: DeviceMatcher::new(settings.allow_lists.clone()),
            trigger: WakeTrigger::new(
                link,
                settings.pc_mac,
                settings.broadcast,
                settings.wake_cooldown_ms,
            ),
            scheduler,
            status,
            status_tx,
        }
    }

    /// Receive status snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status_tx.subscribe()
    }

    /// The latest status.
    #[must_use]
    pub const fn status(&self) -> &ControllerStatus {
        &self.status
    }

    /// The scan scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &ScanScheduler {
        &self.scheduler
    }

    /// The wake trigger.
    #[must_use]
    pub const fn trigger(&self) -> &WakeTrigger<L> {
        &self.trigger
    }

    /// The radio.
    #[must_use]
    pub const fn radio(&self) -> &R {
        &self.radio
    }

    /// Begin the first BLE phase.
    pub async fn start(&mut self) {
        let now = self.clock.now();
        self.scheduler = ScanScheduler::new(*self.scheduler.timing(), now);
        info!(
            ble_devices = self.matcher.allow_lists().ble.len(),
            classic_devices = self.matcher.allow_lists().classic.len(),
            "Presence detection started"
        );
        if let Err(e) = self.radio.start_scan(ScanKind::Ble).await {
            self.radio_failed(&e);
        }
        self.publish();
    }

    /// Apply any transition that is due on time alone.
    pub async fn tick(&mut self) -> Option<Transition> {
        let transition = self.scheduler.poll(self.clock.now())?;
        self.apply(transition).await;
        Some(transition)
    }

    /// Dispatch one radio event.
    pub async fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Discovered { address, kind } => {
                self.on_discovery(&address, kind);
            }
            RadioEvent::InquiryCycleComplete => {
                self.on_cycle_complete().await;
            }
        }
    }

    /// Match one discovered address and wake the PC if it is authorized.
    ///
    /// Scanning is never paused, whatever the outcome.
    pub fn on_discovery(&mut self, address: &str, kind: ScanKind) -> DiscoveryOutcome {
        self.status.discoveries += 1;

        if !self.matcher.is_authorized(address, kind) {
            trace!(%address, %kind, "Ignoring unlisted device");
            return DiscoveryOutcome::Unauthorized;
        }

        let now = self.clock.now();
        self.status.matches += 1;
        self.status.last_match = normalize_address(address);
        info!(%address, %kind, "Authorized device detected");

        let outcome = match self.trigger.attempt_wake(now) {
            Ok(outcome @ WakeOutcome::Sent { at }) => {
                self.status.wakes_sent += 1;
                self.status.last_wake_at_ms = Some(at);
                self.status.last_wake_at_utc = Some(Utc::now());
                DiscoveryOutcome::Wake(outcome)
            }
            Ok(outcome @ WakeOutcome::Suppressed { .. }) => {
                self.status.wakes_suppressed += 1;
                DiscoveryOutcome::Wake(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Wake attempt failed; next detection will retry");
                self.status.wake_failures += 1;
                DiscoveryOutcome::WakeFailed
            }
        };
        self.publish();
        outcome
    }

    /// Count one Classic inquiry cycle and switch back to BLE if it was the last.
    pub async fn on_cycle_complete(&mut self) -> Option<Transition> {
        let now = self.clock.now();
        let transition = self.scheduler.on_cycle_complete(now);
        match transition {
            Some(t) => self.apply(t).await,
            None => self.publish(),
        }
        transition
    }

    /// Run until `shutdown` resolves, then stop the active scan.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError::Closed`] if the radio stops delivering events.
    pub async fn run<F>(&mut self, tick_interval: Duration, shutdown: F) -> Result<(), RadioError>
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        self.start().await;

        loop {
            let step = tokio::select! {
                () = &mut shutdown => Step::Shutdown,
                event = self.radio.next_event() => Step::Event(event),
                _ = ticker.tick() => Step::Tick,
            };

            match step {
                Step::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Step::Event(Some(event)) => self.handle_event(event).await,
                Step::Event(None) => {
                    self.stop_active().await;
                    return Err(RadioError::Closed);
                }
                Step::Tick => {
                    self.tick().await;
                }
            }
        }

        self.stop_active().await;
        Ok(())
    }

    #[instrument(skip_all, fields(from = %transition.from, to = %transition.to))]
    async fn apply(&mut self, transition: Transition) {
        if transition.reason == TransitionReason::ClassicStalled {
            warn!("Classic inquiry stopped reporting cycles; returning to BLE");
        } else {
            debug!(reason = %transition.reason, "Switching scan phase");
        }

        if let Err(e) = self.radio.stop_scan(transition.from).await {
            self.radio_failed(&e);
        }
        if let Err(e) = self.radio.start_scan(transition.to).await {
            self.radio_failed(&e);
        }
        self.publish();
    }

    async fn stop_active(&mut self) {
        let phase = self.scheduler.phase();
        if let Err(e) = self.radio.stop_scan(phase).await {
            self.radio_failed(&e);
        }
    }

    fn radio_failed(&mut self, error: &RadioError) {
        warn!(%error, "Radio command failed; scheduling continues");
        self.status.radio_errors += 1;
    }

    fn publish(&mut self) {
        let state = self.scheduler.state();
        self.status.phase = state.phase;
        self.status.cycles_remaining = state.cycles_remaining;
        self.status_tx.send_replace(self.status.clone());
    }
}
