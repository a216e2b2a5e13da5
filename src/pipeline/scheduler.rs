//! Refresh scheduler
//!
//! Emits [`RefreshTick`]s on a fixed period while running and drives the
//! seconds-until-refresh countdown. Pausing drops both timers; resuming
//! starts a fresh full period without an immediate fetch. Only the very
//! first activation emits an eager tick.
//!
//! ```text
//!   t=0      eager tick (generation 1), countdown N
//!   t=1..    countdown N-1 .. 1
//!   t=N      tick, countdown back to N
//!   pause    timers dropped, countdown 0
//!   resume   next tick one full period later
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::defaults::TICK_CHANNEL_CAPACITY;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Running,
    Paused,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Paused => write!(f, "paused"),
        }
    }
}

/// Request to fetch a fresh batch. Generations strictly increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTick {
    pub generation: u64,
}

/// Control surface for a running scheduler. Cheap to clone.
#[derive(Clone)]
pub struct SchedulerHandle {
    control: Arc<watch::Sender<SchedulerState>>,
    countdown: watch::Receiver<u64>,
}

impl SchedulerHandle {
    pub fn pause(&self) {
        if self.control.send_replace(SchedulerState::Paused) != SchedulerState::Paused {
            info!("Refresh scheduler paused");
        }
    }

    pub fn resume(&self) {
        if self.control.send_replace(SchedulerState::Running) != SchedulerState::Running {
            info!("Refresh scheduler resumed");
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.control.borrow()
    }

    /// Seconds until the next refresh; 0 while paused.
    pub fn countdown(&self) -> watch::Receiver<u64> {
        self.countdown.clone()
    }

    pub fn seconds_until_refresh(&self) -> u64 {
        *self.countdown.borrow()
    }
}

pub struct RefreshScheduler {
    interval: Duration,
    control: watch::Receiver<SchedulerState>,
    countdown: watch::Sender<u64>,
    ticks: mpsc::Sender<RefreshTick>,
    generation: u64,
    activated: bool,
}

impl RefreshScheduler {
    /// Build a scheduler in the Running state. Nothing happens until
    /// [`run`](Self::run) is awaited.
    pub fn new(interval: Duration) -> (Self, SchedulerHandle, mpsc::Receiver<RefreshTick>) {
        let interval = interval.max(COUNTDOWN_PERIOD);
        let (control_tx, control_rx) = watch::channel(SchedulerState::Running);
        let (countdown_tx, countdown_rx) = watch::channel(countdown_start(interval));
        let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);

        let scheduler = Self {
            interval,
            control: control_rx,
            countdown: countdown_tx,
            ticks: tick_tx,
            generation: 0,
            activated: false,
        };
        let handle = SchedulerHandle {
            control: Arc::new(control_tx),
            countdown: countdown_rx,
        };
        (scheduler, handle, tick_rx)
    }

    /// Run until cancelled, until the tick receiver is dropped, or until
    /// every handle is dropped while paused.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Refresh scheduler started"
        );
        let mut handles_alive = true;

        loop {
            let state = *self.control.borrow_and_update();
            match state {
                SchedulerState::Running => match self.run_active(&cancel, &mut handles_alive).await {
                    Activity::Paused => continue,
                    Activity::Stopped => break,
                },
                SchedulerState::Paused => {
                    self.countdown.send_replace(0);
                    if !handles_alive {
                        break;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        changed = self.control.changed() => {
                            if changed.is_err() {
                                debug!("All scheduler handles dropped while paused");
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!(last_generation = self.generation, "Refresh scheduler stopped");
    }

    async fn run_active(&mut self, cancel: &CancellationToken, handles_alive: &mut bool) -> Activity {
        if !self.activated {
            self.activated = true;
            if !self.emit() {
                return Activity::Stopped;
            }
        }

        let full = countdown_start(self.interval);
        let start = Instant::now();
        let mut refresh = interval_at(start + self.interval, self.interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut countdown = interval_at(start + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut remaining = full;
        self.countdown.send_replace(remaining);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Activity::Stopped,

                changed = self.control.changed(), if *handles_alive => {
                    if changed.is_err() {
                        *handles_alive = false;
                    } else if *self.control.borrow_and_update() == SchedulerState::Paused {
                        return Activity::Paused;
                    }
                }

                _ = refresh.tick() => {
                    if !self.emit() {
                        return Activity::Stopped;
                    }
                    countdown.reset();
                    remaining = full;
                    self.countdown.send_replace(remaining);
                }

                _ = countdown.tick() => {
                    remaining = remaining.saturating_sub(1).max(1);
                    self.countdown.send_replace(remaining);
                }
            }
        }
    }

    /// Send the next tick. False once the receiver is gone.
    fn emit(&mut self) -> bool {
        self.generation += 1;
        let tick = RefreshTick {
            generation: self.generation,
        };
        match self.ticks.try_send(tick) {
            Ok(()) => {
                debug!(generation = tick.generation, "Refresh tick");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(generation = tick.generation, "Engine is behind, refresh tick dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Tick receiver dropped");
                false
            }
        }
    }
}

enum Activity {
    Paused,
    Stopped,
}

fn countdown_start(interval: Duration) -> u64 {
    interval.as_secs().max(1)
}
