//! Idle session enforcement with an advance warning and a user-cancelable
//! grace period.
//!
//! The guard is split in two layers:
//! - [`SessionClock`] is a pure state machine. Every method takes an explicit
//!   `now` and nothing in it sleeps or schedules, so the full transition
//!   table is testable with synthetic instants.
//! - [`SessionGuard`] is the async driver: a spawned task that owns a clock,
//!   takes commands over a channel, sleeps until the clock's next deadline
//!   and forwards emitted [`GuardEvent`]s to the caller.

use anyhow::{bail, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Total idle budget before forced logout.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How long before expiry the warning countdown appears.
pub const DEFAULT_WARNING_LEAD: Duration = Duration::from_secs(5 * 60);

/// Countdown update granularity.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Timer configuration for one guard instance.
#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    pub session_timeout: Duration,
    pub warning_lead: Duration,
    pub tick_interval: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            warning_lead: DEFAULT_WARNING_LEAD,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}

impl GuardConfig {
    /// Checks the invariants the state machine relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if any interval is zero or if the warning lead is
    /// not strictly shorter than the session timeout.
    pub fn validate(&self) -> Result<()> {
        if self.session_timeout.is_zero()
            || self.warning_lead.is_zero()
            || self.tick_interval.is_zero()
        {
            bail!("Session guard intervals must all be non-zero");
        }
        if self.warning_lead >= self.session_timeout {
            bail!(
                "Warning lead ({:?}) must be shorter than the session timeout ({:?})",
                self.warning_lead,
                self.session_timeout
            );
        }
        Ok(())
    }
}

/// Lifecycle state of one authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No session is being watched.
    Inactive,
    /// Session is live; qualifying activity re-arms the full budget.
    Active,
    /// The countdown is showing; passive activity is ignored and only an
    /// explicit continue/logout changes state.
    Warning,
}

/// Notifications the guard emits toward the application shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardEvent {
    /// Entered the warning window, or one countdown tick elapsed.
    Warning { remaining: Duration },
    /// The user chose to continue; the countdown UI should be hidden.
    WarningCleared,
    /// The idle budget ran out. Fired at most once per armed session.
    Expired,
}

/// Pure idle-timeout state machine.
///
/// Owns the three deadline slots (warning, expiry, next countdown tick) as
/// private fields. Every entry point that changes state overwrites all
/// slots it obsoletes in the same call, so two generations of deadlines are
/// never live at once.
#[derive(Debug)]
pub struct SessionClock {
    config: GuardConfig,
    state: GuardState,
    warning_at: Option<Instant>,
    expires_at: Option<Instant>,
    next_tick: Option<Instant>,
    remaining: Duration,
}

impl SessionClock {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            state: GuardState::Inactive,
            warning_at: None,
            expires_at: None,
            next_tick: None,
            remaining: Duration::ZERO,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Time left in the warning countdown. Zero outside [`GuardState::Warning`].
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Arms the clock with a full idle budget, entering `Active`.
    ///
    /// Called on initial authentication. Deadlines are absolute: they are
    /// measured from `now`, not from any previous deadline.
    pub fn start(&mut self, now: Instant) {
        self.arm(now);
    }

    /// Re-arms the full budget. No-op while no session is being watched.
    pub fn reset(&mut self, now: Instant) {
        if self.state == GuardState::Inactive {
            return;
        }
        self.arm(now);
    }

    /// Records a user-presence signal.
    ///
    /// Re-arms the budget only while `Active`. Activity during the warning
    /// window is deliberately ignored so incidental cursor movement cannot
    /// silently dismiss a warning the user should acknowledge.
    pub fn on_activity(&mut self, now: Instant) {
        if self.state == GuardState::Active {
            self.arm(now);
        }
    }

    /// Explicit "continue session" from the warning dialog.
    ///
    /// Valid only in `Warning`: clears the countdown, re-arms the full
    /// budget and returns the [`GuardEvent::WarningCleared`] notification.
    /// In any other state this is a no-op returning `None`.
    pub fn continue_session(&mut self, now: Instant) -> Option<GuardEvent> {
        if self.state != GuardState::Warning {
            return None;
        }
        self.arm(now);
        Some(GuardEvent::WarningCleared)
    }

    /// Explicit logout: tears everything down without emitting `Expired`.
    pub fn stop(&mut self) {
        self.clear();
    }

    /// Fires every transition whose deadline has passed as of `now`.
    ///
    /// A single call drains everything due: the Active→Warning transition,
    /// any number of countdown ticks, and expiry. The countdown path and
    /// the absolute expiry deadline are mutually exclusive; whichever runs
    /// first moves the clock to `Inactive` and the other becomes a no-op by
    /// the state check alone.
    pub fn poll(&mut self, now: Instant) -> Vec<GuardEvent> {
        let mut events = Vec::new();

        if self.state == GuardState::Active {
            if let Some(warning_at) = self.warning_at {
                if now >= warning_at {
                    self.state = GuardState::Warning;
                    self.warning_at = None;
                    self.remaining = self.config.warning_lead;
                    self.next_tick = Some(warning_at + self.config.tick_interval);
                    events.push(GuardEvent::Warning {
                        remaining: self.remaining,
                    });
                }
            }
        }

        if self.state == GuardState::Warning {
            while let Some(tick_at) = self.next_tick {
                if now < tick_at {
                    break;
                }
                match self.remaining.checked_sub(self.config.tick_interval) {
                    Some(left) if !left.is_zero() => {
                        self.remaining = left;
                        self.next_tick = Some(tick_at + self.config.tick_interval);
                        events.push(GuardEvent::Warning { remaining: left });
                    }
                    // A tick that would reach zero or below expires instead,
                    // so the countdown never goes negative.
                    _ => {
                        self.expire(&mut events);
                        break;
                    }
                }
            }
        }

        if self.state != GuardState::Inactive {
            if let Some(expires_at) = self.expires_at {
                if now >= expires_at {
                    self.expire(&mut events);
                }
            }
        }

        events
    }

    /// Earliest pending deadline, for the async driver's sleep.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            GuardState::Inactive => None,
            // The warning deadline always precedes expiry while Active.
            GuardState::Active => self.warning_at,
            GuardState::Warning => match (self.next_tick, self.expires_at) {
                (Some(tick), Some(expiry)) => Some(tick.min(expiry)),
                (tick, expiry) => tick.or(expiry),
            },
        }
    }

    fn arm(&mut self, now: Instant) {
        self.state = GuardState::Active;
        self.warning_at = Some(now + (self.config.session_timeout - self.config.warning_lead));
        self.expires_at = Some(now + self.config.session_timeout);
        self.next_tick = None;
        self.remaining = Duration::ZERO;
    }

    fn expire(&mut self, events: &mut Vec<GuardEvent>) {
        if self.state == GuardState::Inactive {
            return;
        }
        self.clear();
        events.push(GuardEvent::Expired);
    }

    fn clear(&mut self) {
        self.state = GuardState::Inactive;
        self.warning_at = None;
        self.expires_at = None;
        self.next_tick = None;
        self.remaining = Duration::ZERO;
    }
}

#[derive(Debug)]
enum GuardCommand {
    Start,
    Activity,
    Continue(oneshot::Sender<bool>),
    Stop,
}

/// Handle to a running idle guard task.
///
/// Commands are fire-and-forget sends; the task applies them in arrival
/// order, so a `Stop` synchronously supersedes every pending deadline
/// before the next sleep is entered. Dropping the handle closes the command
/// channel and terminates the task.
pub struct SessionGuard {
    cmd_tx: mpsc::UnboundedSender<GuardCommand>,
}

impl SessionGuard {
    /// Spawns the guard task. Emitted events are forwarded to `event_tx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn spawn(
        config: GuardConfig,
        event_tx: mpsc::UnboundedSender<GuardEvent>,
    ) -> Result<Self> {
        config.validate()?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_guard(SessionClock::new(config), cmd_rx, event_tx));
        Ok(Self { cmd_tx })
    }

    /// Arms the guard on successful authentication.
    pub fn start(&self) {
        let _ = self.cmd_tx.send(GuardCommand::Start);
    }

    /// Forwards a user-presence signal. Safe to call in any state.
    pub fn on_activity(&self) {
        let _ = self.cmd_tx.send(GuardCommand::Activity);
    }

    /// Asks the guard to continue the session from the warning dialog.
    ///
    /// Returns `true` if the guard was in the warning window and re-armed.
    pub async fn continue_session(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(GuardCommand::Continue(reply_tx))
            .is_err()
        {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Explicit logout: tears the guard down without an `Expired` event.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(GuardCommand::Stop);
    }
}

async fn run_guard(
    mut clock: SessionClock,
    mut cmd_rx: mpsc::UnboundedReceiver<GuardCommand>,
    event_tx: mpsc::UnboundedSender<GuardEvent>,
) {
    loop {
        let deadline = clock.next_deadline();
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let now = Instant::now();
                match cmd {
                    None => break,
                    Some(GuardCommand::Start) => clock.start(now),
                    Some(GuardCommand::Activity) => clock.on_activity(now),
                    Some(GuardCommand::Continue(reply)) => {
                        let cleared = clock.continue_session(now);
                        if let Some(event) = cleared {
                            let _ = event_tx.send(event);
                        }
                        let _ = reply.send(cleared.is_some());
                    }
                    Some(GuardCommand::Stop) => clock.stop(),
                }
            }
            _ = sleep_or_park(deadline) => {
                let now = Instant::now();
                for event in clock.poll(now) {
                    if event == GuardEvent::Expired {
                        tracing::debug!("idle session expired");
                    }
                    if event_tx.send(event).is_err() {
                        // Receiver gone: nobody is watching this session.
                        return;
                    }
                }
            }
        }
    }
}

async fn sleep_or_park(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "session_guard_tests.rs"]
mod tests;
