//! Clock abstraction
//!
//! The validation gate suspends the reconcile on a clock, never on
//! `tokio::time::sleep` directly, so tests can park the controller on the
//! stabilization TTL and drive it deterministically. Real builds supply
//! [`WallClock`]; tests supply [`FakeClock`] and assert on `has_waiters`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

/// Time source with a waitable sleep
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Suspend until `duration` has elapsed on this clock
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the system time and the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

#[async_trait]
impl Clock for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

struct Waiter {
    deadline: DateTime<Utc>,
    wake: oneshot::Sender<()>,
}

struct FakeState {
    now: DateTime<Utc>,
    auto_advance: Duration,
    waiters: Vec<Waiter>,
}

/// Deterministic clock for tests
///
/// `sleep` parks the caller until `step` (or `set_time`) moves the clock past
/// its deadline. `has_waiters` tells a test "the controller is parked on the
/// TTL right now". An optional auto-advance moves the clock forward by a
/// fixed step on every `now` read, which lets tests expire wall-clock
/// strategy budgets without a second thread.
pub struct FakeClock {
    state: Mutex<FakeState>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                now: start,
                auto_advance: Duration::ZERO,
                waiters: Vec::new(),
            }),
        }
    }

    /// Advance the clock by `step` on every `now` read
    pub fn set_auto_advance(&self, step: Duration) {
        self.state.lock().unwrap().auto_advance = step;
    }

    /// Advance the clock, waking every sleeper whose deadline has passed
    pub fn step(&self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.now = saturating_add(state.now, duration);
        Self::fire_due(&mut state);
    }

    /// Jump the clock to an absolute time
    pub fn set_time(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        state.now = now;
        Self::fire_due(&mut state);
    }

    /// True while at least one sleeper is parked on this clock
    pub fn has_waiters(&self) -> bool {
        !self.state.lock().unwrap().waiters.is_empty()
    }

    fn fire_due(state: &mut FakeState) {
        let now = state.now;
        let due: Vec<Waiter> = {
            let (due, pending) = std::mem::take(&mut state.waiters)
                .into_iter()
                .partition(|w| w.deadline <= now);
            state.waiters = pending;
            due
        };
        for waiter in due {
            let _ = waiter.wake.send(());
        }
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap();
        if !state.auto_advance.is_zero() {
            state.now = saturating_add(state.now, state.auto_advance);
            Self::fire_due(&mut state);
        }
        state.now
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let rx = {
            let mut state = self.state.lock().unwrap();
            let (tx, rx) = oneshot::channel();
            let deadline = saturating_add(state.now, duration);
            state.waiters.push(Waiter {
                deadline,
                wake: tx,
            });
            rx
        };
        // A dropped sender also wakes us, which only ever shortens the sleep
        let _ = rx.await;
    }
}

fn saturating_add(instant: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| instant.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
