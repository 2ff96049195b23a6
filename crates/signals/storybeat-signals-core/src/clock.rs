//! Logical scene time and fixed-duration waits.
//!
//! Time only moves when the host calls [`SceneClock::advance`] from its tick, so waits
//! are deterministic and independent of wall-clock time.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::cancel::CancelToken;
use crate::error::SignalError;

struct Waiter {
    id: u64,
    deadline: f64,
    waker: Waker,
}

#[derive(Default)]
struct ClockState {
    now: f64,
    next_wait: u64,
    waiters: Vec<Waiter>,
}

#[derive(Clone, Default)]
pub struct SceneClock {
    state: Rc<RefCell<ClockState>>,
}

impl SceneClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds of scene time elapsed since the clock was created.
    pub fn now(&self) -> f64 {
        self.state.borrow().now
    }

    /// Move time forward by `dt` seconds and wake every wait that became due.
    /// Negative steps are ignored.
    pub fn advance(&self, dt: f32) {
        let due: Vec<Waker> = {
            let mut state = self.state.borrow_mut();
            state.now += f64::from(dt.max(0.0));
            let now = state.now;
            let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.waiters)
                .into_iter()
                .partition(|w| w.deadline <= now);
            state.waiters = pending;
            due.into_iter().map(|w| w.waker).collect()
        };
        for waker in due {
            waker.wake();
        }
    }

    /// A future that resolves once `seconds` of scene time have passed, or with
    /// [`SignalError::Cancelled`] when `token` is cancelled first. Dropping the
    /// future removes its wait from the clock.
    pub fn delay(&self, seconds: f32, token: &CancelToken) -> Delay {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_wait += 1;
            state.next_wait
        };
        Delay {
            clock: self.clone(),
            id,
            deadline: self.now() + f64::from(seconds.max(0.0)),
            token: token.clone(),
        }
    }

    fn register(&self, id: u64, deadline: f64, waker: &Waker) {
        let mut state = self.state.borrow_mut();
        match state.waiters.iter_mut().find(|w| w.id == id) {
            Some(waiter) => {
                if !waiter.waker.will_wake(waker) {
                    waiter.waker = waker.clone();
                }
            }
            None => state.waiters.push(Waiter {
                id,
                deadline,
                waker: waker.clone(),
            }),
        }
    }

    fn forget(&self, id: u64) {
        self.state.borrow_mut().waiters.retain(|w| w.id != id);
    }

    pub fn pending_waits(&self) -> usize {
        self.state.borrow().waiters.len()
    }
}

impl fmt::Debug for SceneClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SceneClock")
            .field("now", &state.now)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// Fixed-duration wait on a [`SceneClock`].
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct Delay {
    clock: SceneClock,
    id: u64,
    deadline: f64,
    token: CancelToken,
}

impl Delay {
    pub fn deadline(&self) -> f64 {
        self.deadline
    }
}

impl Future for Delay {
    type Output = Result<(), SignalError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.token.is_cancelled() {
            return Poll::Ready(Err(SignalError::Cancelled));
        }
        if self.clock.now() >= self.deadline {
            return Poll::Ready(Ok(()));
        }
        self.clock.register(self.id, self.deadline, cx.waker());
        self.token.register_waker(cx.waker());
        Poll::Pending
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        self.clock.forget(self.id);
    }
}
