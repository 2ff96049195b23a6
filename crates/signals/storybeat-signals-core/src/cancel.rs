//! Cancellation tied to an owning scope.
//!
//! A [`CancelToken`] collects everything a suspended operation left behind: bus
//! subscriptions, abort handles of spawned tasks and wakers of pending futures.
//! `cancel()` tears all of it down synchronously, so once it returns no handler made
//! through the token can observe later notifications.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::task::Waker;

use futures::future::{AbortHandle, AbortRegistration};
use tracing::debug;

use crate::bus::{EventBus, SubscriptionId, WeakBus};

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    subscriptions: Vec<(WeakBus, SubscriptionId)>,
    aborts: Vec<AbortHandle>,
    wakers: Vec<Waker>,
    children: Vec<Weak<RefCell<TokenState>>>,
}

#[derive(Clone, Default)]
pub struct CancelToken {
    state: Rc<RefCell<TokenState>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.borrow().cancelled
    }

    /// Cancel this token and all of its children. Idempotent.
    pub fn cancel(&self) {
        let (subscriptions, aborts, wakers, children) = {
            let mut state = self.state.borrow_mut();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            (
                std::mem::take(&mut state.subscriptions),
                std::mem::take(&mut state.aborts),
                std::mem::take(&mut state.wakers),
                std::mem::take(&mut state.children),
            )
        };
        debug!(
            subscriptions = subscriptions.len(),
            tasks = aborts.len(),
            "cancel token"
        );

        for (bus, id) in subscriptions {
            if let Some(bus) = bus.upgrade() {
                bus.unsubscribe(id);
            }
        }
        for handle in aborts {
            handle.abort();
        }
        for waker in wakers {
            waker.wake();
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            CancelToken { state: child }.cancel();
        }
    }

    /// A token that is cancelled together with `self` but can also be cancelled alone.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        let mut state = self.state.borrow_mut();
        if state.cancelled {
            drop(state);
            child.cancel();
            return child;
        }
        state.children.retain(|c| c.strong_count() > 0);
        state.children.push(Rc::downgrade(&child.state));
        child
    }

    /// Hand out an abort registration for a task owned by this token. A token that is
    /// already cancelled returns a registration that is aborted from the start.
    pub fn abort_registration(&self) -> AbortRegistration {
        let (handle, registration) = AbortHandle::new_pair();
        let mut state = self.state.borrow_mut();
        if state.cancelled {
            handle.abort();
        } else {
            state.aborts.push(handle);
        }
        registration
    }

    /// Remember a subscription so cancellation removes it. Returns `false` (and
    /// remembers nothing) if the token is already cancelled.
    pub(crate) fn track_subscription(&self, bus: &EventBus, id: SubscriptionId) -> bool {
        let mut state = self.state.borrow_mut();
        if state.cancelled {
            return false;
        }
        state.subscriptions.push((bus.downgrade(), id));
        true
    }

    pub(crate) fn forget_subscription(&self, id: SubscriptionId) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.subscriptions.retain(|(_, sid)| *sid != id);
        }
    }

    /// Wake `waker` when the token is cancelled.
    pub fn register_waker(&self, waker: &Waker) {
        let mut state = self.state.borrow_mut();
        if state.cancelled {
            drop(state);
            waker.wake_by_ref();
            return;
        }
        if !state.wakers.iter().any(|w| w.will_wake(waker)) {
            state.wakers.push(waker.clone());
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_subscriptions(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("CancelToken")
            .field("cancelled", &state.cancelled)
            .field("subscriptions", &state.subscriptions.len())
            .field("tasks", &state.aborts.len())
            .finish()
    }
}

/// Owning guard for a [`CancelToken`]: dropping the scope cancels the token.
///
/// Give one to every scene object that starts suspended work; when the object goes away
/// its pending waits go with it.
#[derive(Debug, Default)]
pub struct CancelScope {
    token: CancelToken,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
