//! Event-to-awaitable conversion.
//!
//! [`next_signal`] registers exactly one handler. When the signal arrives that handler
//! resolves the future and removes itself in the same call; nothing else can resolve
//! the future. If the future is dropped or its token cancelled first, the handler is
//! removed instead and a late notification has nowhere to land.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;
use storybeat_api::Signal;
use tracing::trace;

use crate::bus::{EventBus, Subscription};
use crate::cancel::CancelToken;
use crate::error::SignalError;

/// Resolves with the next matching signal, or with the reason it never will.
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct SignalFuture {
    rx: oneshot::Receiver<Signal>,
    subscription: Option<Subscription>,
    token: CancelToken,
}

/// Await the next signal named `name`.
pub fn next_signal(bus: &EventBus, name: impl Into<String>, token: &CancelToken) -> SignalFuture {
    next_signal_matching(bus, name, token, |_| true)
}

/// Await the next signal named `name` for which `accept` returns true. Rejected
/// signals leave the handler in place.
pub fn next_signal_matching<P>(
    bus: &EventBus,
    name: impl Into<String>,
    token: &CancelToken,
    accept: P,
) -> SignalFuture
where
    P: Fn(&Signal) -> bool + 'static,
{
    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);
    let own_id = Rc::new(Cell::new(None));

    let weak_bus = bus.downgrade();
    let handler_id = Rc::clone(&own_id);
    let handler_token = token.clone();
    let id = bus.subscribe(name, move |signal: &Signal| {
        if !accept(signal) {
            return;
        }
        let Some(tx) = tx.take() else {
            trace!(signal = %signal.name, "stale completion discarded");
            return;
        };
        if let Some(id) = handler_id.take() {
            if let Some(bus) = weak_bus.upgrade() {
                bus.unsubscribe(id);
            }
            handler_token.forget_subscription(id);
        }
        // The receiver may already be gone; that is the same as being cancelled.
        let _ = tx.send(signal.clone());
    });
    own_id.set(Some(id));

    let subscription = bus.guard(id);
    if !token.track_subscription(bus, id) {
        // Already cancelled: the guard drop below removes the handler immediately.
        drop(subscription);
        return SignalFuture {
            rx,
            subscription: None,
            token: token.clone(),
        };
    }

    SignalFuture {
        rx,
        subscription: Some(subscription),
        token: token.clone(),
    }
}

impl SignalFuture {
    fn release(&mut self) {
        if let Some(sub) = self.subscription.take() {
            self.token.forget_subscription(sub.id());
        }
    }

    /// True while the underlying handler is still registered.
    pub fn is_armed(&self) -> bool {
        self.subscription.is_some() && !self.token.is_cancelled()
    }
}

impl Future for SignalFuture {
    type Output = Result<Signal, SignalError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            this.release();
            return Poll::Ready(Err(SignalError::Cancelled));
        }
        match this.rx.poll_unpin(cx) {
            Poll::Ready(Ok(signal)) => {
                this.release();
                Poll::Ready(Ok(signal))
            }
            Poll::Ready(Err(oneshot::Canceled)) => {
                this.release();
                let err = if this.token.is_cancelled() {
                    SignalError::Cancelled
                } else {
                    SignalError::BusDropped
                };
                Poll::Ready(Err(err))
            }
            Poll::Pending => {
                this.token.register_waker(cx.waker());
                Poll::Pending
            }
        }
    }
}

impl Drop for SignalFuture {
    fn drop(&mut self) {
        self.release();
    }
}
