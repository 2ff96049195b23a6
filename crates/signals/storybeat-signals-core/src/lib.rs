//! storybeat-signals-core
//!
//! Cooperative, single-threaded plumbing shared by the dialogue, camera and director
//! crates:
//!
//! - [`EventBus`]: string-keyed publish/subscribe with scoped subscriptions.
//! - [`CancelToken`] / [`CancelScope`]: cancellation tied to an owning scope. Cancelling
//!   removes every subscription made through the token right away and aborts the tasks
//!   registered with it.
//! - [`next_signal`]: turns a fire-once notification into a future.
//! - [`SceneClock`] / [`Delay`]: logical time advanced by the host tick.
//!
//! Nothing here is `Send`. All of it is meant to live on the thread that drives the tick.

pub mod awaitable;
pub mod bus;
pub mod cancel;
pub mod clock;
pub mod error;

pub use awaitable::{next_signal, next_signal_matching, SignalFuture};
pub use bus::{EventBus, Subscription, SubscriptionId, WeakBus};
pub use cancel::{CancelScope, CancelToken};
pub use clock::{Delay, SceneClock};
pub use error::SignalError;
pub use storybeat_api::Signal;
