//! Backpressure-aware reactive-streams operators.
//!
//! A small core of non-blocking operators implementing the demand protocol.
//! Values flow downstream through `on_next`; credits and cancellation flow
//! upstream through `request` / `cancel`. The adapters in between are
//! lock-free state machines that emit at most one terminal signal and never
//! more values than were requested, even while cancellation races with
//! emission.
//!
//! The operators: [`ops::amb()`] races sources and commits to the first
//! that signals, [`ops::take_last()`] captures the tail of a stream and
//! replays it post-completion under demand, [`ops::using()`] scopes a
//! resource to a subscription, and [`ops::range()`] generates integers
//! demand by demand.
//! [`defer_scalar::DeferScalar`] is the reusable "one value, once demand
//! arrives" building block.
//!
//! The library imposes no threads of its own; operators run on whichever
//! thread delivers the signal.

pub mod defer_scalar;
pub mod deferred;
mod drain;
pub mod error;
pub mod fusion;
pub mod ops;
pub mod publisher;
pub mod subscriber;
pub mod subscription;
pub mod testing;

pub mod prelude {
  pub use crate::defer_scalar::DeferScalar;
  pub use crate::deferred::DeferredSubscription;
  pub use crate::error::FlowError;
  pub use crate::fusion;
  pub use crate::ops::amb::amb;
  pub use crate::ops::range::range;
  pub use crate::ops::take_last::take_last;
  pub use crate::ops::using::using;
  pub use crate::publisher::{BoxIt, BoxPublisher, Publisher};
  pub use crate::subscriber::Subscriber;
  pub use crate::subscription::{Subscription, Upstream, UNBOUNDED};
}
