use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::FlowError;
use crate::fusion::QueueSubscription;
use crate::subscriber::Subscriber;

/// Demand sentinel treated as effectively unbounded. Accumulation saturates
/// here; the bit above it is reserved for post-complete bookkeeping.
pub const UNBOUNDED: u64 = i64::MAX as u64;

/// Demand and cancellation channel handed to a subscriber.
///
/// Both operations may be invoked from any thread, concurrently with signal
/// delivery and with each other. `cancel` is idempotent; `request` after
/// `cancel` is a no-op.
pub trait Subscription: Send + Sync {
  /// Grants `n` additional delivery credits. `n` must be positive.
  fn request(&self, n: u64);

  /// Revokes interest. Signals already past their cancellation check may
  /// still arrive.
  fn cancel(&self);
}

/// The upstream handle delivered by `on_subscribe`: either a plain
/// subscription or one that also offers the queue-fusion capability.
pub enum Upstream<T> {
  Plain(Arc<dyn Subscription>),
  Fused(Arc<dyn QueueSubscription<T>>),
}

impl<T> Upstream<T> {
  pub fn request(&self, n: u64) {
    match self {
      Upstream::Plain(s) => s.request(n),
      Upstream::Fused(s) => s.request(n),
    }
  }

  pub fn cancel(&self) {
    match self {
      Upstream::Plain(s) => s.cancel(),
      Upstream::Fused(s) => s.cancel(),
    }
  }

  /// Views the handle as a plain subscription, erasing fusion capability.
  pub fn into_subscription(self) -> Arc<dyn Subscription> {
    match self {
      Upstream::Plain(s) => s,
      Upstream::Fused(s) => s,
    }
  }
}

impl<T> Clone for Upstream<T> {
  fn clone(&self) -> Self {
    match self {
      Upstream::Plain(s) => Upstream::Plain(s.clone()),
      Upstream::Fused(s) => Upstream::Fused(s.clone()),
    }
  }
}

/// Subscription with no demand or cancellation effect, handed to subscribers
/// that terminate before any upstream exists.
#[derive(Clone, Copy, Default)]
pub struct EmptySubscription;

impl Subscription for EmptySubscription {
  fn request(&self, _n: u64) {}

  fn cancel(&self) {}
}

/// Terminates `subscriber` with `err` before any upstream was attached:
/// a no-op `on_subscribe` followed by the error.
pub fn error<S: Subscriber>(subscriber: &S, err: FlowError) {
  subscriber.on_subscribe(Upstream::Plain(Arc::new(EmptySubscription)));
  subscriber.on_error(err);
}

/// Completes `subscriber` before any upstream was attached.
pub fn complete<S: Subscriber>(subscriber: &S) {
  subscriber.on_subscribe(Upstream::Plain(Arc::new(EmptySubscription)));
  subscriber.on_complete();
}

/// Validates requested demand, signalling `BadDemand` downstream when zero.
pub fn validate_demand<S: Subscriber>(n: u64, subscriber: &S) -> bool {
  if n == 0 {
    subscriber.on_error(FlowError::BadDemand);
    return false;
  }
  true
}

/// `min(current + n, UNBOUNDED)`.
pub fn add_cap(current: u64, n: u64) -> u64 {
  current.saturating_add(n).min(UNBOUNDED)
}

/// Atomically accumulates demand with saturation, returning the previous
/// value. A zero return means the caller found the counter idle and owns
/// whatever drain the operator attaches to that event.
pub fn add_demand(requested: &AtomicU64, n: u64) -> u64 {
  let mut current = requested.load(Ordering::Relaxed);
  loop {
    if current == UNBOUNDED {
      return current;
    }
    let next = add_cap(current, n);
    match requested.compare_exchange_weak(
      current,
      next,
      Ordering::AcqRel,
      Ordering::Relaxed,
    ) {
      Ok(_) => return current,
      Err(observed) => current = observed,
    }
  }
}

/// First-time upstream assignment. A second assignment is a protocol
/// violation: the newcomer is cancelled and the violation logged.
pub fn set_once(
  slot: &Mutex<Option<Arc<dyn Subscription>>>,
  subscription: Arc<dyn Subscription>,
) -> bool {
  {
    let mut current = slot.lock().unwrap();
    if current.is_none() {
      *current = Some(subscription);
      return true;
    }
  }
  subscription.cancel();
  log::error!("subscription already set, cancelling the newcomer");
  false
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::atomic::AtomicBool;

  struct Probe {
    cancelled: AtomicBool,
  }

  impl Subscription for Probe {
    fn request(&self, _n: u64) {}

    fn cancel(&self) {
      self.cancelled.store(true, Ordering::SeqCst);
    }
  }

  #[test]
  fn add_cap_saturates() {
    assert_eq!(add_cap(1, 2), 3);
    assert_eq!(add_cap(UNBOUNDED - 1, 10), UNBOUNDED);
    assert_eq!(add_cap(UNBOUNDED, UNBOUNDED), UNBOUNDED);
  }

  #[test]
  fn add_demand_returns_previous() {
    let requested = AtomicU64::new(0);
    assert_eq!(add_demand(&requested, 5), 0);
    assert_eq!(add_demand(&requested, 7), 5);
    assert_eq!(requested.load(Ordering::SeqCst), 12);
  }

  #[test]
  fn add_demand_sticks_at_unbounded() {
    let requested = AtomicU64::new(0);
    add_demand(&requested, UNBOUNDED);
    add_demand(&requested, 3);
    assert_eq!(requested.load(Ordering::SeqCst), UNBOUNDED);
  }

  #[test]
  fn set_once_rejects_second_subscription() {
    let slot = Mutex::new(None);
    let first = Arc::new(Probe {
      cancelled: AtomicBool::new(false),
    });
    let second = Arc::new(Probe {
      cancelled: AtomicBool::new(false),
    });

    assert!(set_once(&slot, first.clone()));
    assert!(!set_once(&slot, second.clone()));
    assert!(!first.cancelled.load(Ordering::SeqCst));
    assert!(second.cancelled.load(Ordering::SeqCst));
  }
}
