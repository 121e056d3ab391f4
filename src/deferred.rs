use std::mem::replace;
use std::sync::{Arc, Mutex};

use crate::subscription::{add_cap, Subscription};

enum Slot {
  /// No upstream yet; demand accumulates here until one arrives.
  Empty { requested: u64 },
  Set(Arc<dyn Subscription>),
  Cancelled,
}

/// Holder for a not-yet-known upstream subscription.
///
/// The downstream may `request` before the upstream exists; the total is
/// accumulated (saturating) and replayed in a single `request` once `set`
/// succeeds. Cancelling before `set` marks the slot so a late upstream is
/// cancelled on arrival instead of installed. Transitions are linearized by
/// one short-lived lock over the slot; calls onto the upstream always happen
/// outside it, so a re-entrant upstream cannot deadlock.
pub struct DeferredSubscription {
  slot: Mutex<Slot>,
}

impl Default for DeferredSubscription {
  fn default() -> Self {
    DeferredSubscription::new()
  }
}

impl DeferredSubscription {
  pub fn new() -> Self {
    DeferredSubscription {
      slot: Mutex::new(Slot::Empty { requested: 0 }),
    }
  }

  /// Installs the upstream, replaying accumulated demand. Returns false when
  /// the slot was already set or cancelled; the newcomer is cancelled in
  /// either case.
  pub fn set(&self, subscription: Arc<dyn Subscription>) -> bool {
    let replay;
    {
      let mut slot = self.slot.lock().unwrap();
      match replace(&mut *slot, Slot::Cancelled) {
        Slot::Empty { requested } => {
          replay = requested;
          *slot = Slot::Set(subscription.clone());
        }
        Slot::Set(existing) => {
          *slot = Slot::Set(existing);
          drop(slot);
          subscription.cancel();
          log::error!("subscription already set, cancelling the newcomer");
          return false;
        }
        Slot::Cancelled => {
          drop(slot);
          subscription.cancel();
          return false;
        }
      }
    }
    if replay > 0 {
      subscription.request(replay);
    }
    true
  }

  /// Forwards demand to the upstream, or accumulates it while none is set.
  pub fn request(&self, n: u64) {
    let target;
    {
      let mut slot = self.slot.lock().unwrap();
      match &mut *slot {
        Slot::Empty { requested } => {
          *requested = add_cap(*requested, n);
          return;
        }
        Slot::Set(s) => target = s.clone(),
        Slot::Cancelled => return,
      }
    }
    target.request(n);
  }

  pub fn cancel(&self) {
    let target;
    {
      let mut slot = self.slot.lock().unwrap();
      match replace(&mut *slot, Slot::Cancelled) {
        Slot::Set(s) => target = s,
        _ => return,
      }
    }
    target.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(*self.slot.lock().unwrap(), Slot::Cancelled)
  }
}

impl Subscription for DeferredSubscription {
  fn request(&self, n: u64) {
    DeferredSubscription::request(self, n)
  }

  fn cancel(&self) {
    DeferredSubscription::cancel(self)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

  #[derive(Default)]
  struct Probe {
    requested: AtomicU64,
    cancelled: AtomicBool,
  }

  impl Subscription for Probe {
    fn request(&self, n: u64) {
      self.requested.fetch_add(n, Ordering::SeqCst);
    }

    fn cancel(&self) {
      self.cancelled.store(true, Ordering::SeqCst);
    }
  }

  #[test]
  fn replays_accumulated_demand_on_set() {
    let deferred = DeferredSubscription::new();
    deferred.request(3);
    deferred.request(4);

    let upstream = Arc::new(Probe::default());
    assert!(deferred.set(upstream.clone()));
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 7);

    // once set, demand goes straight through
    deferred.request(5);
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 12);
  }

  #[test]
  fn second_set_is_cancelled() {
    let deferred = DeferredSubscription::new();
    let first = Arc::new(Probe::default());
    let second = Arc::new(Probe::default());

    assert!(deferred.set(first.clone()));
    assert!(!deferred.set(second.clone()));
    assert!(!first.cancelled.load(Ordering::SeqCst));
    assert!(second.cancelled.load(Ordering::SeqCst));
  }

  #[test]
  fn cancel_before_set_cancels_the_late_upstream() {
    let deferred = DeferredSubscription::new();
    deferred.cancel();

    let upstream = Arc::new(Probe::default());
    assert!(!deferred.set(upstream.clone()));
    assert!(upstream.cancelled.load(Ordering::SeqCst));
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn request_after_cancel_is_dropped() {
    let deferred = DeferredSubscription::new();
    let upstream = Arc::new(Probe::default());
    deferred.set(upstream.clone());
    deferred.cancel();
    deferred.request(9);

    assert!(upstream.cancelled.load(Ordering::SeqCst));
    assert_eq!(upstream.requested.load(Ordering::SeqCst), 0);
  }
}
