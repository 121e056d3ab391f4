use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_utils::atomic::AtomicCell;

use crate::subscriber::Subscriber;
use crate::subscription::{validate_demand, Subscription};

const NO_REQUEST_NO_VALUE: u8 = 0;
const NO_REQUEST_HAS_VALUE: u8 = 1;
const HAS_REQUEST_NO_VALUE: u8 = 2;
const HAS_REQUEST_HAS_VALUE: u8 = 3;

/// At-most-one deferred emission.
///
/// Coordinates a value that becomes available before or after downstream
/// demand: whichever of `complete(value)` and `request(n)` arrives second
/// performs the single `on_next` + `on_complete` pair. A four-state machine
/// on one atomic decides the race; `cancel` jumps straight to the terminal
/// state and inhibits any future emission.
///
/// Operators that capture a value during upstream emission (`take_last(1)`)
/// park it with `store` first, which never emits, and later promote it with
/// `complete`. Upstream errors bypass the machine entirely: the embedding
/// operator forwards them to `actual()` directly.
pub struct DeferScalar<T, D> {
  actual: D,
  state: AtomicU8,
  value: AtomicCell<Option<T>>,
}

impl<T, D> DeferScalar<T, D>
where
  T: Send,
  D: Subscriber<Item = T>,
{
  pub fn new(actual: D) -> Self {
    DeferScalar {
      actual,
      state: AtomicU8::new(NO_REQUEST_NO_VALUE),
      value: AtomicCell::new(None),
    }
  }

  /// The wrapped downstream subscriber.
  pub fn actual(&self) -> &D {
    &self.actual
  }

  /// Parks `value` without emitting or transitioning; a later `complete`
  /// picks it up through `take`.
  pub fn store(&self, value: T) {
    self.value.store(Some(value));
  }

  /// Removes a parked value.
  pub fn take(&self) -> Option<T> {
    self.value.take()
  }

  /// Provides the single value: emits now when demand already exists, parks
  /// the value otherwise. No-op once terminal.
  pub fn complete(&self, mut value: T) {
    loop {
      match self.state.load(Ordering::Acquire) {
        HAS_REQUEST_NO_VALUE => {
          if self
            .state
            .compare_exchange(
              HAS_REQUEST_NO_VALUE,
              HAS_REQUEST_HAS_VALUE,
              Ordering::AcqRel,
              Ordering::Acquire,
            )
            .is_ok()
          {
            self.actual.on_next(value);
            self.actual.on_complete();
            return;
          }
        }
        NO_REQUEST_NO_VALUE => {
          self.value.store(Some(value));
          if self
            .state
            .compare_exchange(
              NO_REQUEST_NO_VALUE,
              NO_REQUEST_HAS_VALUE,
              Ordering::AcqRel,
              Ordering::Acquire,
            )
            .is_ok()
          {
            return;
          }
          // lost to a concurrent request or cancel; reclaim and retry
          match self.value.take() {
            Some(v) => value = v,
            None => return,
          }
        }
        _ => return,
      }
    }
  }

  /// Downstream demand; emits the parked value when one is waiting.
  pub fn request(&self, n: u64) {
    if !validate_demand(n, &self.actual) {
      return;
    }
    loop {
      match self.state.load(Ordering::Acquire) {
        HAS_REQUEST_NO_VALUE | HAS_REQUEST_HAS_VALUE => return,
        NO_REQUEST_HAS_VALUE => {
          if self
            .state
            .compare_exchange(
              NO_REQUEST_HAS_VALUE,
              HAS_REQUEST_HAS_VALUE,
              Ordering::AcqRel,
              Ordering::Acquire,
            )
            .is_ok()
          {
            if let Some(value) = self.value.take() {
              self.actual.on_next(value);
            }
            self.actual.on_complete();
            return;
          }
        }
        _ => {
          if self
            .state
            .compare_exchange(
              NO_REQUEST_NO_VALUE,
              HAS_REQUEST_NO_VALUE,
              Ordering::AcqRel,
              Ordering::Acquire,
            )
            .is_ok()
          {
            return;
          }
        }
      }
    }
  }

  /// Moves to the terminal state without emitting.
  pub fn cancel(&self) {
    self.state.store(HAS_REQUEST_HAS_VALUE, Ordering::Release);
  }

  /// True once the machine reached its terminal state, whether by emission
  /// or cancellation.
  pub fn is_terminated(&self) -> bool {
    self.state.load(Ordering::Acquire) == HAS_REQUEST_HAS_VALUE
  }
}

impl<T, D> Subscription for DeferScalar<T, D>
where
  T: Send,
  D: Subscriber<Item = T>,
{
  fn request(&self, n: u64) {
    DeferScalar::request(self, n)
  }

  fn cancel(&self) {
    DeferScalar::cancel(self)
  }
}
