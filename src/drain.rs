//! Post-complete drain protocol.
//!
//! A buffering operator that keeps emitting after upstream completion folds
//! two facts into one atomic: the low 63 bits hold outstanding downstream
//! demand, the high bit records that the upstream terminal arrived. Whoever
//! flips the counter out of the idle state (first demand after completion,
//! or completion finding demand already parked) becomes the drainer;
//! concurrent requesters only add to the counter and leave.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::subscriber::Subscriber;
use crate::subscription::add_cap;

/// High bit: upstream completion observed.
pub(crate) const COMPLETED_FLAG: u64 = 1 << 63;
/// Low 63 bits: outstanding downstream demand.
pub(crate) const REQUESTED_MASK: u64 = COMPLETED_FLAG - 1;

/// Adds `n` demand. Before completion this only accumulates (returning
/// false); after completion the caller that found demand at zero drains the
/// queue. Returns true when the stream is in post-complete mode.
pub(crate) fn post_complete_request<T, S>(
  n: u64,
  actual: &S,
  queue: &Mutex<VecDeque<T>>,
  requested: &AtomicU64,
  cancelled: &AtomicBool,
) -> bool
where
  T: Send,
  S: Subscriber<Item = T>,
{
  loop {
    let r = requested.load(Ordering::Acquire);
    if r & COMPLETED_FLAG != 0 {
      let pending = r & REQUESTED_MASK;
      let next = add_cap(pending, n) | COMPLETED_FLAG;
      if requested
        .compare_exchange(r, next, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
      {
        if pending == 0 {
          post_complete_drain(next, actual, queue, requested, cancelled);
        }
        return true;
      }
    } else {
      let next = add_cap(r, n);
      if requested
        .compare_exchange(r, next, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
      {
        return false;
      }
    }
  }
}

/// Marks completion; drains immediately when demand is already pending.
pub(crate) fn post_complete<T, S>(
  actual: &S,
  queue: &Mutex<VecDeque<T>>,
  requested: &AtomicU64,
  cancelled: &AtomicBool,
) where
  T: Send,
  S: Subscriber<Item = T>,
{
  loop {
    let r = requested.load(Ordering::Acquire);
    if r & COMPLETED_FLAG != 0 {
      return;
    }
    let next = r | COMPLETED_FLAG;
    if requested
      .compare_exchange(r, next, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      if r != 0 {
        post_complete_drain(next, actual, queue, requested, cancelled);
      }
      return;
    }
  }
}

fn post_complete_drain<T, S>(
  mut n: u64,
  actual: &S,
  queue: &Mutex<VecDeque<T>>,
  requested: &AtomicU64,
  cancelled: &AtomicBool,
) where
  T: Send,
  S: Subscriber<Item = T>,
{
  // emitted count lives above the flag so it compares against n directly
  let mut e = COMPLETED_FLAG;
  loop {
    while e != n {
      if cancelled.load(Ordering::Acquire) {
        return;
      }
      let head = queue.lock().unwrap().pop_front();
      match head {
        Some(value) => {
          actual.on_next(value);
          e += 1;
        }
        None => {
          actual.on_complete();
          return;
        }
      }
    }
    if cancelled.load(Ordering::Acquire) {
      return;
    }
    if queue.lock().unwrap().is_empty() {
      actual.on_complete();
      return;
    }
    n = requested.load(Ordering::Acquire);
    if n == e {
      let emitted = e & REQUESTED_MASK;
      n = requested.fetch_sub(emitted, Ordering::AcqRel) - emitted;
      if n & REQUESTED_MASK == 0 {
        return;
      }
      e = n & COMPLETED_FLAG;
    }
  }
}
