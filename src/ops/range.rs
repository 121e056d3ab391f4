use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::FlowError;
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::subscription::{self, Subscription, Upstream, UNBOUNDED};

/// Emits the integers `start..start + count` in order, under demand.
#[derive(Clone)]
pub struct Range {
  start: i64,
  end: i64,
}

/// Creates a range publisher. Fails when the last value would overflow
/// `i32::MAX`.
pub fn range(start: i32, count: u32) -> Result<Range, FlowError> {
  let end = start as i64 + count as i64;
  if end - 1 > i32::MAX as i64 {
    return Err(FlowError::invalid_argument(format!(
      "start + count must not exceed i32::MAX + 1, but was {end}"
    )));
  }
  Ok(Range {
    start: start as i64,
    end,
  })
}

impl Publisher for Range {
  type Item = i32;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = i32> + 'static,
  {
    if self.start == self.end {
      subscription::complete(&subscriber);
      return;
    }
    let inner = Arc::new(RangeSubscription {
      actual: subscriber,
      end: self.end,
      index: AtomicI64::new(self.start),
      requested: AtomicU64::new(0),
      cancelled: AtomicBool::new(false),
    });
    inner.actual.on_subscribe(Upstream::Plain(inner.clone()));
  }
}

struct RangeSubscription<S> {
  actual: S,
  end: i64,
  /// Next value to emit; only the active drainer touches it.
  index: AtomicI64,
  requested: AtomicU64,
  cancelled: AtomicBool,
}

impl<S> RangeSubscription<S>
where
  S: Subscriber<Item = i32>,
{
  fn fast_path(&self) {
    let end = self.end;
    let mut i = self.index.load(Ordering::Relaxed);
    while i != end {
      if self.cancelled.load(Ordering::Acquire) {
        return;
      }
      self.actual.on_next(i as i32);
      i += 1;
    }
    if self.cancelled.load(Ordering::Acquire) {
      return;
    }
    self.actual.on_complete();
  }

  fn slow_path(&self, mut n: u64) {
    let end = self.end;
    let mut e = 0u64;
    let mut i = self.index.load(Ordering::Relaxed);
    loop {
      if self.cancelled.load(Ordering::Acquire) {
        return;
      }
      while e != n && i != end {
        self.actual.on_next(i as i32);
        if self.cancelled.load(Ordering::Acquire) {
          return;
        }
        e += 1;
        i += 1;
      }
      if self.cancelled.load(Ordering::Acquire) {
        return;
      }
      if i == end {
        self.actual.on_complete();
        return;
      }
      n = self.requested.load(Ordering::Acquire);
      if n == e {
        // retire the demand we served and leave if none arrived meanwhile
        self.index.store(i, Ordering::Relaxed);
        n = self.requested.fetch_sub(e, Ordering::AcqRel) - e;
        if n == 0 {
          return;
        }
        e = 0;
      }
    }
  }
}

impl<S> Subscription for RangeSubscription<S>
where
  S: Subscriber<Item = i32>,
{
  fn request(&self, n: u64) {
    if !subscription::validate_demand(n, &self.actual) {
      return;
    }
    if subscription::add_demand(&self.requested, n) == 0 {
      if n == UNBOUNDED {
        self.fast_path();
      } else {
        self.slow_path(n);
      }
    }
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
  }
}
