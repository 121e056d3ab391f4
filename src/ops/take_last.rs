use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::defer_scalar::DeferScalar;
use crate::drain;
use crate::error::FlowError;
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::subscription::{self, Subscription, Upstream, UNBOUNDED};

/// Emits only the last `count` values of `source`, once it completes.
///
/// The upstream runs with unbounded demand; downstream demand only governs
/// how fast the captured tail is replayed after the upstream terminal.
#[derive(Clone)]
pub struct TakeLast<P> {
  source: P,
  count: usize,
}

pub fn take_last<P: Publisher>(source: P, count: usize) -> TakeLast<P> {
  TakeLast { source, count }
}

impl<P> Publisher for TakeLast<P>
where
  P: Publisher,
{
  type Item = P::Item;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = P::Item> + 'static,
  {
    match self.count {
      0 => self.source.subscribe(TakeLastZero(Arc::new(TakeLastZeroInner {
        actual: subscriber,
        upstream: Mutex::new(None),
      }))),
      1 => self.source.subscribe(TakeLastOne(Arc::new(TakeLastOneInner {
        scalar: DeferScalar::new(subscriber),
        upstream: Mutex::new(None),
      }))),
      count => {
        self.source.subscribe(TakeLastMany(Arc::new(TakeLastManyInner {
          actual: subscriber,
          count,
          buffer: Mutex::new(VecDeque::new()),
          requested: AtomicU64::new(0),
          cancelled: AtomicBool::new(false),
          upstream: Mutex::new(None),
        })))
      }
    }
  }
}

/// `count == 0`: values are discarded, only the terminal passes through.
struct TakeLastZero<S>(Arc<TakeLastZeroInner<S>>);

struct TakeLastZeroInner<S> {
  actual: S,
  upstream: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<S> Subscriber for TakeLastZero<S>
where
  S: Subscriber + 'static,
{
  type Item = S::Item;

  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    let subscription = upstream.into_subscription();
    if subscription::set_once(&self.0.upstream, subscription.clone()) {
      self.0.actual.on_subscribe(Upstream::Plain(self.0.clone()));
      subscription.request(UNBOUNDED);
    }
  }

  fn on_next(&self, _value: Self::Item) {
    // the tail of length zero keeps nothing
  }

  fn on_error(&self, error: FlowError) {
    self.0.actual.on_error(error);
  }

  fn on_complete(&self) {
    self.0.actual.on_complete();
  }
}

impl<S> Subscription for TakeLastZeroInner<S>
where
  S: Subscriber + 'static,
{
  fn request(&self, n: u64) {
    if let Some(s) = self.upstream.lock().unwrap().clone() {
      s.request(n);
    }
  }

  fn cancel(&self) {
    if let Some(s) = self.upstream.lock().unwrap().clone() {
      s.cancel();
    }
  }
}

/// `count == 1`: the scalar helper parks the latest value and emits it under
/// downstream demand once the upstream completes.
struct TakeLastOne<S: Subscriber>(Arc<TakeLastOneInner<S>>);

struct TakeLastOneInner<S: Subscriber> {
  scalar: DeferScalar<S::Item, S>,
  upstream: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<S> Subscriber for TakeLastOne<S>
where
  S: Subscriber + 'static,
{
  type Item = S::Item;

  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    let subscription = upstream.into_subscription();
    if subscription::set_once(&self.0.upstream, subscription.clone()) {
      self
        .0
        .scalar
        .actual()
        .on_subscribe(Upstream::Plain(self.0.clone()));
      subscription.request(UNBOUNDED);
    }
  }

  fn on_next(&self, value: Self::Item) {
    self.0.scalar.store(value);
  }

  fn on_error(&self, error: FlowError) {
    self.0.scalar.actual().on_error(error);
  }

  fn on_complete(&self) {
    match self.0.scalar.take() {
      Some(value) => self.0.scalar.complete(value),
      None => self.0.scalar.actual().on_complete(),
    }
  }
}

impl<S> Subscription for TakeLastOneInner<S>
where
  S: Subscriber + 'static,
{
  fn request(&self, n: u64) {
    self.scalar.request(n);
  }

  fn cancel(&self) {
    self.scalar.cancel();
    if let Some(s) = self.upstream.lock().unwrap().clone() {
      s.cancel();
    }
  }
}

/// `count >= 2`: ring buffer of the last `count` values, drained post
/// completion under downstream demand.
struct TakeLastMany<S: Subscriber>(Arc<TakeLastManyInner<S>>);

struct TakeLastManyInner<S: Subscriber> {
  actual: S,
  count: usize,
  buffer: Mutex<VecDeque<S::Item>>,
  requested: AtomicU64,
  cancelled: AtomicBool,
  upstream: Mutex<Option<Arc<dyn Subscription>>>,
}

impl<S> Subscriber for TakeLastMany<S>
where
  S: Subscriber + 'static,
{
  type Item = S::Item;

  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    let subscription = upstream.into_subscription();
    if subscription::set_once(&self.0.upstream, subscription.clone()) {
      self.0.actual.on_subscribe(Upstream::Plain(self.0.clone()));
      subscription.request(UNBOUNDED);
    }
  }

  fn on_next(&self, value: Self::Item) {
    let mut buffer = self.0.buffer.lock().unwrap();
    if buffer.len() == self.0.count {
      buffer.pop_front();
    }
    buffer.push_back(value);
  }

  fn on_error(&self, error: FlowError) {
    self.0.buffer.lock().unwrap().clear();
    self.0.actual.on_error(error);
  }

  fn on_complete(&self) {
    drain::post_complete(
      &self.0.actual,
      &self.0.buffer,
      &self.0.requested,
      &self.0.cancelled,
    );
  }
}

impl<S> Subscription for TakeLastManyInner<S>
where
  S: Subscriber + 'static,
{
  fn request(&self, n: u64) {
    if !subscription::validate_demand(n, &self.actual) {
      return;
    }
    drain::post_complete_request(
      n,
      &self.actual,
      &self.buffer,
      &self.requested,
      &self.cancelled,
    );
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    if let Some(s) = self.upstream.lock().unwrap().clone() {
      s.cancel();
    }
  }
}
