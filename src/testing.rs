//! Test doubles: a recording subscriber with controllable demand, and a few
//! deterministic sources to exercise operators with.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::defer_scalar::DeferScalar;
use crate::deferred::DeferredSubscription;
use crate::error::FlowError;
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::subscription::{self, Subscription, Upstream};

/// Records every signal it receives and routes demand through a deferred
/// subscription, so demand issued before `on_subscribe` is replayed onto the
/// upstream once it arrives. Clone the handle to keep inspecting after the
/// subscriber itself was handed to a publisher.
pub struct TestSubscriber<T> {
  inner: Arc<TestSubscriberInner<T>>,
}

struct TestSubscriberInner<T> {
  upstream: DeferredSubscription,
  values: Mutex<Vec<T>>,
  errors: Mutex<Vec<FlowError>>,
  completions: AtomicUsize,
}

impl<T> Clone for TestSubscriber<T> {
  fn clone(&self) -> Self {
    TestSubscriber {
      inner: self.inner.clone(),
    }
  }
}

impl<T: Send> TestSubscriber<T> {
  /// A subscriber that requests `initial` as soon as it is subscribed.
  pub fn new(initial: u64) -> Self {
    let inner = Arc::new(TestSubscriberInner {
      upstream: DeferredSubscription::new(),
      values: Mutex::new(Vec::new()),
      errors: Mutex::new(Vec::new()),
      completions: AtomicUsize::new(0),
    });
    if initial > 0 {
      inner.upstream.request(initial);
    }
    TestSubscriber { inner }
  }

  pub fn request(&self, n: u64) {
    self.inner.upstream.request(n);
  }

  pub fn cancel(&self) {
    self.inner.upstream.cancel();
  }

  pub fn values(&self) -> Vec<T>
  where
    T: Clone,
  {
    self.inner.values.lock().unwrap().clone()
  }

  pub fn value_count(&self) -> usize {
    self.inner.values.lock().unwrap().len()
  }

  /// Display renderings of the received errors.
  pub fn errors(&self) -> Vec<String> {
    self
      .inner
      .errors
      .lock()
      .unwrap()
      .iter()
      .map(|e| e.to_string())
      .collect()
  }

  /// Removes and returns the first received error.
  pub fn take_error(&self) -> Option<FlowError> {
    let mut errors = self.inner.errors.lock().unwrap();
    if errors.is_empty() {
      None
    } else {
      Some(errors.remove(0))
    }
  }

  pub fn completions(&self) -> usize {
    self.inner.completions.load(Ordering::SeqCst)
  }

  pub fn is_complete(&self) -> bool {
    self.completions() == 1
  }

  /// Asserts the terminal discipline: at most one terminal signal arrived.
  pub fn assert_at_most_one_terminal(&self) {
    let errors = self.inner.errors.lock().unwrap().len();
    let completions = self.completions();
    assert!(
      errors + completions <= 1,
      "saw {errors} errors and {completions} completions"
    );
  }
}

impl<T: Send> Subscriber for TestSubscriber<T> {
  type Item = T;

  fn on_subscribe(&self, upstream: Upstream<T>) {
    self.inner.upstream.set(upstream.into_subscription());
  }

  fn on_next(&self, value: T) {
    self.inner.values.lock().unwrap().push(value);
  }

  fn on_error(&self, error: FlowError) {
    self.inner.errors.lock().unwrap().push(error);
  }

  fn on_complete(&self) {
    self.inner.completions.fetch_add(1, Ordering::SeqCst);
  }
}

/// Emits a single value once demand arrives, then completes.
#[derive(Clone)]
pub struct Just<T> {
  value: T,
}

pub fn just<T: Send + 'static>(value: T) -> Just<T> {
  Just { value }
}

impl<T: Send + 'static> Publisher for Just<T> {
  type Item = T;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = T> + 'static,
  {
    let scalar = Arc::new(DeferScalar::new(subscriber));
    scalar.actual().on_subscribe(Upstream::Plain(scalar.clone()));
    scalar.complete(self.value);
  }
}

/// Never emits anything; its subscription records cancellation.
pub struct Never<T> {
  cancelled: Arc<AtomicBool>,
  _marker: PhantomData<fn() -> T>,
}

pub fn never<T: Send + 'static>() -> Never<T> {
  Never {
    cancelled: Arc::new(AtomicBool::new(false)),
    _marker: PhantomData,
  }
}

impl<T> Never<T> {
  /// Flag flipped when the subscription is cancelled.
  pub fn cancellation(&self) -> Arc<AtomicBool> {
    self.cancelled.clone()
  }
}

struct NeverSubscription {
  cancelled: Arc<AtomicBool>,
}

impl Subscription for NeverSubscription {
  fn request(&self, _n: u64) {}

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }
}

impl<T: Send + 'static> Publisher for Never<T> {
  type Item = T;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = T> + 'static,
  {
    subscriber.on_subscribe(Upstream::Plain(Arc::new(NeverSubscription {
      cancelled: self.cancelled,
    })));
  }
}

/// Signals the given error immediately after subscribing.
pub struct Fail<T> {
  error: FlowError,
  _marker: PhantomData<fn() -> T>,
}

pub fn fail<T: Send + 'static>(error: FlowError) -> Fail<T> {
  Fail {
    error,
    _marker: PhantomData,
  }
}

impl<T: Send + 'static> Publisher for Fail<T> {
  type Item = T;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = T> + 'static,
  {
    subscription::error(&subscriber, self.error);
  }
}
