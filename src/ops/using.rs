use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{on_error_dropped, FlowError};
use crate::fusion::{self, QueueSubscription};
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::subscription::{self, Subscription, Upstream};

/// Binds a per-subscription resource to the lifetime of a derived publisher.
///
/// Every subscription acquires its own resource, derives a source from it and
/// guarantees the cleanup runs exactly once: before the terminal when
/// `eager`, after it otherwise, and on cancellation in either mode. Cleanup
/// failures during an eager terminal displace or decorate that terminal;
/// after cancellation there is no downstream left, so they are dropped to
/// the log sink.
#[derive(Clone)]
pub struct Using<SF, PF, CF> {
  resource_supplier: SF,
  source_factory: PF,
  resource_cleanup: CF,
  eager: bool,
}

pub fn using<SF, PF, CF>(
  resource_supplier: SF,
  source_factory: PF,
  resource_cleanup: CF,
  eager: bool,
) -> Using<SF, PF, CF> {
  Using {
    resource_supplier,
    source_factory,
    resource_cleanup,
    eager,
  }
}

impl<R, P, SF, PF, CF> Publisher for Using<SF, PF, CF>
where
  R: Send + 'static,
  P: Publisher,
  SF: FnOnce() -> Result<R, FlowError>,
  PF: FnOnce(&R) -> Result<P, FlowError>,
  CF: FnOnce(R) -> Result<(), FlowError> + Send + 'static,
{
  type Item = P::Item;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = P::Item> + 'static,
  {
    let resource = match (self.resource_supplier)() {
      Ok(resource) => resource,
      Err(err) => {
        subscription::error(&subscriber, err);
        return;
      }
    };
    let source = match (self.source_factory)(&resource) {
      Ok(source) => source,
      Err(err) => {
        let err = match (self.resource_cleanup)(resource) {
          Ok(()) => err,
          Err(cleanup_err) => cleanup_err.with_suppressed(err),
        };
        subscription::error(&subscriber, err);
        return;
      }
    };
    source.subscribe(UsingAdapter(Arc::new(UsingInner {
      actual: subscriber,
      resource: Mutex::new(Some(resource)),
      cleanup: Mutex::new(Some(self.resource_cleanup)),
      eager: self.eager,
      wip: AtomicU32::new(0),
      mode: AtomicU8::new(fusion::NONE),
      upstream: Mutex::new(None),
    })));
  }
}

struct UsingAdapter<R, CF, S: Subscriber>(Arc<UsingInner<R, CF, S>>);

struct UsingInner<R, CF, S: Subscriber> {
  actual: S,
  resource: Mutex<Option<R>>,
  cleanup: Mutex<Option<CF>>,
  eager: bool,
  /// 0 -> 1 exactly once; gates the cancellation path.
  wip: AtomicU32,
  mode: AtomicU8,
  upstream: Mutex<Option<Upstream<S::Item>>>,
}

impl<R, CF, S> UsingInner<R, CF, S>
where
  R: Send + 'static,
  CF: FnOnce(R) -> Result<(), FlowError> + Send + 'static,
  S: Subscriber + 'static,
{
  /// Moves the resource into the cleanup call; at most once.
  fn run_cleanup(&self) -> Result<(), FlowError> {
    let cleanup = self.cleanup.lock().unwrap().take();
    let resource = self.resource.lock().unwrap().take();
    match (cleanup, resource) {
      (Some(cleanup), Some(resource)) => cleanup(resource),
      _ => Ok(()),
    }
  }

  fn upstream(&self) -> Option<Upstream<S::Item>> {
    self.upstream.lock().unwrap().clone()
  }
}

impl<R, CF, S> Subscriber for UsingAdapter<R, CF, S>
where
  R: Send + 'static,
  CF: FnOnce(R) -> Result<(), FlowError> + Send + 'static,
  S: Subscriber + 'static,
{
  type Item = S::Item;

  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    {
      let mut slot = self.0.upstream.lock().unwrap();
      if slot.is_some() {
        drop(slot);
        upstream.cancel();
        log::error!("subscription already set, cancelling the newcomer");
        return;
      }
      *slot = Some(upstream);
    }
    self.0.actual.on_subscribe(Upstream::Fused(self.0.clone()));
  }

  fn on_next(&self, value: Self::Item) {
    self.0.actual.on_next(value);
  }

  fn on_error(&self, error: FlowError) {
    let mut error = error;
    if self.0.eager {
      if let Err(cleanup_err) = self.0.run_cleanup() {
        error = cleanup_err.with_suppressed(error);
      }
    }
    self.0.actual.on_error(error);
    if !self.0.eager {
      if let Err(cleanup_err) = self.0.run_cleanup() {
        on_error_dropped(cleanup_err);
      }
    }
  }

  fn on_complete(&self) {
    if self.0.eager {
      if let Err(cleanup_err) = self.0.run_cleanup() {
        self.0.actual.on_error(cleanup_err);
        return;
      }
    }
    self.0.actual.on_complete();
    if !self.0.eager {
      if let Err(cleanup_err) = self.0.run_cleanup() {
        on_error_dropped(cleanup_err);
      }
    }
  }
}

impl<R, CF, S> Subscription for UsingInner<R, CF, S>
where
  R: Send + 'static,
  CF: FnOnce(R) -> Result<(), FlowError> + Send + 'static,
  S: Subscriber + 'static,
{
  fn request(&self, n: u64) {
    if let Some(upstream) = self.upstream() {
      upstream.request(n);
    }
  }

  fn cancel(&self) {
    if self
      .wip
      .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
    {
      if let Some(upstream) = self.upstream() {
        upstream.cancel();
      }
      if let Err(cleanup_err) = self.run_cleanup() {
        on_error_dropped(cleanup_err);
      }
    }
  }
}

impl<R, CF, S> QueueSubscription<S::Item> for UsingInner<R, CF, S>
where
  R: Send + 'static,
  CF: FnOnce(R) -> Result<(), FlowError> + Send + 'static,
  S: Subscriber + 'static,
{
  fn request_fusion(&self, mode: u8) -> u8 {
    match self.upstream() {
      Some(Upstream::Fused(queue)) => {
        let accepted = queue.request_fusion(mode);
        self.mode.store(accepted, Ordering::Release);
        accepted
      }
      // the derived source turned out to be non-fuseable after all
      _ => fusion::NONE,
    }
  }

  fn poll(&self) -> Result<Option<S::Item>, FlowError> {
    match self.upstream() {
      Some(Upstream::Fused(queue)) => {
        let value = queue.poll()?;
        if value.is_none() && self.mode.load(Ordering::Acquire) == fusion::SYNC
        {
          // sync-fusion analog of on_complete
          self.run_cleanup()?;
        }
        Ok(value)
      }
      _ => Ok(None),
    }
  }

  fn is_empty(&self) -> bool {
    match self.upstream() {
      Some(Upstream::Fused(queue)) => queue.is_empty(),
      _ => true,
    }
  }

  fn len(&self) -> usize {
    match self.upstream() {
      Some(Upstream::Fused(queue)) => queue.len(),
      _ => 0,
    }
  }

  fn clear(&self) {
    if let Some(Upstream::Fused(queue)) = self.upstream() {
      queue.clear();
    }
  }
}
