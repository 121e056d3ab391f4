use crate::error::FlowError;
use crate::subscription::Upstream;

/// Consumer side of the signal protocol.
///
/// `on_subscribe` arrives exactly once and before anything else; `on_next`
/// arrives at most as many times as demand was granted; at most one of
/// `on_error` / `on_complete` closes the stream. Signal delivery to one
/// subscriber is externally serialized, but `request` and `cancel` on the
/// received upstream may race with it, which is why every method takes
/// `&self` and adapters keep their mutable state behind atomics.
pub trait Subscriber: Send + Sync {
  type Item: Send;

  fn on_subscribe(&self, upstream: Upstream<Self::Item>);

  fn on_next(&self, value: Self::Item);

  fn on_error(&self, error: FlowError);

  fn on_complete(&self);
}

impl<S> Subscriber for Box<S>
where
  S: Subscriber + ?Sized,
{
  type Item = S::Item;

  #[inline]
  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    (**self).on_subscribe(upstream)
  }

  #[inline]
  fn on_next(&self, value: Self::Item) {
    (**self).on_next(value)
  }

  #[inline]
  fn on_error(&self, error: FlowError) {
    (**self).on_error(error)
  }

  #[inline]
  fn on_complete(&self) {
    (**self).on_complete()
  }
}

impl<S> Subscriber for std::sync::Arc<S>
where
  S: Subscriber + ?Sized,
{
  type Item = S::Item;

  #[inline]
  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    (**self).on_subscribe(upstream)
  }

  #[inline]
  fn on_next(&self, value: Self::Item) {
    (**self).on_next(value)
  }

  #[inline]
  fn on_error(&self, error: FlowError) {
    (**self).on_error(error)
  }

  #[inline]
  fn on_complete(&self) {
    (**self).on_complete()
  }
}
