use crate::subscriber::Subscriber;

/// A source of values delivered under the demand protocol.
///
/// Subscribing consumes the publisher value; publishers whose inputs are
/// `Clone` are themselves `Clone`, so a fresh subscription is a clone away.
/// Every subscription builds its own adapter state, no state is shared
/// between subscriptions.
pub trait Publisher {
  type Item: Send + 'static;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = Self::Item> + 'static;
}

/// Type-erased publisher, for mixing source types in one collection.
pub struct BoxPublisher<T> {
  inner: Box<dyn BoxSubscribe<T> + Send>,
}

trait BoxSubscribe<T> {
  fn subscribe_boxed(self: Box<Self>, subscriber: Box<dyn Subscriber<Item = T>>);
}

impl<P> BoxSubscribe<P::Item> for P
where
  P: Publisher,
{
  fn subscribe_boxed(
    self: Box<Self>,
    subscriber: Box<dyn Subscriber<Item = P::Item>>,
  ) {
    (*self).subscribe(subscriber)
  }
}

impl<T: Send + 'static> Publisher for BoxPublisher<T> {
  type Item = T;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = T> + 'static,
  {
    self.inner.subscribe_boxed(Box::new(subscriber));
  }
}

pub trait BoxIt: Publisher + Sized + Send + 'static {
  /// Erases the concrete publisher type.
  fn box_it(self) -> BoxPublisher<Self::Item> {
    BoxPublisher {
      inner: Box::new(self),
    }
  }
}

impl<P> BoxIt for P where P: Publisher + Send + 'static {}
