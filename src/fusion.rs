//! Queue-fusion handshake: a producer may expose its subscription as a
//! pull-style queue so consumers skip per-value signalling.

use crate::error::FlowError;
use crate::subscription::Subscription;

/// Fusion rejected; signals keep flowing through `on_next`.
pub const NONE: u8 = 0;
/// Consumer drives `poll` directly; `Ok(None)` is the terminal.
pub const SYNC: u8 = 1;
/// Producer still signals availability, values travel through the queue.
pub const ASYNC: u8 = 2;
/// Either fusion mode.
pub const ANY: u8 = SYNC | ASYNC;
/// Request flag: the polling side crosses a thread boundary.
pub const THREAD_BARRIER: u8 = 4;

/// A subscription that doubles as a pull queue once fusion is negotiated.
pub trait QueueSubscription<T>: Subscription {
  /// Negotiates a fusion mode out of `mode`; returns the accepted mode,
  /// `NONE` to reject.
  fn request_fusion(&self, mode: u8) -> u8;

  /// Pulls the next value; `Ok(None)` means end of stream.
  fn poll(&self) -> Result<Option<T>, FlowError>;

  fn is_empty(&self) -> bool;

  fn len(&self) -> usize;

  fn clear(&self);
}
