use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::deferred::DeferredSubscription;
use crate::error::FlowError;
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::subscription::{self, Subscription, Upstream};

/// No candidate has signalled yet.
const UNDECIDED: i64 = i64::MIN;

/// Races a set of sources and commits to whichever signals first.
///
/// All sources are subscribed; the first to produce any signal wins, the
/// rest are cancelled and their late signals dropped. Until the race is
/// decided, downstream demand is broadcast to every candidate so the winner,
/// whoever it turns out to be, already holds the credits.
pub struct Amb<I> {
  sources: I,
}

/// `sources` is drained exactly once, eagerly, when subscribing. Zero
/// sources complete immediately; a single source is passed through with no
/// coordinator interposed.
pub fn amb<I, P>(sources: I) -> Amb<I>
where
  I: IntoIterator<Item = P>,
  P: Publisher,
{
  Amb { sources }
}

impl<I, P> Publisher for Amb<I>
where
  I: IntoIterator<Item = P>,
  P: Publisher,
{
  type Item = P::Item;

  fn subscribe<S>(self, subscriber: S)
  where
    S: Subscriber<Item = P::Item> + 'static,
  {
    let mut sources: SmallVec<[P; 8]> = self.sources.into_iter().collect();
    match sources.len() {
      0 => subscription::complete(&subscriber),
      1 => {
        if let Some(source) = sources.pop() {
          source.subscribe(subscriber);
        }
      }
      n => {
        let candidates: SmallVec<[Arc<CandidateState>; 8]> =
          (0..n).map(|_| Arc::new(CandidateState::new())).collect();
        let shared = Arc::new(AmbShared {
          actual: subscriber,
          winner: AtomicI64::new(UNDECIDED),
          cancelled: AtomicBool::new(false),
          candidates,
        });

        shared.actual.on_subscribe(Upstream::Plain(shared.clone()));

        for (index, source) in sources.into_iter().enumerate() {
          if shared.cancelled.load(Ordering::Acquire)
            || shared.winner.load(Ordering::Acquire) != UNDECIDED
          {
            return;
          }
          source.subscribe(AmbCandidate {
            shared: shared.clone(),
            state: shared.candidates[index].clone(),
            index,
          });
        }
      }
    }
  }
}

struct AmbShared<S> {
  actual: S,
  /// `UNDECIDED` until the first signal; the winning index afterwards.
  winner: AtomicI64,
  cancelled: AtomicBool,
  candidates: SmallVec<[Arc<CandidateState>; 8]>,
}

struct CandidateState {
  upstream: DeferredSubscription,
  won: AtomicBool,
}

impl CandidateState {
  fn new() -> Self {
    CandidateState {
      upstream: DeferredSubscription::new(),
      won: AtomicBool::new(false),
    }
  }
}

impl<S> AmbShared<S>
where
  S: Subscriber,
{
  /// First-signal CAS; the winner cancels every sibling.
  fn try_win(&self, index: usize) -> bool {
    if self.winner.load(Ordering::Acquire) != UNDECIDED {
      return false;
    }
    if self
      .winner
      .compare_exchange(
        UNDECIDED,
        index as i64,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .is_err()
    {
      return false;
    }
    for (i, candidate) in self.candidates.iter().enumerate() {
      if i != index {
        candidate.upstream.cancel();
      }
    }
    true
  }
}

impl<S> Subscription for AmbShared<S>
where
  S: Subscriber + 'static,
{
  fn request(&self, n: u64) {
    if !subscription::validate_demand(n, &self.actual) {
      return;
    }
    let winner = self.winner.load(Ordering::Acquire);
    if winner >= 0 {
      if let Some(candidate) = self.candidates.get(winner as usize) {
        candidate.upstream.request(n);
      }
    } else {
      for candidate in &self.candidates {
        candidate.upstream.request(n);
      }
    }
  }

  fn cancel(&self) {
    if self.cancelled.swap(true, Ordering::AcqRel) {
      return;
    }
    let winner = self.winner.load(Ordering::Acquire);
    if winner >= 0 {
      if let Some(candidate) = self.candidates.get(winner as usize) {
        candidate.upstream.cancel();
      }
    } else {
      for candidate in &self.candidates {
        candidate.upstream.cancel();
      }
    }
  }
}

struct AmbCandidate<S> {
  shared: Arc<AmbShared<S>>,
  state: Arc<CandidateState>,
  index: usize,
}

impl<S> AmbCandidate<S>
where
  S: Subscriber,
{
  /// True when this candidate's signals go downstream: it already won, or it
  /// wins right now. Losers drop their signal, they are cancelled already.
  fn forwards(&self) -> bool {
    if self.state.won.load(Ordering::Relaxed) {
      return true;
    }
    if self.shared.try_win(self.index) {
      self.state.won.store(true, Ordering::Relaxed);
      return true;
    }
    false
  }
}

impl<S> Subscriber for AmbCandidate<S>
where
  S: Subscriber + 'static,
{
  type Item = S::Item;

  fn on_subscribe(&self, upstream: Upstream<Self::Item>) {
    self.state.upstream.set(upstream.into_subscription());
  }

  fn on_next(&self, value: Self::Item) {
    if self.forwards() {
      self.shared.actual.on_next(value);
    }
  }

  fn on_error(&self, error: FlowError) {
    if self.forwards() {
      self.shared.actual.on_error(error);
    }
  }

  fn on_complete(&self) {
    if self.forwards() {
      self.shared.actual.on_complete();
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::ops::range::range;
  use crate::publisher::BoxIt;
  use crate::testing::{fail, just, never, TestSubscriber};

  #[test]
  fn first_value_wins() {
    let slow = never::<i32>();
    let slow_cancelled = slow.cancellation();
    let ts = TestSubscriber::new(8);

    amb(vec![slow.box_it(), just(42).box_it()]).subscribe(ts.clone());

    assert_eq!(ts.values(), vec![42]);
    assert!(ts.is_complete());
    assert!(slow_cancelled.load(Ordering::SeqCst));
  }

  #[test]
  fn first_error_wins() {
    let slow = never::<i32>();
    let slow_cancelled = slow.cancellation();
    let ts = TestSubscriber::new(8);

    amb(vec![slow.box_it(), fail(FlowError::user("boom")).box_it()])
      .subscribe(ts.clone());

    assert_eq!(ts.errors(), vec!["boom"]);
    assert!(slow_cancelled.load(Ordering::SeqCst));
    ts.assert_at_most_one_terminal();
  }

  #[test]
  fn winner_keeps_the_channel() {
    let ts = TestSubscriber::new(2);
    amb(vec![
      range(0, 5).unwrap().box_it(),
      never::<i32>().box_it(),
    ])
    .subscribe(ts.clone());

    assert_eq!(ts.values(), vec![0, 1]);
    ts.request(10);
    assert_eq!(ts.values(), vec![0, 1, 2, 3, 4]);
    assert!(ts.is_complete());
  }

  #[test]
  fn no_sources_complete_immediately() {
    let ts = TestSubscriber::<i32>::new(0);
    amb(Vec::<crate::ops::range::Range>::new()).subscribe(ts.clone());

    assert!(ts.is_complete());
    assert_eq!(ts.value_count(), 0);
  }

  #[test]
  fn single_source_passes_through() {
    let ts = TestSubscriber::new(0);
    amb(vec![range(3, 3).unwrap()]).subscribe(ts.clone());

    ts.request(5);
    assert_eq!(ts.values(), vec![3, 4, 5]);
    assert!(ts.is_complete());
  }

  #[test]
  fn demand_before_decision_reaches_the_winner() {
    // demand issued before any source signals must already sit with the
    // eventual winner, otherwise its first emission would be withheld
    let ts = TestSubscriber::new(3);
    amb(vec![
      never::<i32>().box_it(),
      range(7, 2).unwrap().box_it(),
    ])
    .subscribe(ts.clone());

    assert_eq!(ts.values(), vec![7, 8]);
    assert!(ts.is_complete());
  }

  #[test]
  fn cancellation_reaches_every_candidate() {
    let first = never::<i32>();
    let second = never::<i32>();
    let first_cancelled = first.cancellation();
    let second_cancelled = second.cancellation();
    let ts = TestSubscriber::new(1);

    amb(vec![first.box_it(), second.box_it()]).subscribe(ts.clone());
    ts.cancel();

    assert!(first_cancelled.load(Ordering::SeqCst));
    assert!(second_cancelled.load(Ordering::SeqCst));
  }

  #[test]
  fn empty_winner_completes_downstream() {
    let slow = never::<i32>();
    let slow_cancelled = slow.cancellation();
    let ts = TestSubscriber::new(0);

    amb(vec![slow.box_it(), range(0, 0).unwrap().box_it()])
      .subscribe(ts.clone());

    assert!(ts.is_complete());
    assert!(slow_cancelled.load(Ordering::SeqCst));
  }
}
