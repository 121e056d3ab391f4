//! End-to-end scenarios composing several operators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use backflow::prelude::*;
use backflow::testing::{just, never, TestSubscriber};

#[test]
fn range_through_take_last() {
  let ts = TestSubscriber::new(0);
  take_last(range(1, 5).unwrap(), 2).subscribe(ts.clone());

  assert_eq!(ts.value_count(), 0);
  ts.request(10);
  assert_eq!(ts.values(), vec![4, 5]);
  assert!(ts.is_complete());
}

#[test]
fn using_around_a_raced_pair() {
  let released = Arc::new(AtomicUsize::new(0));
  let released_in_cleanup = released.clone();
  let slow = never::<i32>();
  let slow_cancelled = slow.cancellation();
  let ts = TestSubscriber::new(4);

  using(
    || Ok(42),
    move |seed: &i32| Ok(amb(vec![slow.box_it(), just(*seed).box_it()])),
    move |_| {
      released_in_cleanup.fetch_add(1, Ordering::SeqCst);
      Ok(())
    },
    true,
  )
  .subscribe(ts.clone());

  assert_eq!(ts.values(), vec![42]);
  assert!(ts.is_complete());
  assert!(slow_cancelled.load(Ordering::SeqCst));
  assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn take_last_over_using_cleans_up_before_replay() {
  // eager cleanup runs when the upstream completes, which happens before the
  // buffered tail is requested downstream
  let released = Arc::new(AtomicUsize::new(0));
  let released_in_cleanup = released.clone();
  let ts = TestSubscriber::new(0);

  take_last(
    using(
      || Ok(()),
      |_: &()| range(0, 10),
      move |_| {
        released_in_cleanup.fetch_add(1, Ordering::SeqCst);
        Ok(())
      },
      true,
    ),
    3,
  )
  .subscribe(ts.clone());

  assert_eq!(released.load(Ordering::SeqCst), 1);
  assert_eq!(ts.value_count(), 0);

  ts.request(UNBOUNDED);
  assert_eq!(ts.values(), vec![7, 8, 9]);
  assert!(ts.is_complete());
}

#[test]
fn demand_from_another_thread() {
  let ts = TestSubscriber::new(0);
  range(0, 1000).unwrap().subscribe(ts.clone());

  let requester = ts.clone();
  let handle = std::thread::spawn(move || {
    requester.request(UNBOUNDED);
  });
  handle.join().unwrap();

  assert_eq!(ts.value_count(), 1000);
  assert!(ts.is_complete());
  ts.assert_at_most_one_terminal();
}

#[test]
fn amb_of_equal_length_ranges_is_exclusive() {
  let ts = TestSubscriber::new(UNBOUNDED);
  amb(vec![range(0, 3).unwrap(), range(10, 3).unwrap()])
    .subscribe(ts.clone());

  // the first source signals during its own subscribe and takes the race
  assert_eq!(ts.values(), vec![0, 1, 2]);
  assert_eq!(ts.completions(), 1);
}
