// tests/future.rs

//! Laws of the scoped promise / cancellable future pair and its
//! combinators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use stagecue::result::collapse_nested;
use stagecue::{aggregate_futures, pair, Cancelled};

#[test]
fn fulfilled_promise_resolves_with_the_value() {
    let (promise, future) = pair();
    promise.fulfill(true);
    assert_eq!(future.wait(), Ok(true));
}

#[test]
fn dropped_promise_resolves_with_cancelled() {
    let (promise, future) = pair::<bool>();
    drop(promise);
    assert_eq!(future.wait(), Err(Cancelled));
}

#[test]
fn moving_a_promise_transfers_fulfilment() {
    let (promise, future) = pair();
    let moved = promise;
    moved.fulfill(2);
    assert_eq!(future.wait(), Ok(2));

    let (promise, future) = pair::<i32>();
    let moved = promise;
    drop(moved);
    assert_eq!(future.wait(), Err(Cancelled));
}

#[test]
fn continuation_runs_when_promise_is_fulfilled_later() {
    let (promise, future) = pair();
    let seen = Arc::new(AtomicBool::new(false));

    let observer = Arc::clone(&seen);
    future.on_resolved(move |resolution| {
        assert_eq!(resolution, Ok(7));
        observer.store(true, Ordering::SeqCst);
    });

    assert!(!seen.load(Ordering::SeqCst));
    promise.fulfill(7);
    assert!(seen.load(Ordering::SeqCst));
}

#[test]
fn continuation_runs_inline_on_a_resolved_future() {
    let (promise, future) = pair();
    promise.fulfill(7);
    assert!(future.is_ready());

    let seen = Arc::new(AtomicBool::new(false));
    let observer = Arc::clone(&seen);
    future.on_resolved(move |resolution| {
        assert_eq!(resolution, Ok(7));
        observer.store(true, Ordering::SeqCst);
    });
    assert!(seen.load(Ordering::SeqCst));
}

#[test]
fn if_not_cancelled_discards_cancellation() {
    let (promise, future) = pair::<i32>();
    let seen = Arc::new(AtomicBool::new(false));

    let observer = Arc::clone(&seen);
    future.if_not_cancelled(move |_| observer.store(true, Ordering::SeqCst));

    drop(promise);
    assert!(!seen.load(Ordering::SeqCst));
}

#[test]
fn wait_blocks_until_another_thread_fulfills() {
    let (promise, future) = pair();

    let producer = thread::spawn(move || {
        promise.fulfill("done");
    });

    assert_eq!(future.wait(), Ok("done"));
    producer.join().unwrap();
}

#[test]
fn next_chains_value_and_unit_continuations() {
    // value -> value
    let (promise, future) = pair::<i32>();
    let chained = future.next(|resolution| resolution.unwrap().to_string());
    promise.fulfill(42);
    assert_eq!(chained.wait(), Ok("42".to_string()));

    // unit -> value
    let (promise, future) = pair();
    let chained = future.next(|resolution| {
        resolution.unwrap();
        "good"
    });
    promise.fulfill(());
    assert_eq!(chained.wait(), Ok("good"));

    // value -> unit -> unit
    let (promise, future) = pair();
    let first = Arc::new(AtomicBool::new(false));
    let second = Arc::new(AtomicBool::new(false));
    let first_observer = Arc::clone(&first);
    let second_observer = Arc::clone(&second);
    future
        .next(move |resolution| {
            assert_eq!(resolution, Ok(123));
            first_observer.store(true, Ordering::SeqCst);
        })
        .next(move |_| second_observer.store(true, Ordering::SeqCst));
    promise.fulfill(123);
    assert!(first.load(Ordering::SeqCst));
    assert!(second.load(Ordering::SeqCst));
}

#[test]
fn next_sees_cancellation_as_a_resolution() {
    let (promise, future) = pair::<i32>();
    let chained = future.next(|resolution| resolution.unwrap_or(-1));
    drop(promise);
    assert_eq!(chained.wait(), Ok(-1));
}

#[test]
fn aggregate_folds_in_input_order() {
    let (promises, futures): (Vec<_>, Vec<_>) = (0..10).map(|_| pair::<i32>()).unzip();

    let aggregated = aggregate_futures(futures, Vec::new(), |mut results, resolution| {
        results.push(resolution.unwrap());
        results
    });

    // Resolve back to front: fold order must still follow input order.
    for (index, promise) in promises.into_iter().enumerate().rev() {
        promise.fulfill(index as i32 + 1);
    }

    assert_eq!(aggregated.wait(), Ok((1..=10).collect::<Vec<i32>>()));
}

#[test]
fn aggregate_counts_cancelled_inputs_through_the_fold() {
    let (promises, futures): (Vec<_>, Vec<_>) = (0..10).map(|_| pair::<i32>()).unzip();

    let aggregated = aggregate_futures(futures, 0, |sum, resolution| {
        sum + resolution.unwrap_or(-1)
    });

    // Fulfil the odd-indexed promises with their index, drop the evens.
    for (index, promise) in promises.into_iter().enumerate() {
        if index % 2 == 1 {
            promise.fulfill(index as i32);
        }
    }

    // 1 + 3 + 5 + 7 + 9 for the odds, -1 for each of the five evens.
    assert_eq!(aggregated.wait(), Ok(20));
}

#[test]
fn aggregate_of_nothing_is_the_initial_value() {
    let aggregated = aggregate_futures(Vec::new(), 5, |sum, resolution: Result<i32, _>| {
        sum + resolution.unwrap_or(0)
    });
    assert_eq!(aggregated.wait(), Ok(5));
}

#[test]
fn collapse_cancelled_maps_a_dropped_promise_to_the_error_arm() {
    let (promise, future) = pair::<Result<String, i32>>();
    let collapsed = future.collapse_cancelled_to_error(3);
    drop(promise);

    assert!(collapsed.is_ready());
    assert_eq!(collapsed.wait(), Ok(Err(3)));
}

#[test]
fn collapse_cancelled_passes_values_through() {
    let (promise, future) = pair::<Result<String, i32>>();
    let collapsed = future.collapse_cancelled_to_error(3);
    promise.fulfill(Ok("kept".to_string()));

    assert_eq!(collapsed.wait(), Ok(Ok("kept".to_string())));
}

#[test]
fn collapse_nested_flattens_results() {
    let nested: Result<Result<i32, String>, u8> = Ok(Ok(1));
    assert_eq!(collapse_nested(nested, |outer| outer.to_string()), Ok(1));

    let nested: Result<Result<i32, String>, u8> = Ok(Err("inner".to_string()));
    assert_eq!(
        collapse_nested(nested, |outer| outer.to_string()),
        Err("inner".to_string())
    );

    let nested: Result<Result<i32, String>, u8> = Err(9);
    assert_eq!(
        collapse_nested(nested, |outer| outer.to_string()),
        Err("9".to_string())
    );
}
