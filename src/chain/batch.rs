//! Bounded-parallelism batch execution with inter-batch pacing.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

/// Run `worker` over `items` in batches of `batch_size`, waiting `delay`
/// between batches. Results come back in input order.
///
/// Within a batch every invocation runs concurrently; the next batch
/// starts only after all of them settled and the delay elapsed. A failing
/// worker only affects its own slot: callers encode failures in `U`
/// (typically `Option` or `Result`).
pub async fn run_batched<T, U, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    delay: Duration,
    worker: F,
) -> Vec<U>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = U>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        let batch: Vec<T> = iter.by_ref().take(batch_size).collect();
        results.extend(join_all(batch.into_iter().map(&worker)).await);

        if iter.peek().is_some() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn results_preserve_input_order() {
        let items: Vec<u64> = (0..7).collect();
        let results = run_batched(items, 3, Duration::from_millis(10), |n| async move {
            // Later items finish first within their batch.
            tokio::time::sleep(Duration::from_millis(10 - n)).await;
            n * 2
        })
        .await;
        assert_eq!(results, vec![0, 2, 4, 6, 8, 10, 12]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_batch_size() {
        let in_flight = AtomicUsize::new(0);
        let high_water = AtomicUsize::new(0);
        run_batched((0..10).collect(), 3, Duration::ZERO, |_| async {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })
        .await;
        assert!(high_water.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn inter_batch_delay_is_applied() {
        let started = Instant::now();
        // Two batches of instant workers separated by 300ms.
        run_batched(vec![1, 2, 3, 4], 3, Duration::from_millis(300), |n| async move { n }).await;
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn worker_failures_do_not_cancel_siblings() {
        let results = run_batched(vec![1, 2, 3], 3, Duration::ZERO, |n| async move {
            if n == 2 {
                None
            } else {
                Some(n)
            }
        })
        .await;
        assert_eq!(results, vec![Some(1), None, Some(3)]);
    }
}
