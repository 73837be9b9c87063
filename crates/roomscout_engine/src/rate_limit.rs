//! Fixed-window admission: at most `capacity` operations started per `period`.
use std::future::Future;
use std::time::Duration;

use engine_logging::engine_debug;
use futures_util::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Book-keeping for the current window. Owned by one [`RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct ThrottleWindow {
    window_start: Option<Instant>,
    count: usize,
    capacity: usize,
    period: Duration,
}

impl ThrottleWindow {
    fn new(capacity: usize, period: Duration) -> Self {
        Self {
            window_start: None,
            count: 0,
            capacity: capacity.max(1),
            period,
        }
    }

    /// Instant the caller must wait for before `n` more starts fit, if any.
    fn reserve(&mut self, n: usize, now: Instant) -> Option<Instant> {
        match self.window_start {
            Some(start) if now.duration_since(start) < self.period => {
                if self.count > 0 && self.count + n > self.capacity {
                    let next = start + self.period;
                    self.window_start = Some(next);
                    self.count = n;
                    Some(next)
                } else {
                    self.count += n;
                    None
                }
            }
            _ => {
                self.window_start = Some(now);
                self.count = n;
                None
            }
        }
    }
}

/// Async admission gate shared by concurrent callers.
#[derive(Debug)]
pub struct RateLimiter {
    window: Mutex<ThrottleWindow>,
}

impl RateLimiter {
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self {
            window: Mutex::new(ThrottleWindow::new(capacity, period)),
        }
    }

    /// Waits until `n` more operations may start in the current window.
    pub async fn admit(&self, n: usize) {
        let wait = self.window.lock().await.reserve(n, Instant::now());
        if let Some(deadline) = wait {
            engine_debug!("rate limit reached, waiting for next window");
            sleep_until(deadline).await;
        }
    }
}

/// Runs `worker` over `items` in chunks of at most `capacity`.
///
/// Every chunk is admitted as a whole by a [`RateLimiter`], so it owns one
/// `period` measured from its start, and runs with at most `concurrency`
/// workers in flight. A chunk that finishes early makes the next one wait out
/// the rest of its window; a chunk that overruns lets the next one start at
/// once. Nothing sleeps after the final chunk. Results come back in completion
/// order.
pub async fn for_each_windowed<T, R, F, Fut>(
    items: Vec<T>,
    capacity: usize,
    period: Duration,
    concurrency: usize,
    worker: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let capacity = capacity.max(1);
    let concurrency = concurrency.max(1);
    let limiter = RateLimiter::new(capacity, period);
    let total_chunks = items.len().div_ceil(capacity);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();
    let mut chunk_index = 0;

    while items.peek().is_some() {
        chunk_index += 1;
        let chunk: Vec<T> = items.by_ref().take(capacity).collect();
        limiter.admit(chunk.len()).await;
        engine_debug!(
            "window {chunk_index}/{total_chunks}: starting {} operations",
            chunk.len()
        );

        let mut done: Vec<R> = stream::iter(chunk.into_iter().map(&worker))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.append(&mut done);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn seven_operations_in_windows_of_three() {
        let start = Instant::now();
        let results =
            for_each_windowed((0..7).collect(), 3, Duration::from_secs(60), 4, |n| async move {
                n * 2
            })
            .await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 7);
        assert!(elapsed >= Duration::from_secs(60), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(120), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn final_chunk_does_not_sleep() {
        let start = Instant::now();
        for_each_windowed(vec![1, 2], 3, Duration::from_secs(60), 2, |n| async move { n }).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_chunk_starts_next_immediately() {
        let start = Instant::now();
        for_each_windowed(vec![1, 2], 1, Duration::from_secs(10), 1, |_| async {
            tokio::time::sleep(Duration::from_secs(15)).await;
        })
        .await;
        assert_eq!(start.elapsed().as_secs(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_are_admitted_through_the_shared_window() {
        let started = Instant::now();
        let log = Mutex::new(Vec::new());
        let starts = &log;
        for_each_windowed(
            (0..5).collect(),
            2,
            Duration::from_secs(60),
            2,
            move |_: u32| async move {
                starts.lock().await.push(started.elapsed().as_secs());
            },
        )
        .await;
        assert_eq!(log.into_inner(), [0, 0, 60, 60, 120]);
    }

    #[tokio::test(start_paused = true)]
    async fn admit_blocks_once_capacity_is_used() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        limiter.admit(1).await;
        limiter.admit(1).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        limiter.admit(1).await;
        assert_eq!(start.elapsed().as_secs(), 60);
    }
}
