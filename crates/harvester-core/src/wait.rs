//! Cooperative waiting
//!
//! Every wait in the scrape loop is a bounded poll driven by a [`Clock`], so
//! tests can swap in [`VirtualClock`] and run without real timers.

use crate::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Boxed future returned by poll predicates
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of elapsed time and sleeps
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock whose sleeps advance time instantly
#[derive(Debug, Default)]
pub struct VirtualClock {
    nanos: AtomicU64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping
    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(nanos))
            });
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        // Let other tasks observe the new time
        tokio::task::yield_now().await;
    }
}

/// Poll `predicate` every `interval` until it holds or `timeout` elapses.
///
/// The predicate is always evaluated at least once. Returns whether it held.
pub async fn wait_until<S, F>(
    clock: &dyn Clock,
    interval: Duration,
    timeout: Duration,
    subject: &mut S,
    mut predicate: F,
) -> Result<bool>
where
    S: ?Sized + Send,
    F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<bool>>,
{
    let start = clock.elapsed();
    loop {
        if predicate(subject).await? {
            return Ok(true);
        }
        if clock.elapsed().saturating_sub(start) >= timeout {
            return Ok(false);
        }
        clock.sleep(interval).await;
    }
}

/// Stabilization parameters: sample every `interval`, succeed after `samples`
/// consecutive identical non-empty samples, give up after `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stabilization {
    pub interval: Duration,
    pub samples: u32,
    pub timeout: Duration,
}

/// Sample `signature` until it stops changing.
///
/// An empty signature never counts as stable. Returns false on timeout.
pub async fn wait_for_stable<S, F>(
    clock: &dyn Clock,
    params: Stabilization,
    subject: &mut S,
    mut signature: F,
) -> Result<bool>
where
    S: ?Sized + Send,
    F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<String>>,
{
    let start = clock.elapsed();
    let mut last = String::new();
    let mut stable = 0;

    while clock.elapsed().saturating_sub(start) < params.timeout {
        let current = signature(subject).await?;
        if !current.is_empty() && current == last {
            stable += 1;
            if stable >= params.samples {
                return Ok(true);
            }
        } else {
            stable = 0;
            last = current;
        }
        clock.sleep(params.interval).await;
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        calls: u32,
        ready_after: u32,
    }

    #[test]
    fn test_virtual_clock_saturates_on_huge_advance() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_secs(1));
        clock.advance(Duration::MAX);
        assert_eq!(clock.elapsed(), Duration::from_nanos(u64::MAX));

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.elapsed(), Duration::from_nanos(u64::MAX));
    }

    #[tokio::test]
    async fn test_wait_until_succeeds_when_predicate_holds() {
        let clock = VirtualClock::new();
        let mut counter = Counter {
            calls: 0,
            ready_after: 3,
        };

        let ok = wait_until(
            &clock,
            Duration::from_millis(200),
            Duration::from_secs(10),
            &mut counter,
            |c| {
                Box::pin(async move {
                    c.calls += 1;
                    Ok(c.calls >= c.ready_after)
                })
            },
        )
        .await
        .unwrap();

        assert!(ok);
        assert_eq!(counter.calls, 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let clock = VirtualClock::new();
        let mut counter = Counter {
            calls: 0,
            ready_after: u32::MAX,
        };

        let ok = wait_until(
            &clock,
            Duration::from_millis(200),
            Duration::from_secs(1),
            &mut counter,
            |c| {
                Box::pin(async move {
                    c.calls += 1;
                    Ok(false)
                })
            },
        )
        .await
        .unwrap();

        assert!(!ok);
        // Evaluated at 0, 200, ..., 1000 ms
        assert_eq!(counter.calls, 6);
    }

    #[tokio::test]
    async fn test_wait_until_propagates_errors() {
        let clock = VirtualClock::new();
        let mut unit = ();

        let result = wait_until(
            &clock,
            Duration::from_millis(10),
            Duration::from_millis(100),
            &mut unit,
            |_| Box::pin(async { Err(crate::Error::Page("gone".to_string())) }),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_stable_needs_consecutive_samples() {
        let clock = VirtualClock::new();
        let mut samples = vec!["", "a", "b", "b", "b"].into_iter();
        let params = Stabilization {
            interval: Duration::from_millis(150),
            samples: 2,
            timeout: Duration::from_secs(6),
        };

        let ok = wait_for_stable(&clock, params, &mut samples, |s| {
            let next = s.next().unwrap_or("b").to_string();
            Box::pin(async move { Ok(next) })
        })
        .await
        .unwrap();

        assert!(ok);
        assert_eq!(clock.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_wait_for_stable_times_out_on_changing_content() {
        let clock = VirtualClock::new();
        let mut n = 0u32;
        let params = Stabilization {
            interval: Duration::from_millis(150),
            samples: 2,
            timeout: Duration::from_secs(6),
        };

        let ok = wait_for_stable(&clock, params, &mut n, |n| {
            *n += 1;
            let sample = n.to_string();
            Box::pin(async move { Ok(sample) })
        })
        .await
        .unwrap();

        assert!(!ok);
        assert!(clock.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_empty_content_never_stabilizes() {
        let clock = VirtualClock::new();
        let mut unit = ();
        let params = Stabilization {
            interval: Duration::from_millis(100),
            samples: 2,
            timeout: Duration::from_secs(1),
        };

        let ok = wait_for_stable(&clock, params, &mut unit, |_| {
            Box::pin(async { Ok(String::new()) })
        })
        .await
        .unwrap();

        assert!(!ok);
    }
}
