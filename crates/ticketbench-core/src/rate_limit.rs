//! Token-bucket gate for remote mutations.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, tick};
use tracing::debug;

/// Default refill interval for the executor.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);
/// Default bucket size for the executor.
pub const DEFAULT_BURST: usize = 5;

/// Token bucket refilled by a background ticker.
///
/// The bucket starts full, so the first `burst` acquisitions never wait.
/// Tokens that arrive while the bucket is full are dropped. Dropping the
/// limiter stops the refiller thread.
#[derive(Debug)]
pub struct RateLimiter {
    tokens: Receiver<()>,
    stop: Option<Sender<()>>,
    interval: Duration,
    burst: usize,
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration, burst: usize) -> Self {
        let burst = burst.max(1);
        let (token_tx, tokens) = bounded::<()>(burst);
        for _ in 0..burst {
            let _ = token_tx.try_send(());
        }

        let (stop, stop_rx) = bounded::<()>(0);
        let spawned = thread::Builder::new()
            .name("rate-limit".to_string())
            .spawn(move || refill(&token_tx, &stop_rx, interval));
        if let Err(err) = spawned {
            // Bucket drains and is never refilled.
            tracing::error!("failed to spawn rate limiter refiller: {err}");
        }

        Self {
            tokens,
            stop: Some(stop),
            interval,
            burst,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub const fn burst(&self) -> usize {
        self.burst
    }

    /// Block until a token is available.
    pub fn acquire(&self) {
        // The refiller holds the sender until the limiter is dropped, and
        // `&self` keeps it alive, so recv only fails if the thread died.
        if self.tokens.recv().is_err() {
            debug!("rate limiter refiller is gone; not waiting");
        }
    }

    /// Take a token if one is ready.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.tokens.try_recv().is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_BURST)
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.stop.take();
    }
}

fn refill(tokens: &Sender<()>, stop: &Receiver<()>, interval: Duration) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(ticker) -> _ => match tokens.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Disconnected(())) => return,
            },
            recv(stop) -> _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn bucket_starts_full() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn ticks_into_a_full_bucket_are_dropped() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 2);
        // Several ticks land while the bucket is already full.
        thread::sleep(Duration::from_millis(150));
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn refills_after_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(10), 1);
        assert!(limiter.try_acquire());

        let started = Instant::now();
        limiter.acquire();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn zero_burst_is_clamped() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 0);
        assert_eq!(limiter.burst(), 1);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn defaults_match_executor_settings() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.interval(), Duration::from_millis(250));
        assert_eq!(limiter.burst(), 5);
    }
}
