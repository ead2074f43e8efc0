//! Token-bucket rate limiter shared by all callers of a route.

use std::sync::Mutex;
use std::time::Instant;

/// A token bucket refilling at `rate` tokens per second up to `capacity`.
///
/// `try_consume` never blocks: a caller either takes a token immediately
/// or is told to fail fast.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    updated: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                updated: Instant::now(),
            }),
        }
    }

    /// Takes one token if available. Fails fast without waiting.
    pub fn try_consume(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let elapsed = now.duration_since(state.updated).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
        state.updated = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn burst_then_refill() {
        let bucket = TokenBucket::new(5.0, 2);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());

        // one token refills after 1/5s
        std::thread::sleep(Duration::from_millis(250));
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn refill_caps_at_capacity() {
        let bucket = TokenBucket::new(1000.0, 2);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        std::thread::sleep(Duration::from_millis(100));
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn concurrent_consumers_never_overdraw() {
        let bucket = Arc::new(TokenBucket::new(0.0, 100));
        let mut handles = vec![];
        for _ in 0..8 {
            let bucket = bucket.clone();
            handles.push(std::thread::spawn(move || {
                (0..50).filter(|_| bucket.try_consume()).count()
            }));
        }
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }
}
