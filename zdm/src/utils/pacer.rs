//! Request pacing for provider API calls
//!
//! Each caller reserves the next free slot and sleeps until it opens, so
//! concurrent callers queue up instead of all waking at once. A provider that
//! answers "slow down" can push the next slot further out.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Spaces requests at least `spacing` apart
pub struct RequestPacer {
    spacing: Duration,
    next_slot: Mutex<Instant>,
}

impl RequestPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait for the next slot, reserving the one after it
    pub async fn pace(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.spacing;
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Pacing request");
            sleep_until(slot).await;
        }
    }

    /// Keep every request from starting within `delay` of now
    pub async fn hold_off(&self, delay: Duration) {
        let mut next = self.next_slot.lock().await;
        *next = (*next).max(Instant::now() + delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_millis(500));
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let pacer = RequestPacer::new(Duration::from_millis(100));
        let start = Instant::now();

        pacer.pace().await;
        pacer.pace().await;
        pacer.pace().await;

        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_hold_off_delays_next_request() {
        let pacer = RequestPacer::new(Duration::ZERO);
        pacer.pace().await;
        pacer.hold_off(Duration::from_millis(250)).await;

        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(240));
    }

    #[tokio::test]
    async fn test_hold_off_never_shortens_wait() {
        let pacer = RequestPacer::new(Duration::ZERO);
        pacer.hold_off(Duration::from_millis(250)).await;
        pacer.hold_off(Duration::from_millis(10)).await;

        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(240));
    }

    #[tokio::test]
    async fn test_zero_spacing_never_waits() {
        let pacer = RequestPacer::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            pacer.pace().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
