//! Paint signals that pace window boundaries.
//!
//! A [`FrameSource`] tells the scheduler whether the page is currently
//! rendering and lets it wait for the next paint. While the page is hidden
//! the scheduler polls with a plain delay instead, so background pages keep
//! making progress.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Host paint signal plus the page visibility flag.
#[async_trait]
pub trait FrameSource: Send + Sync + 'static {
    /// Whether the host is painting frames right now.
    fn is_rendering(&self) -> bool;

    /// Resolve at the next painted frame.
    async fn next_frame(&self);
}

/// Frames painted at a fixed rate, 60 Hz by default.
#[derive(Debug)]
pub struct FixedRateFrames {
    interval: Duration,
    rendering: AtomicBool,
}

impl FixedRateFrames {
    pub fn new(interval: Duration) -> Self {
        Self { interval, rendering: AtomicBool::new(true) }
    }

    /// Flip the page visibility flag.
    pub fn set_rendering(&self, rendering: bool) {
        self.rendering.store(rendering, Ordering::Relaxed);
    }
}

impl Default for FixedRateFrames {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

#[async_trait]
impl FrameSource for FixedRateFrames {
    fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::Relaxed)
    }

    async fn next_frame(&self) {
        tokio::time::sleep(self.interval).await;
    }
}

/// Frames driven by the host: every [`HostFrames::paint`] wakes all waiters.
#[derive(Debug, Default)]
pub struct HostFrames {
    painted: Notify,
    rendering: AtomicBool,
}

impl HostFrames {
    pub fn new(rendering: bool) -> Self {
        Self { painted: Notify::new(), rendering: AtomicBool::new(rendering) }
    }

    /// Signal a painted frame.
    pub fn paint(&self) {
        self.painted.notify_waiters();
    }

    pub fn set_rendering(&self, rendering: bool) {
        self.rendering.store(rendering, Ordering::Relaxed);
        if !rendering {
            // Waiters parked on a paint that will never come fall back to polling.
            self.painted.notify_waiters();
        }
    }
}

#[async_trait]
impl FrameSource for HostFrames {
    fn is_rendering(&self) -> bool {
        self.rendering.load(Ordering::Relaxed)
    }

    async fn next_frame(&self) {
        self.painted.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_rate_waits_one_interval() {
        let frames = FixedRateFrames::new(Duration::from_millis(16));
        let start = tokio::time::Instant::now();
        frames.next_frame().await;
        assert_eq!(start.elapsed(), Duration::from_millis(16));
    }

    #[tokio::test]
    async fn test_visibility_flag() {
        let frames = FixedRateFrames::default();
        assert!(frames.is_rendering());
        frames.set_rendering(false);
        assert!(!frames.is_rendering());
    }

    #[tokio::test]
    async fn test_host_paint_wakes_waiter() {
        let frames = Arc::new(HostFrames::new(true));
        let waiter = tokio::spawn({
            let frames = frames.clone();
            async move { frames.next_frame().await }
        });

        while !waiter.is_finished() {
            frames.paint();
            tokio::task::yield_now().await;
        }
        waiter.await.unwrap();
    }
}
