//! Restartable one-shot timer used to bound how long hits sit in a batch.
//!
//! Unlike `tokio::time::interval`, nothing fires until the timer is armed with
//! [`IntervalTimer::next`], and each arming fires at most once. An idle
//! aggregator therefore never wakes up just to find an empty batch.
use std::pin::Pin;

use tokio::time::{self, Duration, Instant, Sleep};

#[derive(Debug)]
pub struct IntervalTimer {
    duration: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl IntervalTimer {
    /// Create a disarmed timer that fires `duration` after each `next()`
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            sleep: Box::pin(time::sleep(duration)),
            armed: false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Arm the timer to fire once after `duration`.
    /// A pending arming is superseded: the deadline moves to now + duration.
    pub fn next(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.duration);
        self.armed = true;
    }

    /// Disarm without firing
    pub fn stop(&mut self) {
        self.armed = false;
    }

    /// Resolves once per arming. Never resolves while disarmed, so this is
    /// safe to poll from a `select!` loop on every iteration.
    pub async fn tick(&mut self) {
        if !self.armed {
            std::future::pending::<()>().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_timer_never_fires() {
        let mut timer = IntervalTimer::new(Duration::from_millis(10));
        assert!(!timer.is_armed());

        let fired = time::timeout(Duration::from_secs(1), timer.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_per_arming() {
        let mut timer = IntervalTimer::new(Duration::from_millis(50));
        let start = Instant::now();
        timer.next();
        timer.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!timer.is_armed());

        // Consumed: a second tick waits for the next arming
        let fired = time::timeout(Duration::from_millis(200), timer.tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_rebases_deadline() {
        let mut timer = IntervalTimer::new(Duration::from_millis(50));
        let start = Instant::now();
        timer.next();
        time::sleep(Duration::from_millis(30)).await;
        timer.next();
        timer.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disarms() {
        let mut timer = IntervalTimer::new(Duration::from_millis(10));
        timer.next();
        timer.stop();
        let fired = time::timeout(Duration::from_millis(100), timer.tick()).await;
        assert!(fired.is_err());
    }
}
