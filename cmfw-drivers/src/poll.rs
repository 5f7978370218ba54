//! Bounded busy-polling
//!
//! The budget is counted in polls, not time. A transfer gets
//! `timeout + MIN_POLLS` polls spaced [`POLL_INTERVAL_NS`] apart. The
//! budget is re-armed each time the awaited condition comes true, so it
//! bounds how long a transfer may go without progress rather than the
//! length of the whole transfer.

use embedded_hal::delay::DelayNs;

/// Polls granted on top of the configured timeout
pub const MIN_POLLS: u32 = 10;

/// Pause between polls
pub const POLL_INTERVAL_NS: u32 = 10_000;

/// No-progress poll budget
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    budget: u32,
    remaining: u32,
}

impl Poller {
    pub fn new(timeout: u32) -> Self {
        let budget = timeout.saturating_add(MIN_POLLS);
        Self {
            budget,
            remaining: budget,
        }
    }

    /// Polls left before the next wait gives up
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Poll `ready` until it returns true or the budget runs out
    pub fn wait<D: DelayNs>(&mut self, delay: &mut D, mut ready: impl FnMut() -> bool) -> bool {
        self.until(delay, || ready().then_some(())).is_some()
    }

    /// Poll `attempt` until it yields a value or the budget runs out
    pub fn until<D: DelayNs, T>(
        &mut self,
        delay: &mut D,
        mut attempt: impl FnMut() -> Option<T>,
    ) -> Option<T> {
        loop {
            if let Some(value) = attempt() {
                self.remaining = self.budget;
                return Some(value);
            }
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            delay.delay_ns(POLL_INTERVAL_NS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::CountingDelay;

    #[test]
    fn test_gives_up_after_budget() {
        let mut delay = CountingDelay::default();
        let mut poller = Poller::new(5);
        assert!(!poller.wait(&mut delay, || false));
        assert_eq!(delay.calls, 5 + MIN_POLLS);
    }

    #[test]
    fn test_ready_immediately_costs_nothing() {
        let mut delay = CountingDelay::default();
        let mut poller = Poller::new(0);
        assert!(poller.wait(&mut delay, || true));
        assert_eq!(delay.calls, 0);
    }

    #[test]
    fn test_progress_rearms_budget() {
        let mut delay = CountingDelay::default();
        let mut poller = Poller::new(0);

        let mut countdown = MIN_POLLS;
        assert!(poller.wait(&mut delay, || {
            countdown -= 1;
            countdown == 0
        }));
        assert_eq!(poller.remaining(), MIN_POLLS);

        // A fresh budget is available for the next element
        let mut countdown = MIN_POLLS;
        assert!(poller.wait(&mut delay, || {
            countdown -= 1;
            countdown == 0
        }));
    }

    #[test]
    fn test_until_returns_value() {
        let mut delay = CountingDelay::default();
        let mut poller = Poller::new(3);
        let mut n = 0;
        let got = poller.until(&mut delay, || {
            n += 1;
            (n == 3).then_some(0xA5u8)
        });
        assert_eq!(got, Some(0xA5));
        assert_eq!(delay.calls, 2);
    }
}
