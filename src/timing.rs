//! Timed waits and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// Longest single sleep inside a cancellable wait.
const WAIT_SLICE_MS: u64 = 50;

/// Shared stop flag, checked between cycles, register operations and wait
/// slices. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `DelayNs` backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms.into()));
    }
}

/// Wait `duration` in short slices. Returns `false` if cancelled before the
/// full duration elapsed.
pub fn wait<D: DelayNs + ?Sized>(delay: &mut D, duration: Duration, cancel: &CancelToken) -> bool {
    let mut remaining = duration.as_millis() as u64;
    while remaining > 0 {
        if cancel.is_cancelled() {
            return false;
        }
        let slice = remaining.min(WAIT_SLICE_MS);
        delay.delay_ms(slice as u32);
        remaining -= slice;
    }
    !cancel.is_cancelled()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records requested delay instead of sleeping.
    #[derive(Debug, Default)]
    pub struct RecordingDelay {
        pub total_ms: u64,
        /// Cancel this token once `total_ms` reaches the threshold.
        pub cancel_after: Option<(u64, CancelToken)>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.delay_ms(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
            if let Some((limit, token)) = &self.cancel_after {
                if self.total_ms >= *limit {
                    token.cancel();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingDelay;
    use super::*;

    #[test]
    fn full_wait_is_sliced() {
        let mut delay = RecordingDelay::default();
        assert!(wait(&mut delay, Duration::from_millis(2000), &CancelToken::new()));
        assert_eq!(delay.total_ms, 2000);
    }

    #[test]
    fn cancellation_cuts_the_wait_short() {
        let token = CancelToken::new();
        let mut delay = RecordingDelay {
            total_ms: 0,
            cancel_after: Some((200, token.clone())),
        };
        assert!(!wait(&mut delay, Duration::from_millis(2000), &token));
        assert_eq!(delay.total_ms, 200);
    }

    #[test]
    fn clones_share_the_flag() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
    }
}
