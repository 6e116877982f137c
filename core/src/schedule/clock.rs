use super::window::Timestamp;
use chrono::{FixedOffset, Utc};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Outcome of a coarse wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Elapsed,
    Interrupted,
}

/// Cloneable stop request shared between the control loop and a signal handler.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        let (flag, wake) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for up to `timeout`, waking early once a stop is requested.
    pub fn wait_timeout(&self, timeout: Duration) -> Pause {
        let (flag, wake) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wake
            .wait_timeout_while(guard, timeout, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            Pause::Interrupted
        } else {
            Pause::Elapsed
        }
    }
}

/// Time source for the control loop.
pub trait Clock {
    fn now(&self) -> Timestamp;

    /// Waits roughly `duration`, returning early if `shutdown` fires.
    fn pause(&self, duration: Duration, shutdown: &Shutdown) -> Pause;
}

/// Wall clock pinned to the facility's UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: FixedOffset,
}

impl SystemClock {
    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().with_timezone(&self.zone)
    }

    fn pause(&self, duration: Duration, shutdown: &Shutdown) -> Pause {
        shutdown.wait_timeout(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_elapses_without_request() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.wait_timeout(Duration::from_millis(10)), Pause::Elapsed);
        assert!(!shutdown.is_requested());
    }

    #[test]
    fn request_wakes_waiter_early() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            trigger.request();
        });

        let started = Instant::now();
        let outcome = shutdown.wait_timeout(Duration::from_secs(30));
        handle.join().unwrap();

        assert_eq!(outcome, Pause::Interrupted);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn system_clock_reports_configured_offset() {
        let zone = FixedOffset::east_opt(9 * 3600).unwrap();
        let clock = SystemClock::new(zone);
        assert_eq!(clock.now().offset().local_minus_utc(), 9 * 3600);
    }
}
