use std::time::Instant;

use sim800::Clock;

/// Monotonic clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_std_clock_is_monotonic() {
        let clock = StdClock::new();
        let first = clock.now_ms();
        thread::sleep(Duration::from_millis(5));
        assert!(clock.now_ms() >= first + 5);
    }
}
