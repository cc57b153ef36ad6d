pub mod task;

pub use log;

use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timer {
    moment: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            moment: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.moment = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.moment.elapsed()
    }

    pub fn elapsed_in_millis(&self) -> f32 {
        self.elapsed().as_secs_f32() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::Timer;

    #[test]
    fn timer_is_monotonic() {
        let mut timer = Timer::new();
        let first = timer.elapsed_in_millis();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(timer.elapsed_in_millis() >= first);

        timer.reset();
        assert!(timer.elapsed_in_millis() < 1000.0);
    }
}
