//! `std::time::Instant`-backed `Clock`.

use std::time::Instant;

pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl forth_core::Clock for SystemClock {
    fn millis(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    fn delay(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
