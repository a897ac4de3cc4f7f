//! The wall-clock millisecond source behind `CLK` and `DLY`.

/// A monotonic millisecond clock, counting up from some arbitrary epoch
/// (typically boot).
pub trait Clock {
    /// Milliseconds elapsed since the epoch. Wraps every ~49.7 days, which
    /// matches the 32-bit counter `CLK`/`DLY` operate on.
    fn millis(&self) -> u32;

    /// Block for approximately `ms` milliseconds, yielding to user tasks
    /// the way the original firmware's cooperative scheduler does (§5:
    /// `DELAY` is one of only two suspension points). The default busy-polls
    /// `millis()`; a host with a real task manager can override this to
    /// actually yield the processor between polls.
    fn delay(&mut self, ms: u32) {
        let start = self.millis();
        while self.millis().wrapping_sub(start) < ms {}
    }
}
