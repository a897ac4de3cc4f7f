//! The interrupt subsystem: pin-change and periodic-timer dispatch into
//! user-defined words.
//!
//! Handlers never run the VM themselves. They record a pending execution
//! token; the inner interpreter drains it synchronously at the next `CALL`
//! or `NXT` boundary (§5), so handler effects are serialized
//! with normal execution and with each other. Implementations must only
//! ever queue at most one pending `Xt` at a time — the inner interpreter's
//! ISR-dispatch contract assumes a single slot, not a real queue.

use crate::Xt;

/// Registers pin-change and timer interrupt handlers and reports the next
/// pending one to run.
pub trait Interrupts {
    /// Clear all registered handlers and disable dispatch.
    fn reset(&mut self);

    /// Fire `xt` when `pin` changes state.
    fn add_pcisr(&mut self, pin: u16, xt: Xt);

    /// Fire `xt` every `period_10ms * 10` milliseconds, using timer slot
    /// `slot`.
    fn add_tmisr(&mut self, slot: u16, period_10ms: u16, xt: Xt);

    /// Enable (nonzero bits) or disable pin-change interrupts per `mask`.
    fn enable_pci(&mut self, mask: u16);

    /// Enable or disable the periodic timer interrupt.
    fn enable_timer(&mut self, enable: bool);

    /// Poll for a pending interrupt. Returns the `Xt` to run, if any,
    /// consuming it — a given pending interrupt is reported at most once.
    fn poll(&mut self) -> Option<Xt>;
}
