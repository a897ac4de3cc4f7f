//! Cooperative, in-process `Interrupts` for the host binary.
//!
//! There is no real pin-change hardware on a host terminal, so pin-change
//! registration is accepted and stored but never fires; periodic timer
//! slots are driven off [`std::time::Instant`] and do fire, so `TMI`-
//! registered words still run the way they would under the reference
//! firmware's hardware timer (§5, §6).

use std::time::Instant;

use forth_core::Xt;

const MAX_TIMER_SLOTS: usize = 4;

struct TimerSlot {
    xt: Xt,
    period_ms: u32,
    last_fire: Instant,
}

pub struct HostIntr {
    timers: [Option<TimerSlot>; MAX_TIMER_SLOTS],
    timer_enabled: bool,
    pci_enabled_mask: u16,
    pci: Vec<(u16, Xt)>,
}

impl HostIntr {
    pub fn new() -> Self {
        Self {
            timers: [const { None }; MAX_TIMER_SLOTS],
            timer_enabled: false,
            pci_enabled_mask: 0,
            pci: Vec::new(),
        }
    }
}

impl Default for HostIntr {
    fn default() -> Self {
        Self::new()
    }
}

impl forth_core::Interrupts for HostIntr {
    fn reset(&mut self) {
        self.timers = [const { None }; MAX_TIMER_SLOTS];
        self.timer_enabled = false;
        self.pci_enabled_mask = 0;
        self.pci.clear();
    }

    fn add_pcisr(&mut self, pin: u16, xt: Xt) {
        self.pci.push((pin, xt));
    }

    fn add_tmisr(&mut self, slot: u16, period_10ms: u16, xt: Xt) {
        if let Some(s) = self.timers.get_mut(slot as usize) {
            *s = Some(TimerSlot {
                xt,
                period_ms: u32::from(period_10ms) * 10,
                last_fire: Instant::now(),
            });
        }
    }

    fn enable_pci(&mut self, mask: u16) {
        self.pci_enabled_mask = mask;
    }

    fn enable_timer(&mut self, enable: bool) {
        self.timer_enabled = enable;
    }

    fn poll(&mut self) -> Option<Xt> {
        if !self.timer_enabled {
            return None;
        }
        let now = Instant::now();
        for slot in self.timers.iter_mut().flatten() {
            if now.duration_since(slot.last_fire).as_millis() as u32 >= slot.period_ms {
                slot.last_fire = now;
                return Some(slot.xt);
            }
        }
        None
    }
}
