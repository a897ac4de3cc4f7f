//! `Gpio` stand-in for the host binary: there is no real hardware header on
//! a development machine, so reads return a fixed idle value and writes are
//! logged to stderr, purely so `PIN`/`IN`/`OUT`/`AIN`/`PWM` are exercisable
//! from the REPL without a microcontroller attached (§6).

pub struct HostGpio;

impl HostGpio {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HostGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl forth_core::Gpio for HostGpio {
    fn pin_mode(&mut self, pin: u16, mode: u16) {
        eprintln!("gpio: pin {pin} mode {mode}");
    }

    fn digital_read(&mut self, _pin: u16) -> u16 {
        0
    }

    fn digital_write(&mut self, pin: u16, value: u16) {
        eprintln!("gpio: pin {pin} digital write {value}");
    }

    fn analog_read(&mut self, _pin: u16) -> u16 {
        0
    }

    fn pwm_write(&mut self, pin: u16, value: u16) {
        eprintln!("gpio: pin {pin} pwm write {value}");
    }
}
