//! Hardware GPIO primitives behind `PIN`, `IN`, `OUT`, `AIN`, `PWM`.

/// Digital/analog/PWM pin access.
pub trait Gpio {
    /// Configure `pin`'s mode (e.g. input, output, input-pullup); the mode
    /// encoding is host-defined, matching whatever the underlying hardware
    /// API expects.
    fn pin_mode(&mut self, pin: u16, mode: u16);

    /// Read a digital pin (0 or 1).
    fn digital_read(&mut self, pin: u16) -> u16;

    /// Write a digital pin (nonzero means high).
    fn digital_write(&mut self, pin: u16, value: u16);

    /// Read an analog pin (implementation-defined resolution).
    fn analog_read(&mut self, pin: u16) -> u16;

    /// Write a PWM duty cycle to `pin`.
    fn pwm_write(&mut self, pin: u16, value: u16);
}
