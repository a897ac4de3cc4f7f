//! Character I/O: the serial console the outer interpreter reads from and
//! prints to.

/// A blocking byte stream, e.g. a serial console.
///
/// Both operations block: `getchar` until a byte is available, `putchar`
/// until it has been sent. Echoing typed characters back to the user, if
/// desired, is this trait's responsibility, not the VM's.
pub trait Io {
    /// Block until a byte is available and return it.
    fn getchar(&mut self) -> u8;

    /// Block until `b` has been sent.
    fn putchar(&mut self, b: u8);

    /// Hint that buffered output should be flushed now. Implementations
    /// that write straight through may leave this as a no-op.
    fn flush(&mut self) {}
}
