//! Stdio-backed `Io`: blocking byte-at-a-time reads from stdin, with every
//! read byte echoed back on stdout the way the reference firmware's
//! `unix/system.c::getchr` does (§11.7 of the expanded spec).

use std::io::{Read, Write, stdin, stdout};

pub struct StdIo {
    stdin: std::io::Stdin,
    stdout: std::io::Stdout,
    eof: bool,
}

impl StdIo {
    pub fn new() -> Self {
        Self {
            stdin: stdin(),
            stdout: stdout(),
            eof: false,
        }
    }

    /// Set once a `getchar` read has hit end-of-input, so `main`'s loop can
    /// stop instead of spinning on the synthesized `\n` line terminator
    /// forever (piping a script file into the binary reaches this).
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl Default for StdIo {
    fn default() -> Self {
        Self::new()
    }
}

impl forth_core::Io for StdIo {
    fn getchar(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        match self.stdin.lock().read(&mut byte) {
            Ok(1) => {}
            _ => {
                self.eof = true;
                return b'\n'; // end the current line so the REPL can observe EOF and stop
            }
        }
        let _ = self.stdout.lock().write_all(&byte);
        let _ = self.stdout.lock().flush();
        byte[0]
    }

    fn putchar(&mut self, b: u8) {
        let _ = self.stdout.lock().write_all(&[b]);
    }

    fn flush(&mut self) {
        let _ = self.stdout.lock().flush();
    }
}
