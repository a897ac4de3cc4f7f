//! The VM: the arena plus the five external collaborators, generalized
//! over [`forth_core`]'s traits, and the small console/formatting glue
//! (C2, C7) every other component calls through.

use forth_core::{Clock, Gpio, Interrupts, Io, NvStore};

use crate::arena::{Arena, Du, Iu, LFA_END, MAX_TIB_SZ};
use crate::{persist, token};

/// Construction-time sizing and startup behavior, overriding the arena's
/// compiled-in defaults (§10.4 of the expanded spec).
#[derive(Clone, Copy)]
pub struct VmConfig {
    pub dic_sz: usize,
    pub stk_sz: usize,
    pub tib_sz: usize,
    /// Word names compare case-sensitively when true; otherwise folded to
    /// uppercase (§6).
    pub case_sensitive: bool,
    /// Initial numeric radix: `true` = hex, `false` = decimal (§6).
    pub hex: bool,
    /// Initial execution-trace flag (`SEX` toggles it at runtime, §5).
    pub trace: bool,
    /// Attempt to restore and auto-run a saved image on construction,
    /// mirroring the reference firmware's boot sequence (§4.3).
    pub autorun_on_boot: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            dic_sz: crate::arena::DEFAULT_DIC_SZ,
            stk_sz: crate::arena::DEFAULT_STK_SZ,
            tib_sz: crate::arena::DEFAULT_TIB_SZ,
            case_sensitive: false,
            hex: false,
            trace: false,
            autorun_on_boot: true,
        }
    }
}

/// The full machine: arena, flags, and the five external collaborators.
pub struct Vm<IO, ST, CL, IR, GP>
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    pub arena: Arena,
    pub io: IO,
    pub store: ST,
    pub clock: CL,
    pub intr: IR,
    pub gpio: GP,

    pub trace: bool,
    pub hex: bool,
    pub case_sensitive: bool,
    pub(crate) halted: bool,
    pub(crate) indent: u16,
    rng: u32,

    tib_len: usize,
    tib_pos: usize,
}

impl<IO, ST, CL, IR, GP> Vm<IO, ST, CL, IR, GP>
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    pub fn new(config: VmConfig, io: IO, store: ST, clock: CL, intr: IR, gpio: GP) -> Self {
        let arena = Arena::new(config.dic_sz, config.stk_sz, config.tib_sz);
        let mut vm = Self {
            arena,
            io,
            store,
            clock,
            intr,
            gpio,
            trace: config.trace,
            hex: config.hex,
            case_sensitive: config.case_sensitive,
            halted: false,
            indent: 0,
            rng: 0x2545_f491,
            tib_len: 0,
            tib_pos: 0,
        };
        if config.autorun_on_boot {
            vm.reset();
        }
        vm
    }

    /// Clear the dictionary and stacks, reset interrupts, and attempt to
    /// restore an auto-run image from the store, executing it if present.
    /// Returns whether an auto-run word was executed.
    pub fn reset(&mut self) -> bool {
        self.arena.reset();
        self.intr.reset();
        self.indent = 0;
        self.halted = false;
        self.rng ^= self.clock.millis().wrapping_mul(2_654_435_761).wrapping_add(1);
        let xt = persist::load(&mut self.arena, &self.store, true);
        if xt != LFA_END {
            crate::inner::nest(self, xt);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// `BYE`: request that the host's outer-interpreter loop stop calling
    /// [`crate::outer::outer`] (§6 Exit codes: "`BYE` terminates with
    /// status 0" on the host variant; the core has no process to exit, so
    /// it only flips this flag for the host to observe).
    pub fn halt(&mut self) {
        self.halted = true;
    }

    // --- console input (C2/C7) ------------------------------------------

    /// Block on `io.getchar()` until a full line (or a full buffer) has
    /// been read into the TIB region, then rewind the read cursor.
    fn refill(&mut self) {
        let base = self.arena.tib_base() as Iu;
        let cap = MAX_TIB_SZ.min(self.arena.bytes().len() - base as usize);
        let mut n = 0usize;
        loop {
            let b = self.io.getchar();
            if b == b'\n' || b == b'\r' {
                break;
            }
            if n >= cap {
                break;
            }
            self.arena.set(base + n as Iu, b);
            n += 1;
        }
        self.tib_len = n;
        self.tib_pos = 0;
    }

    /// Whether the current line has no more unread tokens, i.e. the next
    /// [`Self::get_token`] call will block refilling from [`Io::getchar`]
    /// (§4.5: `outer` "prompts when the input buffer is empty"). A host
    /// REPL loop uses this to print its prompt at the right moment instead
    /// of once per token.
    #[must_use]
    pub fn tib_exhausted(&self) -> bool {
        let base = self.arena.tib_base();
        let line = &self.arena.bytes()[base..base + self.tib_len];
        let mut pos = self.tib_pos;
        token::next_token(line, &mut pos).is_none()
    }

    /// Read the next whitespace-delimited token, refilling the input
    /// buffer (possibly more than once) if the current line is exhausted.
    /// Returns absolute arena offsets.
    pub fn get_token(&mut self) -> (Iu, usize) {
        loop {
            let base = self.arena.tib_base();
            let line = &self.arena.bytes()[base..base + self.tib_len];
            if let Some((s, e)) = token::next_token(line, &mut self.tib_pos) {
                return ((base + s) as Iu, e - s);
            }
            self.refill();
        }
    }

    /// Capture the remainder of the current line up to (not including) the
    /// next `"`, for `."` / `S"` payloads. Preserves internal spaces.
    /// Advances the read cursor past the closing quote.
    pub fn capture_quoted(&mut self) -> (Iu, usize) {
        while self.tib_pos < self.tib_len
            && token::is_space(self.arena.bytes()[self.arena.tib_base() + self.tib_pos])
        {
            self.tib_pos += 1;
        }
        let base = self.arena.tib_base();
        let start = self.tib_pos;
        while self.tib_pos < self.tib_len && self.arena.bytes()[base + self.tib_pos] != b'"' {
            self.tib_pos += 1;
        }
        let len = self.tib_pos - start;
        if self.tib_pos < self.tib_len {
            self.tib_pos += 1; // consume the closing quote
        }
        ((base + start) as Iu, len)
    }

    // --- console output (C2/C8) -----------------------------------------

    pub fn emit_char(&mut self, b: u8) {
        self.io.putchar(b);
    }

    pub fn emit_str(&mut self, s: &str) {
        for b in s.bytes() {
            self.emit_char(b);
        }
    }

    /// Print a dictionary name field verbatim, trailing spaces included
    /// (words always occupy the fixed 3-byte name width, §3).
    pub fn emit_name(&mut self, name: [u8; 3]) {
        for b in name {
            self.emit_char(b);
        }
    }

    pub fn emit_name_str(&mut self, s: &str) {
        self.emit_str(s);
    }

    /// Print `addr` as three uppercase hex digits (the arena's addressable
    /// range never exceeds the 12-bit branch-target width, §4.1).
    pub fn emit_addr(&mut self, addr: Iu) {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let a = addr & 0x0FFF;
        self.emit_char(DIGITS[(a >> 8) as usize & 0xF]);
        self.emit_char(DIGITS[(a >> 4) as usize & 0xF]);
        self.emit_char(DIGITS[a as usize & 0xF]);
    }

    /// Print a signed data-stack cell, decimal or hex per the current
    /// radix flag. No trailing space; callers (`.`, `WORDS`) add their own.
    pub fn emit_num(&mut self, n: Du) {
        if self.hex {
            const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
            let u = n as u16;
            let mut buf = [0u8; 4];
            for (i, slot) in buf.iter_mut().enumerate() {
                *slot = DIGITS[((u >> (12 - i * 4)) & 0xF) as usize];
            }
            let first_nonzero = buf.iter().position(|&d| d != b'0').unwrap_or(3);
            for &d in &buf[first_nonzero..] {
                self.emit_char(d);
            }
        } else {
            if n < 0 {
                self.emit_char(b'-');
            }
            let mut mag = i32::from(n).unsigned_abs();
            let mut digits = [0u8; 6];
            let mut i = digits.len();
            loop {
                i -= 1;
                digits[i] = b'0' + (mag % 10) as u8;
                mag /= 10;
                if mag == 0 {
                    break;
                }
            }
            for &d in &digits[i..] {
                self.emit_char(d);
            }
        }
    }

    /// Print a counted string stored at `p` (length byte followed by
    /// `len` raw bytes), without the surrounding quotes.
    pub fn emit_inline_string(&mut self, p: Iu) {
        let len = self.arena.get(p);
        for i in 1..=u16::from(len) {
            self.emit_char(self.arena.get(p.wrapping_add(i)));
        }
    }

    /// `RND`: a bounded pseudo-random value, behind a small xorshift32
    /// generator seeded at construction/reset from the clock (§6 lists no
    /// dedicated RNG collaborator, so this stays self-contained rather than
    /// growing a sixth external trait for one primitive). Mirrors the
    /// reference firmware's `random(n)`: returns a value in `0..n` for
    /// positive `n`, or `0` for `n <= 0`.
    pub fn next_rand(&mut self, bound: Du) -> Du {
        if bound <= 0 {
            return 0;
        }
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;
        (self.rng % bound as u32) as Du
    }

    /// Read a dictionary entry's 3-byte name field, starting at `name_addr`
    /// (an lfa plus the 2-byte link, i.e. `xt - 3`).
    #[must_use]
    pub fn word_name(&self, name_addr: Iu) -> [u8; 3] {
        [
            self.arena.get(name_addr),
            self.arena.get(name_addr.wrapping_add(1)),
            self.arena.get(name_addr.wrapping_add(2)),
        ]
    }
}
