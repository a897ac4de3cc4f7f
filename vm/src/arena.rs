//! C1 — the arena: one contiguous byte array holding the dictionary, the
//! two stacks, and the terminal input buffer, all addressed by 16-bit
//! offsets so the whole image is position-independent (§3).

/// Instruction offset: an arena offset, in bytes from offset 0.
pub type Iu = u16;
/// Data cell: the 16-bit signed value the data stack holds.
pub type Du = i16;
/// Double cell, used only by the narrow 32-bit helper words (`D+`, `D-`,
/// `DNEGATE`, `CLK`).
pub type Du2 = i32;

/// Link-field sentinel meaning "no previous word" / "end of return stack".
pub const LFA_END: Iu = 0xFFFF;

/// Upper bound on dictionary size: branch targets carry only 12 bits
/// (§4.1), so no valid dictionary offset can reach or exceed this.
pub const MAX_DIC_SZ: usize = 0x1000;
/// Upper bound on combined return+data stack size this build supports.
pub const MAX_STK_SZ: usize = 0x400;
/// Upper bound on terminal input buffer size this build supports.
pub const MAX_TIB_SZ: usize = 0x200;

const MAX_ARENA_SZ: usize = MAX_DIC_SZ + MAX_STK_SZ + MAX_TIB_SZ;

/// Default dictionary region size (1 KiB, matching the reference firmware).
pub const DEFAULT_DIC_SZ: usize = 0x400;
/// Default combined stack region size (128 bytes).
pub const DEFAULT_STK_SZ: usize = 0x80;
/// Default terminal input buffer size (128 bytes).
pub const DEFAULT_TIB_SZ: usize = 0x80;

/// The single byte arena, partitioned into dictionary, stacks, and TIB.
///
/// The backing store is a fixed-size array sized to [`MAX_ARENA_SZ`] so the
/// whole struct lives inline with no heap allocation; `dic_sz`/`stk_sz`/
/// `tib_sz` carve out the actually-configured regions within it, `0` being
/// the shared starting offset of the dictionary.
pub struct Arena {
    mem: [u8; MAX_ARENA_SZ],
    dic_sz: usize,
    stk_sz: usize,
    /// Top-of-dictionary pointer: next emission goes at this offset.
    here: Iu,
    /// Offset of the most recently created dictionary entry, or `LFA_END`.
    last: Iu,
    /// Return stack pointer: grows upward from `dic_sz`.
    rp: Iu,
    /// Data stack pointer: grows downward from `dic_sz + stk_sz`.
    sp: Iu,
}

impl Arena {
    /// Build a fresh, empty arena with the given region sizes.
    ///
    /// # Panics
    /// Panics if any region exceeds this build's compiled-in maximum, or if
    /// `dic_sz` exceeds [`MAX_DIC_SZ`] (which would make some branch targets
    /// unreachable). These are configuration errors caught at boot, not
    /// recoverable runtime conditions.
    #[must_use]
    pub fn new(dic_sz: usize, stk_sz: usize, tib_sz: usize) -> Self {
        assert!(dic_sz <= MAX_DIC_SZ, "dictionary region too large");
        assert!(stk_sz <= MAX_STK_SZ, "stack region too large");
        assert!(tib_sz <= MAX_TIB_SZ, "input buffer region too large");
        let mut arena = Self {
            mem: [0; MAX_ARENA_SZ],
            dic_sz,
            stk_sz,
            here: 0,
            last: LFA_END,
            rp: dic_sz as Iu,
            sp: (dic_sz + stk_sz) as Iu,
        };
        arena.reset();
        arena
    }

    /// Reset to an empty dictionary and empty stacks, keeping region sizes.
    pub fn reset(&mut self) {
        self.here = 0;
        self.last = LFA_END;
        self.rp = self.dic_sz as Iu;
        self.sp = (self.dic_sz + self.stk_sz) as Iu;
    }

    #[must_use]
    pub fn here(&self) -> Iu {
        self.here
    }

    pub fn set_here(&mut self, v: Iu) {
        self.here = v;
    }

    #[must_use]
    pub fn last(&self) -> Iu {
        self.last
    }

    pub fn set_last(&mut self, v: Iu) {
        self.last = v;
    }

    #[must_use]
    pub fn dic_sz(&self) -> usize {
        self.dic_sz
    }

    /// Offset at which the terminal input buffer region starts.
    #[must_use]
    pub fn tib_base(&self) -> usize {
        self.dic_sz + self.stk_sz
    }

    // --- raw byte access -----------------------------------------------

    #[must_use]
    pub fn get(&self, i: Iu) -> u8 {
        self.mem[i as usize]
    }

    pub fn set(&mut self, i: Iu, v: u8) {
        self.mem[i as usize] = v;
    }

    /// Raw slice covering the whole arena, used by the input-buffer reader
    /// and by `DMP`.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.mem
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }

    /// Read a big-endian 16-bit value at `i`.
    #[must_use]
    pub fn get_u16(&self, i: Iu) -> u16 {
        (u16::from(self.get(i)) << 8) | u16::from(self.get(i.wrapping_add(1)))
    }

    /// Write a big-endian 16-bit value at `i`.
    pub fn set_u16(&mut self, i: Iu, v: u16) {
        self.set(i, (v >> 8) as u8);
        self.set(i.wrapping_add(1), (v & 0xFF) as u8);
    }

    // --- dictionary append (grows `here` upward) -------------------------

    /// Append one byte at `here`, advancing it.
    pub fn emit8(&mut self, v: u8) {
        self.set(self.here, v);
        self.here = self.here.wrapping_add(1);
    }

    /// Append a big-endian 16-bit value at `here`, advancing it by 2.
    pub fn emit16(&mut self, v: u16) {
        self.set_u16(self.here, v);
        self.here = self.here.wrapping_add(2);
    }

    // --- data stack (grows downward from `dic_sz + stk_sz`) -------------

    pub fn push_data(&mut self, v: Du) {
        self.sp = self.sp.wrapping_sub(2);
        self.set_u16(self.sp, v as u16);
    }

    pub fn pop_data(&mut self) -> Du {
        let v = self.get_u16(self.sp) as Du;
        self.sp = self.sp.wrapping_add(2);
        v
    }

    /// Peek the data cell `depth` cells below the top (0 = top-of-stack).
    #[must_use]
    pub fn peek_data(&self, depth: u16) -> Du {
        self.get_u16(self.sp.wrapping_add(depth * 2)) as Du
    }

    pub fn set_peek_data(&mut self, depth: u16, v: Du) {
        self.set_u16(self.sp.wrapping_add(depth * 2), v as u16);
    }

    #[must_use]
    pub fn sp(&self) -> Iu {
        self.sp
    }

    // --- return stack (grows upward from `dic_sz`) -----------------------

    pub fn push_return(&mut self, v: Iu) {
        self.set_u16(self.rp, v);
        self.rp = self.rp.wrapping_add(2);
    }

    pub fn pop_return(&mut self) -> Iu {
        self.rp = self.rp.wrapping_sub(2);
        self.get_u16(self.rp)
    }

    /// Peek the return-stack top without popping (used by `I` to read the
    /// active loop counter, and by `NEXT` to decrement it in place).
    #[must_use]
    pub fn peek_return_top(&self) -> Iu {
        self.get_u16(self.rp.wrapping_sub(2))
    }

    pub fn set_return_top(&mut self, v: Iu) {
        self.set_u16(self.rp.wrapping_sub(2), v);
    }

    #[must_use]
    pub fn rp(&self) -> Iu {
        self.rp
    }

    /// Rewind the return stack to empty, without touching the dictionary.
    ///
    /// The assembler reuses this same storage as its fixup stack for
    /// pending branch patches while compiling a word (§4.2); this clears
    /// any fixups left behind by a definition aborted mid-compile.
    pub fn reset_return_stack(&mut self) {
        self.rp = self.dic_sz as Iu;
    }
}
