//! C4 — the assembler: dictionary search, token classification, and
//! compile-time code generation, including the `IF`/`ELSE`/`THEN` family's
//! backpatching and the `CREATE`...`DOES>` splice (§4.2).

use forth_core::{Clock, Gpio, Interrupts, Io, NvStore};

use crate::arena::{Du, Iu, LFA_END};
use crate::opcode::{self, OP_CALL, OP_CDJ, OP_NXT, OP_UDJ, encode_branch, jmp, prim};
use crate::token;
use crate::vm::Vm;

/// Result of classifying one token against the dictionary, the two
/// reserved-word tables, the primitive table, and finally as a number
/// literal (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    /// Found in the dictionary; carries its execution token.
    Word(Iu),
    /// One of the 15 immediate (outer-interpreter) words.
    Imm(u8),
    /// One of the 11 compile-mode control words (`IF`, `THEN`, ...).
    Jmp(u8),
    /// One of the 64 primitives.
    Prm(u8),
    /// A number literal.
    Num(Du),
    /// Not recognized by anything above.
    Err,
}

fn pad3_from_arena<IO, ST, CL, IR, GP>(
    vm: &Vm<IO, ST, CL, IR, GP>,
    addr: Iu,
    len: usize,
) -> [u8; 3]
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let a = addr as usize;
    let l = len.min(3);
    token::pad3(&vm.arena.bytes()[a..a + l])
}

fn scan_table<IO, ST, CL, IR, GP>(
    vm: &Vm<IO, ST, CL, IR, GP>,
    name: [u8; 3],
    table: &[&str],
) -> Option<u8>
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    table.iter().position(|s| {
        let cand = token::pad3(s.as_bytes());
        token::name_eq(name, cand, vm.case_sensitive)
    }).map(|i| i as u8)
}

/// Walk the dictionary from `last` looking for `name`, returning its xt
/// (`lfa + 5`: 2-byte link + 3-byte name) if found.
pub fn find_word<IO, ST, CL, IR, GP>(vm: &Vm<IO, ST, CL, IR, GP>, name: [u8; 3]) -> Option<Iu>
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let mut lfa = vm.arena.last();
    while lfa != LFA_END {
        if token::name_eq(vm.word_name(lfa.wrapping_add(2)), name, vm.case_sensitive) {
            return Some(lfa.wrapping_add(5));
        }
        lfa = vm.arena.get_u16(lfa);
    }
    None
}

/// Walk the dictionary looking for the entry whose xt equals `xt`,
/// returning its name. Used by the tracer to print `CALL` targets by name.
pub fn name_at_xt<IO, ST, CL, IR, GP>(vm: &Vm<IO, ST, CL, IR, GP>, xt: Iu) -> Option<[u8; 3]>
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let mut lfa = vm.arena.last();
    while lfa != LFA_END {
        if lfa.wrapping_add(5) == xt {
            return Some(vm.word_name(lfa.wrapping_add(2)));
        }
        lfa = vm.arena.get_u16(lfa);
    }
    None
}

/// Read the next token and pad it to the 3-byte name width.
pub fn read_name<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>) -> [u8; 3]
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let (addr, len) = vm.get_token();
    pad3_from_arena(vm, addr, len)
}

/// Resolve an already-tokenized name to its xt, printing `?!` on failure
/// (§7: "name not found by `SEE`/`FORGET`"; also used by the tick and
/// `PCI`/`TMI` interrupt-installer words, which share the same lookup).
pub fn query<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, tok: [u8; 3]) -> Option<Iu>
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    match find_word(vm, tok) {
        Some(xt) => Some(xt),
        None => {
            vm.emit_str("?! ");
            None
        }
    }
}

/// Classify the token at `addr..addr+len` (§4.5). `run_mode` selects
/// whether the 15-entry immediate table or the 11-entry branch-word table
/// is consulted; the dictionary and the 64-entry primitive table are
/// checked in both modes.
pub fn parse<IO, ST, CL, IR, GP>(
    vm: &Vm<IO, ST, CL, IR, GP>,
    addr: Iu,
    len: usize,
    run_mode: bool,
) -> ParseResult
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let name = pad3_from_arena(vm, addr, len);
    if let Some(xt) = find_word(vm, name) {
        return ParseResult::Word(xt);
    }
    if run_mode {
        if let Some(idx) = scan_table(vm, name, &opcode::imm::NAMES) {
            return ParseResult::Imm(idx);
        }
    } else if let Some(idx) = scan_table(vm, name, &jmp::NAMES) {
        return ParseResult::Jmp(idx);
    }
    if let Some(idx) = scan_table(vm, name, &prim::NAMES) {
        return ParseResult::Prm(idx);
    }
    let a = addr as usize;
    if let Some(n) = token::parse_number(&vm.arena.bytes()[a..a + len], vm.hex) {
        return ParseResult::Num(n);
    }
    ParseResult::Err
}

/// Add a new dictionary header (link + 3-byte name), reading the name from
/// the next input token. Warns (but does not abort) on a name collision —
/// the new entry still shadows the old one by linear search order (§7,
/// §9: the older entry becomes unreachable by name but is not reclaimed).
/// Returns the new entry's lfa.
pub fn add_word<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>) -> Iu
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let l0 = vm.arena.last();
    let name = read_name(vm);
    if find_word(vm, name).is_some() {
        vm.emit_str("reDef?\n");
    }
    let lfa = vm.arena.here();
    vm.arena.emit16(l0);
    for b in name {
        vm.arena.emit8(b);
    }
    vm.arena.set_last(lfa);
    lfa
}

fn patch<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, slot: Iu, target: Iu)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let tag = vm.arena.get(slot) & opcode::JMP_MASK;
    vm.arena.set_u16(slot, encode_branch(tag, target));
}

fn emit_placeholder<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, tag: u8)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    vm.arena.emit16(encode_branch(tag, 0));
}

fn emit_jump<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, tag: u8, target: Iu)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    vm.arena.emit16(encode_branch(tag, target));
}

/// Apply one of the 11 compile-mode control words, using the return
/// stack's storage as a transient fixup stack (§4.2).
pub fn add_branch<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, op: u8)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    match op {
        jmp::THEN => {
            let slot = vm.arena.pop_return();
            let here = vm.arena.here();
            patch(vm, slot, here);
        }
        jmp::ELSE => {
            let slot = vm.arena.pop_return();
            patch(vm, slot, vm.arena.here().wrapping_add(2));
            vm.arena.push_return(vm.arena.here());
            emit_placeholder(vm, OP_UDJ);
        }
        jmp::IF => {
            vm.arena.push_return(vm.arena.here());
            emit_placeholder(vm, OP_CDJ);
        }
        jmp::REPEAT => {
            let inner = vm.arena.pop_return();
            patch(vm, inner, vm.arena.here().wrapping_add(2));
            let outer = vm.arena.pop_return();
            emit_jump(vm, OP_UDJ, outer);
        }
        jmp::UNTIL => {
            let slot = vm.arena.pop_return();
            emit_jump(vm, OP_CDJ, slot);
        }
        jmp::WHILE => {
            vm.arena.push_return(vm.arena.here());
            emit_placeholder(vm, OP_CDJ);
        }
        jmp::BEGIN => {
            vm.arena.push_return(vm.arena.here());
        }
        jmp::NEXT => {
            let slot = vm.arena.pop_return();
            emit_jump(vm, OP_NXT, slot);
        }
        jmp::I => {
            vm.arena.emit8(opcode::PRM_TAG | prim::LOOP_I);
        }
        jmp::FOR => {
            vm.arena.emit8(opcode::PRM_TAG | prim::FOR);
            vm.arena.push_return(vm.arena.here());
        }
        jmp::SEMI => {
            vm.arena.emit8(opcode::PRM_TAG | prim::NOP);
        }
        _ => {}
    }
}

/// Capture the quoted-string payload following `."`/`S"` into the
/// dictionary as a counted string (length byte + raw bytes), truncating
/// past 255 bytes. Returns the address of the length byte.
fn capture_into_dict<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>) -> Iu
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let (start, len) = vm.capture_quoted();
    let len = len.min(255);
    let h0 = vm.arena.here();
    vm.arena.emit8(len as u8);
    for i in 0..len as u16 {
        let b = vm.arena.get(start.wrapping_add(i));
        vm.arena.emit8(b);
    }
    h0
}

/// Compile-mode `."`/`S"`: append the quoted payload after the opcode byte
/// already emitted by the caller.
pub fn add_str<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    capture_into_dict(vm);
}

/// Interpret-mode `."`: print the quoted payload immediately, using the
/// free dictionary space past `here` as scratch without actually growing
/// the dictionary.
pub fn dot_str<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let h0 = vm.arena.here();
    capture_into_dict(vm);
    vm.emit_inline_string(h0);
    vm.arena.set_here(h0);
}

/// Interpret-mode `S"`: capture the quoted payload into scratch space past
/// `here` (without growing the dictionary) and return `(addr, len)` of the
/// length byte, the same shape a compiled `S"` opcode leaves on the data
/// stack (§11.3 of the expanded spec: the original has no defined behavior
/// for `S"` typed outside a colon word; this mirrors `dot_str`'s scratch-
/// space trick rather than leaving it undefined).
pub fn quote_str<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>) -> (Iu, u8)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let h0 = vm.arena.here();
    capture_into_dict(vm);
    let len = vm.arena.get(h0);
    vm.arena.set_here(h0);
    (h0, len)
}

/// Compile a colon definition: `add_word` for the header, then read and
/// emit tokens until `;` or a parse error (§4.2, §6).
pub fn compile<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let l0 = vm.arena.last();
    let h0 = vm.arena.here();
    vm.arena.reset_return_stack();
    add_word(vm);

    loop {
        let (addr, len) = vm.get_token();
        match parse(vm, addr, len, false) {
            ParseResult::Jmp(idx) => {
                add_branch(vm, idx);
                if idx == jmp::SEMI {
                    break;
                }
            }
            ParseResult::Word(xt) => {
                vm.arena.emit16(encode_branch(OP_CALL, xt));
            }
            ParseResult::Prm(op) => {
                vm.arena.emit8(opcode::PRM_TAG | op);
                if op == prim::DOT_QUOTE || op == prim::S_QUOTE {
                    add_str(vm);
                }
            }
            ParseResult::Num(n) => {
                if (0..128).contains(&n) {
                    vm.arena.emit8(n as u8);
                } else {
                    vm.arena.emit8(opcode::PRM_TAG | prim::LIT);
                    vm.arena.emit16(n as u16);
                }
            }
            ParseResult::Imm(_) | ParseResult::Err => {
                vm.emit_str("?? ");
                vm.arena.set_here(h0);
                vm.arena.set_last(l0);
                break;
            }
        }
    }
}

/// `CREATE`: add a header whose body is a single literal pushing the
/// address just past it (the word's parameter field), terminated by `NOP`
/// (§4.2, §11.2).
pub fn create<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    add_word(vm);
    let h0 = vm.arena.here();
    let mut tmp = h0.wrapping_add(2);
    if tmp < 128 {
        vm.arena.emit8(tmp as u8);
    } else {
        tmp = tmp.wrapping_add(2);
        vm.arena.emit8(opcode::PRM_TAG | prim::LIT);
        vm.arena.emit16(tmp);
    }
    vm.arena.emit8(opcode::PRM_TAG | prim::NOP);
}

/// `VARIABLE`: `CREATE` plus one zero-initialized 16-bit storage cell.
pub fn variable<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    create(vm);
    vm.arena.emit16(0);
}

/// `CONSTANT`: a header whose body just pushes `v` (§4.2).
pub fn constant<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, v: Du)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    add_word(vm);
    if (0..128).contains(&v) {
        vm.arena.emit8(v as u8);
    } else {
        vm.arena.emit8(opcode::PRM_TAG | prim::LIT);
        vm.arena.emit16(v as u16);
    }
    vm.arena.emit8(opcode::PRM_TAG | prim::NOP);
}

/// `DOES>`: splice a jump to `xt` (the code following `DOES>` in the
/// defining word) into the most recently `CREATE`d word, replacing its
/// trailing `NOP` and shifting any data already `,`-appended past it
/// forward by two bytes (§4.2, §11.2).
pub fn does<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, xt: Iu)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let mut p = vm.arena.here().wrapping_sub(1);
    while vm.arena.get(p) != (opcode::PRM_TAG | prim::NOP) {
        let b = vm.arena.get(p);
        vm.arena.set(p.wrapping_add(2), b);
        p = p.wrapping_sub(1);
    }
    let adj_pos = p.wrapping_sub(1);
    let adj = vm.arena.get(adj_pos).wrapping_add(2);
    vm.arena.set(adj_pos, adj);
    vm.arena.set_u16(p, encode_branch(OP_UDJ, xt));
    vm.arena.set(p.wrapping_add(2), opcode::PRM_TAG | prim::NOP);
    vm.arena.set_here(vm.arena.here().wrapping_add(2));
}

/// `,`: append a 16-bit cell to the dictionary at `here`.
pub fn comma<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, v: Du)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    vm.arena.emit16(v as u16);
}

/// `C,`: append one byte to the dictionary at `here`.
pub fn ccomma<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, v: Du)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    vm.arena.emit8(v as u8);
}

/// `FORGET NAME`: truncate the dictionary back to (and including) the
/// named entry. Prints `?!` if the name is unknown (§7).
pub fn forget<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, name: [u8; 3])
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let mut lfa = vm.arena.last();
    while lfa != LFA_END {
        if token::name_eq(vm.word_name(lfa.wrapping_add(2)), name, vm.case_sensitive) {
            let prev = vm.arena.get_u16(lfa);
            vm.arena.set_here(lfa);
            vm.arena.set_last(prev);
            return;
        }
        lfa = vm.arena.get_u16(lfa);
    }
    vm.emit_str("?! ");
}

/// `WORDS`: print every dictionary entry's name, most recently defined
/// first, then the three static vocabularies (immediate, branch, and
/// primitive words), matching `_list_voc`'s full listing.
pub fn words<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let mut lfa = vm.arena.last();
    while lfa != LFA_END {
        let name = vm.word_name(lfa.wrapping_add(2));
        vm.emit_name(name);
        vm.emit_char(b' ');
        lfa = vm.arena.get_u16(lfa);
    }
    for table in [&opcode::imm::NAMES[..], &jmp::NAMES[..], &prim::NAMES[..]] {
        vm.emit_char(b'\n');
        for name in table {
            vm.emit_name_str(name);
            vm.emit_char(b' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmConfig;

    struct FakeIo {
        out: alloc::vec::Vec<u8>,
        input: alloc::vec::Vec<u8>,
        pos: usize,
    }

    impl Io for FakeIo {
        fn getchar(&mut self) -> u8 {
            let b = self.input.get(self.pos).copied().unwrap_or(b'\n');
            self.pos += 1;
            b
        }
        fn putchar(&mut self, b: u8) {
            self.out.push(b);
        }
    }

    struct FakeStore;
    impl NvStore for FakeStore {
        fn length(&self) -> usize {
            0
        }
        fn read(&self, _addr: usize) -> u8 {
            0
        }
        fn update(&mut self, _addr: usize, _value: u8) {}
    }

    struct FakeClock;
    impl Clock for FakeClock {
        fn millis(&self) -> u32 {
            0
        }
    }

    struct FakeIntr;
    impl Interrupts for FakeIntr {
        fn reset(&mut self) {}
        fn add_pcisr(&mut self, _pin: u16, _xt: u16) {}
        fn add_tmisr(&mut self, _slot: u16, _period_10ms: u16, _xt: u16) {}
        fn enable_pci(&mut self, _mask: u16) {}
        fn enable_timer(&mut self, _enable: bool) {}
        fn poll(&mut self) -> Option<u16> {
            None
        }
    }

    struct FakeGpio;
    impl Gpio for FakeGpio {
        fn pin_mode(&mut self, _pin: u16, _mode: u16) {}
        fn digital_read(&mut self, _pin: u16) -> u16 {
            0
        }
        fn digital_write(&mut self, _pin: u16, _value: u16) {}
        fn analog_read(&mut self, _pin: u16) -> u16 {
            0
        }
        fn pwm_write(&mut self, _pin: u16, _value: u16) {}
    }

    fn new_vm(line: &str) -> Vm<FakeIo, FakeStore, FakeClock, FakeIntr, FakeGpio> {
        let io = FakeIo {
            out: alloc::vec::Vec::new(),
            input: line.as_bytes().to_vec(),
            pos: 0,
        };
        Vm::new(
            VmConfig {
                autorun_on_boot: false,
                ..VmConfig::default()
            },
            io,
            FakeStore,
            FakeClock,
            FakeIntr,
            FakeGpio,
        )
    }

    #[test]
    fn compile_then_find_word() {
        let mut vm = new_vm(": SQR DUP * ;\n");
        compile(&mut vm);
        let name = token::pad3(b"SQR");
        assert!(find_word(&vm, name).is_some());
    }

    #[test]
    fn scan_table_finds_primitive_by_name() {
        let vm = new_vm("");
        assert_eq!(
            scan_table(&vm, token::pad3(b"DUP"), &prim::NAMES),
            Some(prim::DUP)
        );
        assert_eq!(scan_table(&vm, token::pad3(b"XYZ"), &prim::NAMES), None);
    }

    #[test]
    fn parse_classifies_number_word_and_primitive() {
        let mut vm = new_vm("");
        vm.arena.set(100, b'1');
        vm.arena.set(101, b'2');
        vm.arena.set(102, b'8');
        assert_eq!(parse(&vm, 100, 3, false), ParseResult::Num(128));

        vm.arena.set(200, b'D');
        vm.arena.set(201, b'U');
        vm.arena.set(202, b'P');
        assert_eq!(parse(&vm, 200, 3, false), ParseResult::Prm(prim::DUP));
    }

    #[test]
    fn forget_truncates_dictionary() {
        let mut vm = new_vm(": A DUP ;\n: B DUP ;\n");
        compile(&mut vm);
        compile(&mut vm);
        assert!(find_word(&vm, token::pad3(b"A")).is_some());
        forget(&mut vm, token::pad3(b"A"));
        assert!(find_word(&vm, token::pad3(b"A")).is_none());
        assert!(find_word(&vm, token::pad3(b"B")).is_none());
    }
}
