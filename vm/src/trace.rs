//! C8 — tracer/disassembler: pretty-print a compiled word (`SEE`) and the
//! single-step execution trace (§4.6).

use forth_core::{Clock, Gpio, Interrupts, Io, NvStore};

use crate::arena::{Du, Du2, Iu};
use crate::opcode::{self, OpClass, classify, prim};
use crate::vm::Vm;

/// Which context a step is being printed from: the running inner
/// interpreter (compact, call-depth indented), or a non-executing `SEE`
/// disassembly (one opcode per line).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Exec,
    See,
}

/// Print one opcode at `addr` and return the address of the following
/// opcode, mirroring the original firmware's combined tracer/disassembler
/// (§4.6, §4.2 `see`).
pub fn step<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, addr: Iu, mode: Mode) -> Iu
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    vm.emit_addr(addr);
    let byte = vm.arena.get(addr);
    let next = match classify(byte) {
        OpClass::Branch(tag) => {
            let w = opcode::branch_target(byte, vm.arena.get(addr.wrapping_add(1)));
            match tag {
                opcode::OP_CALL => {
                    let name = crate::assembler::name_at_xt(vm, w);
                    vm.emit_char(b':');
                    vm.emit_name(name.unwrap_or([b'?', b'?', b'?']));
                    if mode == Mode::Exec {
                        vm.emit_str("\n....");
                        vm.indent += 1;
                        for _ in 0..vm.indent {
                            vm.emit_str("  ");
                        }
                    }
                }
                opcode::OP_CDJ => {
                    vm.emit_char(b'?');
                    vm.emit_addr(w);
                }
                opcode::OP_UDJ => {
                    vm.emit_char(b'j');
                    vm.emit_addr(w);
                }
                opcode::OP_NXT => {
                    if mode == Mode::Exec {
                        vm.emit_char(b'r');
                        vm.emit_addr(w);
                    } else {
                        vm.emit_str("_NXT");
                    }
                }
                _ => unreachable!("branch tag is one of the four 11nn patterns"),
            }
            addr.wrapping_add(2)
        }
        OpClass::Primitive(op) => {
            let op = op & opcode::PRM_MASK;
            match op {
                prim::NOP => {
                    vm.emit_str("_;");
                    if vm.indent > 0 {
                        vm.indent -= 1;
                    }
                    addr.wrapping_add(1)
                }
                prim::DOT_QUOTE | prim::S_QUOTE => {
                    let p = addr.wrapping_add(1);
                    vm.emit_char(if op == prim::DOT_QUOTE { b'"' } else { b'$' });
                    let len = vm.arena.get(p);
                    vm.emit_inline_string(p);
                    p.wrapping_add(u16::from(len)).wrapping_add(1)
                }
                prim::LOOP_I | prim::FOR => {
                    vm.emit_char(b'_');
                    let idx = (op - prim::LOOP_I) as usize;
                    vm.emit_name_str(opcode::PMX_NAMES[idx]);
                    addr.wrapping_add(1)
                }
                prim::LIT => {
                    let p = addr.wrapping_add(1);
                    let w = vm.arena.get_u16(p) as Du;
                    vm.emit_char(b'#');
                    vm.emit_num(w);
                    p.wrapping_add(2)
                }
                _ => {
                    vm.emit_char(b'_');
                    vm.emit_name_str(prim::NAMES[op as usize]);
                    addr.wrapping_add(1)
                }
            }
        }
        OpClass::Literal(v) => {
            vm.emit_char(b'#');
            vm.emit_num(Du::from(v));
            addr.wrapping_add(1)
        }
    };
    if mode == Mode::See {
        vm.emit_char(b'\n');
    } else {
        vm.emit_char(b' ');
    }
    next
}

/// Non-executing disassembly of a colon word: `SEE NAME` (§4.2, §4.6).
/// Prints `?!` and returns if `tok` does not name a colon word.
pub fn see<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, tok: [u8; 3])
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let Some(xt) = crate::assembler::query(vm, tok) else {
        return;
    };
    let name_addr = xt.wrapping_sub(3);
    vm.emit_char(b':');
    vm.emit_name(vm.word_name(name_addr));
    vm.emit_char(b'\n');

    let mut addr = xt;
    while vm.arena.get(addr) != (opcode::PRM_TAG | prim::NOP) {
        vm.emit_str("  ");
        addr = step(vm, addr, Mode::See);
    }
    vm.emit_addr(addr);
    vm.emit_str("_; ");
}

/// 32-bit millisecond clock split into low/high 16-bit cells, pushed
/// low-cell-first (§11.4 of the expanded spec).
pub fn split_clock(millis: u32) -> (Du, Du) {
    let d = Du2::from(millis as i32);
    (d as Du, (d >> 16) as Du)
}

/// Bytes printed per row of a `DMP` dump.
const DUMP_ROW: u16 = 16;
/// `_dump` aligns its start address down and its size up to this boundary
/// (`0xffe0` mask), two hex rows per block, before laying out rows.
const DUMP_ALIGN: u16 = 0x20;

/// `DMP`: print `sz` bytes of the arena starting at `addr` in hex, 16 bytes
/// per row, followed by an ASCII gutter (non-printables shown as `_`),
/// matching the reference firmware's `_dump` (§6, §9).
pub fn dump<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, addr: Iu, sz: Iu)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let start = addr & !(DUMP_ALIGN - 1);
    let sz_aligned = sz.wrapping_add(DUMP_ALIGN - 1) & !(DUMP_ALIGN - 1);
    let rows = sz_aligned / DUMP_ROW;
    for row in 0..rows {
        let base = start.wrapping_add(row * DUMP_ROW);
        vm.emit_char(b'\n');
        vm.emit_addr(base);
        vm.emit_char(b' ');
        for i in 0..DUMP_ROW {
            let b = vm.arena.get(base.wrapping_add(i));
            const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
            vm.emit_char(DIGITS[(b >> 4) as usize]);
            vm.emit_char(DIGITS[(b & 0xF) as usize]);
            vm.emit_char(b' ');
        }
        vm.emit_char(b' ');
        for i in 0..DUMP_ROW {
            let c = vm.arena.get(base.wrapping_add(i)) & 0x7F;
            vm.emit_char(if c < 0x20 || c == 0x7F { b'_' } else { c });
        }
    }
    vm.emit_char(b'\n');
}
