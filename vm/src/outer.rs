//! C7 — outer interpreter: reads one token per call, classifies it, and
//! routes it to the compiler (C4), the inner interpreter (C6), or an
//! immediate-word handler (§4.5).

use forth_core::{Clock, Gpio, Interrupts, Io, NvStore};

use crate::arena::Du;
use crate::assembler::{self, ParseResult};
use crate::opcode::imm;
use crate::vm::Vm;

/// Run one step of the outer interpreter: read a token, classify it, and
/// dispatch (§4.5's table). Intended to be called in a loop by the host
/// until [`Vm::is_halted`] becomes true.
pub fn outer<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let (addr, len) = vm.get_token();
    match assembler::parse(vm, addr, len, true) {
        ParseResult::Imm(op) => immediate(vm, op),
        ParseResult::Word(xt) => crate::inner::nest(vm, xt),
        ParseResult::Prm(op) => {
            crate::inner::invoke(vm, op, 0);
        }
        ParseResult::Num(n) => vm.arena.push_data(n),
        ParseResult::Jmp(_) | ParseResult::Err => vm.emit_str("?\n"),
    }
}

/// Dispatch one of the 15 immediate words (§6), indices matching
/// [`crate::opcode::imm`].
fn immediate<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, op: u8)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    match op {
        imm::COLON => assembler::compile(vm),
        imm::VAL => {
            let v = vm.arena.pop_data();
            assembler::constant(vm, v);
        }
        imm::VAR => assembler::variable(vm),
        imm::PCI => {
            let pin = vm.arena.pop_data();
            let tok = assembler::read_name(vm);
            if let Some(xt) = assembler::query(vm, tok) {
                vm.intr.add_pcisr(pin as u16, xt);
            }
        }
        imm::TMI => {
            let slot = vm.arena.pop_data();
            let period = vm.arena.pop_data();
            let tok = assembler::read_name(vm);
            if let Some(xt) = assembler::query(vm, tok) {
                vm.intr.add_tmisr(slot as u16, period as u16, xt);
            }
        }
        imm::SEX => do_save(vm, true),
        imm::SAV => do_save(vm, false),
        imm::LD => do_load(vm),
        imm::FGT => {
            let tok = assembler::read_name(vm);
            assembler::forget(vm, tok);
        }
        imm::DMP => {
            let sz = vm.arena.pop_data();
            let addr = vm.arena.pop_data();
            crate::trace::dump(vm, addr as u16, sz.max(0) as u16);
        }
        imm::SEE => {
            let tok = assembler::read_name(vm);
            crate::trace::see(vm, tok);
        }
        imm::WRD => assembler::words(vm),
        imm::DEC => vm.hex = false,
        imm::HEX => vm.hex = true,
        imm::BYE => vm.halt(),
        _ => {}
    }
}

fn do_save<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, autorun: bool)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    if let Err(e) = crate::persist::save(&vm.arena, &mut vm.store, autorun) {
        vm.emit_str("save: ");
        emit_display(vm, &e);
        vm.emit_char(b'\n');
    }
}

fn do_load<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    let xt = crate::persist::load(&mut vm.arena, &vm.store, false);
    if xt == crate::arena::LFA_END {
        return;
    }
    crate::inner::nest(vm, xt);
}

// `core::fmt::Display` isn't free to drive through a `no_std` putchar loop
// without an allocating formatter; `PersistError` only ever has the one
// variant a caller needs a human-readable size pair from, so print it
// directly rather than routing through `write!`.
fn emit_display<IO, ST, CL, IR, GP>(vm: &mut Vm<IO, ST, CL, IR, GP>, e: &crate::persist::PersistError)
where
    IO: Io,
    ST: NvStore,
    CL: Clock,
    IR: Interrupts,
    GP: Gpio,
{
    match e {
        crate::persist::PersistError::TooSmall { needed, available } => {
            vm.emit_str("need ");
            vm.emit_num(*needed as Du);
            vm.emit_str(" have ");
            vm.emit_num(*available as Du);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmConfig;

    struct TestIo {
        out: alloc::vec::Vec<u8>,
        input: alloc::vec::Vec<u8>,
        pos: usize,
    }

    impl Io for TestIo {
        fn getchar(&mut self) -> u8 {
            let b = self.input.get(self.pos).copied().unwrap_or(b'\n');
            self.pos += 1;
            b
        }
        fn putchar(&mut self, b: u8) {
            self.out.push(b);
        }
    }

    #[derive(Default)]
    struct TestStore {
        bytes: alloc::vec::Vec<u8>,
    }
    impl NvStore for TestStore {
        fn length(&self) -> usize {
            self.bytes.len()
        }
        fn read(&self, addr: usize) -> u8 {
            self.bytes[addr]
        }
        fn update(&mut self, addr: usize, value: u8) {
            self.bytes[addr] = value;
        }
    }

    struct TestClock;
    impl Clock for TestClock {
        fn millis(&self) -> u32 {
            0
        }
        fn delay(&mut self, _ms: u32) {}
    }

    struct TestIntr;
    impl Interrupts for TestIntr {
        fn reset(&mut self) {}
        fn add_pcisr(&mut self, _pin: u16, _xt: u16) {}
        fn add_tmisr(&mut self, _slot: u16, _period_10ms: u16, _xt: u16) {}
        fn enable_pci(&mut self, _mask: u16) {}
        fn enable_timer(&mut self, _enable: bool) {}
        fn poll(&mut self) -> Option<u16> {
            None
        }
    }

    struct TestGpio;
    impl Gpio for TestGpio {
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

    fn new_vm(line: &str, store_len: usize) -> Vm<TestIo, TestStore, TestClock, TestIntr, TestGpio> {
        let io = TestIo {
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
            TestStore {
                bytes: alloc::vec![0u8; store_len],
            },
            TestClock,
            TestIntr,
            TestGpio,
        )
    }

    #[test]
    fn literal_then_dot_prints_value() {
        let mut vm = new_vm("1 2 + . \n", 0);
        outer(&mut vm);
        outer(&mut vm);
        outer(&mut vm);
        outer(&mut vm);
        assert_eq!(vm.io.out, b"3 ");
    }

    #[test]
    fn colon_word_runs_through_outer() {
        let mut vm = new_vm(": SQR DUP * ;\n5 SQR . \n", 0);
        outer(&mut vm); // :
        outer(&mut vm); // 5
        outer(&mut vm); // SQR
        outer(&mut vm); // .
        assert_eq!(vm.io.out, b"25 ");
    }

    #[test]
    fn for_next_loop_via_outer() {
        // FOR pushes N itself (not N-1) onto the return stack, and NXT
        // decrements before checking, so the loop runs N down to 1 (§4.4,
        // matching `n4_vm.cpp`'s `RPUSH(POP())` / `if (!--(*(vm.rp-1)))`).
        let mut vm = new_vm(": CNT 5 FOR I . NEXT ;\nCNT\n", 0);
        outer(&mut vm);
        outer(&mut vm);
        assert_eq!(vm.io.out, b"5 4 3 2 1 ");
    }

    #[test]
    fn unknown_token_prints_error() {
        let mut vm = new_vm("@@@\n", 0);
        outer(&mut vm);
        assert_eq!(vm.io.out, b"?\n");
    }

    #[test]
    fn bye_halts_outer_loop() {
        let mut vm = new_vm("BYE\n", 0);
        assert!(!vm.is_halted());
        outer(&mut vm);
        assert!(vm.is_halted());
    }

    #[test]
    fn save_then_load_round_trips_dictionary() {
        let mut vm = new_vm(": INC 1 + ;\nSAV\n", 64);
        outer(&mut vm); // : INC 1 + ;
        outer(&mut vm); // SAV
        let here_before = vm.arena.here();
        let last_before = vm.arena.last();

        vm.arena.reset();
        assert!(crate::assembler::find_word(&vm, crate::token::pad3(b"INC")).is_none());

        let xt = crate::persist::load(&mut vm.arena, &vm.store, false);
        assert_eq!(xt, crate::arena::LFA_END);
        assert_eq!(vm.arena.here(), here_before);
        assert_eq!(vm.arena.last(), last_before);
        assert!(crate::assembler::find_word(&vm, crate::token::pad3(b"INC")).is_some());
    }

    #[test]
    fn save_reports_error_when_store_too_small() {
        let mut vm = new_vm(": INC 1 + ;\nSAV\n", 2);
        outer(&mut vm); // : INC 1 + ;
        outer(&mut vm); // SAV
        assert!(vm.io.out.starts_with(b"save: need "));
    }
}
