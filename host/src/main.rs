//! `forth-host`: a stdio REPL binary driving [`forth_vm::Vm`] against a
//! real terminal, a file-backed EEPROM image, and the wall clock (§10.1 of
//! the expanded spec; matches the reference firmware's "host variant").
//!
//! ```text
//! microforth [-v|--trace] [-x|--hex] [--store PATH] [--store-size BYTES]
//! ```

mod clock;
mod gpio;
mod interrupts;
mod io;
mod store;

use clock::SystemClock;
use forth_vm::{Vm, VmConfig};
use gpio::HostGpio;
use interrupts::HostIntr;
use io::StdIo;
use store::FileStore;

/// Default path for the persisted dictionary image, relative to the
/// current directory, matching how the reference firmware treats its
/// EEPROM as a fixed sidecar file rather than something the user names
/// per invocation.
const DEFAULT_STORE_PATH: &str = "microforth.img";
/// Default store capacity: header (6 bytes) plus the default dictionary
/// region size, rounded up (§4.3).
const DEFAULT_STORE_SIZE: usize = forth_vm::arena::DEFAULT_DIC_SZ + 64;

struct CliArgs {
    trace: bool,
    hex: bool,
    store_path: String,
    store_size: usize,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        trace: false,
        hex: false,
        store_path: DEFAULT_STORE_PATH.to_string(),
        store_size: DEFAULT_STORE_SIZE,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-v" | "--trace" => cli.trace = true,
            "-x" | "--hex" => cli.hex = true,
            "--store" => {
                i += 1;
                if let Some(p) = args.get(i) {
                    cli.store_path = p.clone();
                }
            }
            "--store-size" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    match s.parse() {
                        Ok(n) => cli.store_size = n,
                        Err(_) => {
                            eprintln!("invalid --store-size: {s}");
                            std::process::exit(1);
                        }
                    }
                }
            }
            "--help" | "-h" => {
                eprintln!("Usage: microforth [-v|--trace] [-x|--hex] [--store PATH] [--store-size BYTES]");
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    cli
}

fn main() {
    let cli = parse_args();

    let store = match FileStore::open(&cli.store_path, cli.store_size) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open store {}: {e}", cli.store_path);
            std::process::exit(1);
        }
    };

    let config = VmConfig {
        trace: cli.trace,
        hex: cli.hex,
        ..VmConfig::default()
    };

    let mut vm = Vm::new(
        config,
        StdIo::new(),
        store,
        SystemClock::new(),
        HostIntr::new(),
        HostGpio::new(),
    );

    // Ctrl-C/SIGTERM terminate the process via the platform default handler
    // without any extra signal-handling code, matching the reference
    // firmware's `unix/system.c::initl` (§11.7); there is no word-level
    // cancellation to perform first.
    while !vm.is_halted() && !vm.io.is_eof() {
        if vm.tib_exhausted() {
            vm.emit_str("ok ");
        }
        forth_vm::outer::outer(&mut vm);
    }
}
