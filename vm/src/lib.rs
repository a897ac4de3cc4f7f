//! microForth: a minimal Forth-family VM for constrained environments.
//!
//! Three layers, leaves first:
//! - [`arena`] (C1) — the single byte array holding dictionary, stacks, and
//!   input buffer.
//! - [`opcode`] (C3) and [`token`] (C2) — the bit-level instruction layout
//!   and the token/number helpers the assembler and outer interpreter share.
//! - [`assembler`] (C4), [`persist`] (C5), [`inner`] (C6), [`outer`] (C7),
//!   and [`trace`] (C8) — the compiler, the save/load format, the threaded
//!   interpreter, the REPL front end, and the disassembler/tracer.
//!
//! [`Vm`] ties these to a set of `forth-core` collaborators and is the only
//! type most callers need.

#![no_std]

extern crate alloc;

pub mod arena;
pub mod assembler;
pub mod inner;
pub mod opcode;
pub mod outer;
pub mod persist;
pub mod token;
pub mod trace;
mod vm;

pub use arena::{Arena, Du, Iu, LFA_END};
pub use persist::PersistError;
pub use vm::{Vm, VmConfig};
