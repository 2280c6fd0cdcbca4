//! Virtual machine
//!
//! Stack-based bytecode interpreter plus the value operations it shares with
//! the builtins.

pub mod interpreter;
pub mod opcode;
pub mod ops;
pub mod stack;

pub use interpreter::{call, construct, run_function};
pub use opcode::OpCode;
#[cfg(feature = "dump")]
pub use opcode::disassemble;
