// Instruction set
mod catalog;
pub use catalog::{
    catalog, disassemble, Catalog, Decoded, Entry, Instruction, Line, Operand, OperandKind,
    INSTRUCTIONS,
};
mod ops;

// Parsing
mod literal;
pub use literal::{parse as parse_literal, parse16, parse8};
mod parser;
pub use parser::{compile, Assembler};
mod air;
pub use air::AssemblyResult;

// Running
mod runtime;
pub use runtime::{Cpu, HALT_OPCODE, MEMORY_MAX};
mod event;
pub use event::{Event, Observer};
mod flags;

mod symbol;
pub use symbol::{Flag, Pair, Register, Source, MEMORY_OFFSET};

mod error;
pub use error::{AsmErrorKind, AssemblyError, CpuError, LiteralError};

pub mod env;
pub mod output;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
