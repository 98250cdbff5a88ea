use std::fmt;

use miette::{Diagnostic, LabeledSpan, SourceSpan};
use thiserror::Error;

// Literal errors

#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum LiteralError {
    #[error("malformed numeric literal `{text}`")]
    #[diagnostic(
        code(literal::malformed),
        help("decimal values range from -32,768 to 32,767, hex values suffixed with `h` up to ffffh")
    )]
    Malformed { text: String },
}

// Assembler errors

/// Failure while assembling a single line.
#[derive(Clone, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum AsmErrorKind {
    #[error("unknown opcode `{0}`")]
    #[diagnostic(
        code(asm::unknown_opcode),
        help("register destinations are part of the mnemonic, eg. `MVI A, 05h` or `LXI H, 3000h`")
    )]
    UnknownOpcode(String),

    #[error("expected {expected} operand(s), found {actual}")]
    #[diagnostic(code(asm::operand_count), help("check the operands for this instruction"))]
    OperandCountMismatch { expected: usize, actual: usize },

    #[error("expected register {allowed}, found `{found}`")]
    #[diagnostic(code(asm::register))]
    InvalidRegister { found: String, allowed: &'static str },

    #[error("expected register pair {allowed}, found `{found}`")]
    #[diagnostic(code(asm::register_pair))]
    InvalidRegisterPair { found: String, allowed: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    MalformedLiteral(#[from] LiteralError),

    #[error("restart index `{0}` is out of range")]
    #[diagnostic(code(asm::index), help("restart vectors range from 0 to 7"))]
    IndexOutOfRange(String),

    #[error("label must have at least one character")]
    #[diagnostic(code(asm::empty_label))]
    EmptyLabel,

    #[error("label `{0}` is defined more than once")]
    #[diagnostic(code(asm::duplicate_label), help("labels are only allowed once per file"))]
    DuplicateLabel(String),

    #[error("label `{0}` was not defined")]
    #[diagnostic(code(asm::undefined_label))]
    UndefinedLabel(String),

    #[error("program does not fit in 64KB of memory")]
    #[diagnostic(code(asm::too_large))]
    ProgramTooLarge,
}

/// An [`AsmErrorKind`] tagged with the 0-based source line it happened on.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("error at line {line}: {kind}")]
pub struct AssemblyError {
    pub line: usize,
    /// Byte range of the offending line within the source text.
    pub span: SourceSpan,
    pub kind: AsmErrorKind,
}

impl AssemblyError {
    pub fn new(line: usize, span: impl Into<SourceSpan>, kind: AsmErrorKind) -> Self {
        AssemblyError {
            line,
            span: span.into(),
            kind,
        }
    }
}

impl Diagnostic for AssemblyError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind.help()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_with_span(Some(self.kind.to_string()), self.span);
        Some(Box::new(std::iter::once(label)))
    }
}

// Runtime errors

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error, Diagnostic)]
pub enum CpuError {
    #[error("unknown opcode 0x{opcode:02X} at address 0x{address:04X}")]
    #[diagnostic(
        code(cpu::unknown_opcode),
        help("execution may have run into data or uninitialised memory")
    )]
    UnknownOpcode { opcode: u8, address: u16 },
}
