//! Instruction catalog shared by the assembler and the emulator.
//!
//! The table in [`INSTRUCTIONS`] is the only place an opcode is described.
//! [`Catalog::build`] expands every row into one entry per register, pair or
//! restart index it can address, keyed both by mnemonic (for encoding) and by
//! concrete opcode byte (for decoding).

use std::fmt;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::ops;
use crate::runtime::Cpu;
use crate::symbol::{Pair, Register, Source};

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// What an instruction's single operand addresses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandKind {
    None,
    Data8,
    Data16,
    LabelAddress16,
    /// Register coded into the opcode; no memory form.
    Register,
    /// Register coded into the opcode, or `M` for the byte at H:L.
    RegisterOrMemory,
    RegisterPairOrSP,
    RegisterPairOrPSW,
    RegisterPairBD,
    /// Restart vector 0-7.
    Index3Bit,
}

impl OperandKind {
    /// Number of operands written in source.
    pub fn operand_count(self) -> usize {
        match self {
            OperandKind::None => 0,
            _ => 1,
        }
    }

    /// Bytes following the opcode byte.
    pub fn immediate_len(self) -> usize {
        match self {
            OperandKind::Data8 => 1,
            OperandKind::Data16 | OperandKind::LabelAddress16 => 2,
            _ => 0,
        }
    }
}

/// Operand value handed to an instruction's action.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    None,
    Byte(u8),
    Word(u16),
    Reg(Register),
    Source(Source),
    Pair(Pair),
    Index(u8),
}

impl Operand {
    /// Offset this operand adds to an instruction's base code, before spacing.
    fn offset(self) -> u8 {
        match self {
            Operand::Reg(reg) => reg.offset(),
            Operand::Source(source) => source.offset(),
            Operand::Pair(pair) => pair.offset(),
            Operand::Index(index) => index,
            Operand::None | Operand::Byte(_) | Operand::Word(_) => 0,
        }
    }
}

/// Semantic action of an instruction. The variant fixes the operand it takes.
#[derive(Clone, Copy)]
pub enum Action {
    Implied(fn(&mut Cpu)),
    Byte(fn(&mut Cpu, u8)),
    Word(fn(&mut Cpu, u16)),
    Reg(fn(&mut Cpu, Register)),
    Source(fn(&mut Cpu, Source)),
    Pair(fn(&mut Cpu, Pair)),
    Index(fn(&mut Cpu, u8)),
}

/// One row of the instruction table.
pub struct Instruction {
    mnemonic: &'static str,
    code: u8,
    kind: OperandKind,
    spacing: u8,
    description: &'static str,
    action: Action,
}

impl Instruction {
    const fn new(
        mnemonic: &'static str,
        code: u8,
        kind: OperandKind,
        description: &'static str,
        action: Action,
    ) -> Self {
        Instruction {
            mnemonic,
            code,
            kind,
            spacing: 1,
            description,
            action,
        }
    }

    const fn implied(m: &'static str, code: u8, desc: &'static str, f: fn(&mut Cpu)) -> Self {
        Self::new(m, code, OperandKind::None, desc, Action::Implied(f))
    }

    const fn data8(m: &'static str, code: u8, desc: &'static str, f: fn(&mut Cpu, u8)) -> Self {
        Self::new(m, code, OperandKind::Data8, desc, Action::Byte(f))
    }

    const fn data16(m: &'static str, code: u8, desc: &'static str, f: fn(&mut Cpu, u16)) -> Self {
        Self::new(m, code, OperandKind::Data16, desc, Action::Word(f))
    }

    const fn address(m: &'static str, code: u8, desc: &'static str, f: fn(&mut Cpu, u16)) -> Self {
        Self::new(m, code, OperandKind::LabelAddress16, desc, Action::Word(f))
    }

    const fn register(
        m: &'static str,
        code: u8,
        desc: &'static str,
        f: fn(&mut Cpu, Register),
    ) -> Self {
        Self::new(m, code, OperandKind::Register, desc, Action::Reg(f))
    }

    const fn source(m: &'static str, code: u8, desc: &'static str, f: fn(&mut Cpu, Source)) -> Self {
        Self::new(m, code, OperandKind::RegisterOrMemory, desc, Action::Source(f))
    }

    const fn pair(
        m: &'static str,
        code: u8,
        kind: OperandKind,
        desc: &'static str,
        f: fn(&mut Cpu, Pair),
    ) -> Self {
        Self::new(m, code, kind, desc, Action::Pair(f))
    }

    const fn restart(m: &'static str, code: u8, desc: &'static str, f: fn(&mut Cpu, u8)) -> Self {
        Self::new(m, code, OperandKind::Index3Bit, desc, Action::Index(f)).spaced(8)
    }

    const fn spaced(self, spacing: u8) -> Self {
        Instruction { spacing, ..self }
    }

    /// Lower-case mnemonic, including any register baked into it (eg. `mvi a`).
    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }

    pub fn kind(&self) -> OperandKind {
        self.kind
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Opcode byte for a register-coded operand, or the base code otherwise.
    pub fn opcode_for(&self, operand: Operand) -> u8 {
        self.code + operand.offset() * self.spacing
    }

    /// Operands this instruction can encode into its opcode byte.
    fn selectors(&self) -> Vec<Operand> {
        match self.kind {
            OperandKind::None
            | OperandKind::Data8
            | OperandKind::Data16
            | OperandKind::LabelAddress16 => vec![Operand::None],
            OperandKind::Register => Register::ALL.into_iter().map(Operand::Reg).collect(),
            OperandKind::RegisterOrMemory => Source::ALL.into_iter().map(Operand::Source).collect(),
            OperandKind::RegisterPairOrSP => Pair::WITH_SP.into_iter().map(Operand::Pair).collect(),
            OperandKind::RegisterPairOrPSW => {
                Pair::WITH_PSW.into_iter().map(Operand::Pair).collect()
            }
            OperandKind::RegisterPairBD => Pair::BD.into_iter().map(Operand::Pair).collect(),
            OperandKind::Index3Bit => (0..8).map(Operand::Index).collect(),
        }
    }

    /// Run this instruction's action.
    pub(crate) fn execute(&self, cpu: &mut Cpu, operand: Operand) {
        match (self.action, operand) {
            (Action::Implied(f), Operand::None) => f(cpu),
            (Action::Byte(f), Operand::Byte(value)) => f(cpu, value),
            (Action::Word(f), Operand::Word(value)) => f(cpu, value),
            (Action::Reg(f), Operand::Reg(reg)) => f(cpu, reg),
            (Action::Source(f), Operand::Source(source)) => f(cpu, source),
            (Action::Pair(f), Operand::Pair(pair)) => f(cpu, pair),
            (Action::Index(f), Operand::Index(index)) => f(cpu, index),
            (_, operand) => unreachable!("`{}` cannot take operand {:?}", self.mnemonic, operand),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("mnemonic", &self.mnemonic)
            .field("code", &format_args!("0x{:02X}", self.code))
            .field("kind", &self.kind)
            .field("spacing", &self.spacing)
            .finish()
    }
}

impl PartialEq for Instruction {
    fn eq(&self, other: &Self) -> bool {
        self.mnemonic == other.mnemonic && self.code == other.code
    }
}

/// Concrete opcode produced by expanding an [`Instruction`].
#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub instruction: &'static Instruction,
    pub opcode: u8,
    /// Operand coded into the opcode; [`Operand::None`] for immediates.
    pub selector: Operand,
}

/// Fully decoded instruction, as read from a byte slice.
#[derive(Clone, Copy, Debug)]
pub struct Decoded {
    pub instruction: &'static Instruction,
    pub operand: Operand,
}

impl Decoded {
    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        1 + self.instruction.kind.immediate_len()
    }

    /// Bytes this instruction assembles to.
    pub fn encode(&self) -> Vec<u8> {
        let opcode = self.instruction.opcode_for(self.operand);
        match self.operand {
            Operand::Byte(value) => vec![opcode, value],
            Operand::Word(value) => {
                let [low, high] = value.to_le_bytes();
                vec![opcode, low, high]
            }
            _ => vec![opcode],
        }
    }
}

/// Hex literal in assembler syntax, with a leading zero when it would
/// otherwise start with a letter.
fn hex_literal(value: u16, width: usize) -> String {
    let digits = format!("{:0width$X}", value, width = width);
    if digits.starts_with(|c: char| c.is_ascii_alphabetic()) {
        format!("0{digits}h")
    } else {
        format!("{digits}h")
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = self.instruction.mnemonic.to_uppercase();
        let operand = match self.operand {
            Operand::None => return f.write_str(&mnemonic),
            Operand::Byte(value) => hex_literal(value as u16, 2),
            Operand::Word(value) => hex_literal(value, 4),
            Operand::Reg(reg) => reg.to_string(),
            Operand::Source(source) => source.to_string(),
            Operand::Pair(pair) => pair.to_string(),
            Operand::Index(index) => index.to_string(),
        };
        // Destination registers are part of the mnemonic, so the operand
        // follows a comma: `MVI A, 05h`.
        let separator = if mnemonic.contains(' ') { ", " } else { " " };
        write!(f, "{mnemonic}{separator}{operand}")
    }
}

/// Lookup tables built from [`INSTRUCTIONS`].
pub struct Catalog {
    by_opcode: [Option<Entry>; 256],
    by_mnemonic: FxMap<&'static str, &'static Instruction>,
}

lazy_static! {
    static ref CATALOG: Catalog = Catalog::build(INSTRUCTIONS);
}

/// The process-wide catalog, built on first use.
pub fn catalog() -> &'static Catalog {
    &CATALOG
}

impl Catalog {
    pub fn build(instructions: &'static [Instruction]) -> Self {
        let mut by_opcode = [None; 256];
        let mut by_mnemonic = FxMap::with_capacity_and_hasher(instructions.len(), Default::default());

        for instruction in instructions {
            let previous = by_mnemonic.insert(instruction.mnemonic, instruction);
            debug_assert!(previous.is_none(), "duplicate mnemonic {}", instruction.mnemonic);

            for selector in instruction.selectors() {
                let opcode = instruction.opcode_for(selector);
                let slot = &mut by_opcode[opcode as usize];
                debug_assert!(slot.is_none(), "opcode 0x{opcode:02X} defined twice");
                *slot = Some(Entry {
                    instruction,
                    opcode,
                    selector,
                });
            }
        }

        Catalog {
            by_opcode,
            by_mnemonic,
        }
    }

    /// Instruction for a normalised (lower-case, single-spaced) mnemonic.
    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&'static Instruction> {
        self.by_mnemonic.get(mnemonic).copied()
    }

    pub fn by_opcode(&self, opcode: u8) -> Option<&Entry> {
        self.by_opcode[opcode as usize].as_ref()
    }

    /// Every populated opcode, in ascending order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.by_opcode.iter().flatten()
    }

    /// Decode the instruction at the start of `bytes`. Returns `None` for an
    /// unknown opcode or when the immediate bytes are cut short.
    pub fn decode(&self, bytes: &[u8]) -> Option<Decoded> {
        let entry = self.by_opcode(*bytes.first()?)?;
        let operand = match entry.instruction.kind {
            OperandKind::Data8 => Operand::Byte(*bytes.get(1)?),
            OperandKind::Data16 | OperandKind::LabelAddress16 => {
                Operand::Word(u16::from_le_bytes([*bytes.get(1)?, *bytes.get(2)?]))
            }
            _ => entry.selector,
        };
        Some(Decoded {
            instruction: entry.instruction,
            operand,
        })
    }
}

/// One line of a disassembly listing.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    pub address: u16,
    pub text: String,
    /// `None` for bytes shown as `DB`.
    pub description: Option<&'static str>,
}

/// Disassemble `bytes` loaded at `origin`. Unknown or truncated instructions
/// are shown as `DB` bytes.
pub fn disassemble(bytes: &[u8], origin: u16) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let address = origin.wrapping_add(offset as u16);
        match catalog().decode(&bytes[offset..]) {
            Some(decoded) => {
                lines.push(Line {
                    address,
                    text: decoded.to_string(),
                    description: Some(decoded.instruction.description()),
                });
                offset += decoded.len();
            }
            None => {
                lines.push(Line {
                    address,
                    text: format!("DB {}", hex_literal(bytes[offset] as u16, 2)),
                    description: None,
                });
                offset += 1;
            }
        }
    }
    lines
}

use OperandKind::{RegisterPairBD as BD, RegisterPairOrPSW as PSW, RegisterPairOrSP as SP};

/// The 8085 instruction set.
#[rustfmt::skip]
pub static INSTRUCTIONS: &[Instruction] = &[
    Instruction::data8("aci", 0xCE, "Add immediate to accumulator with carry", ops::aci),
    Instruction::source("adc", 0x88, "Add register to accumulator with carry", ops::adc),
    Instruction::source("add", 0x80, "Add register to accumulator", ops::add),
    Instruction::data8("adi", 0xC6, "Add immediate to accumulator", ops::adi),
    Instruction::source("ana", 0xA0, "Logical AND with accumulator", ops::ana),
    Instruction::data8("ani", 0xE6, "AND immediate with accumulator", ops::ani),
    Instruction::address("call", 0xCD, "Call unconditionally", ops::call),
    Instruction::address("cc", 0xDC, "Call on carry", ops::cc),
    Instruction::address("cm", 0xFC, "Call on minus", ops::cm),
    Instruction::implied("cma", 0x2F, "Complement accumulator", ops::cma),
    Instruction::implied("cmc", 0x3F, "Complement carry", ops::cmc),
    Instruction::source("cmp", 0xB8, "Compare with accumulator", ops::cmp),
    Instruction::address("cnc", 0xD4, "Call on no carry", ops::cnc),
    Instruction::address("cnz", 0xC4, "Call on no zero", ops::cnz),
    Instruction::address("cp", 0xF4, "Call on positive", ops::cp),
    Instruction::address("cpe", 0xEC, "Call on parity even", ops::cpe),
    Instruction::data8("cpi", 0xFE, "Compare immediate with accumulator", ops::cpi),
    Instruction::address("cpo", 0xE4, "Call on parity odd", ops::cpo),
    Instruction::address("cz", 0xCC, "Call on zero", ops::cz),
    Instruction::implied("daa", 0x27, "Decimal adjust accumulator", ops::daa),
    Instruction::pair("dad", 0x09, SP, "Add register pair to H and L registers", ops::dad),
    Instruction::source("dcr", 0x05, "Decrement source by 1", ops::dcr).spaced(8),
    Instruction::pair("dcx", 0x0B, SP, "Decrement register pair by 1", ops::dcx),
    Instruction::implied("di", 0xF3, "Disable interrupts", ops::di),
    Instruction::implied("ei", 0xFB, "Enable interrupts", ops::ei),
    Instruction::implied("hlt", 0x76, "Halt", ops::hlt),
    Instruction::data8("in", 0xDB, "Input from port", ops::input),
    Instruction::source("inr", 0x04, "Increment source by 1", ops::inr).spaced(8),
    Instruction::pair("inx", 0x03, SP, "Increment register pair by 1", ops::inx),
    Instruction::address("jc", 0xDA, "Jump on carry", ops::jc),
    Instruction::address("jm", 0xFA, "Jump on minus", ops::jm),
    Instruction::address("jmp", 0xC3, "Jump unconditionally", ops::jmp),
    Instruction::address("jnc", 0xD2, "Jump on no carry", ops::jnc),
    Instruction::address("jnz", 0xC2, "Jump on no zero", ops::jnz),
    Instruction::address("jp", 0xF2, "Jump on positive", ops::jp),
    Instruction::address("jpe", 0xEA, "Jump on parity even", ops::jpe),
    Instruction::address("jpo", 0xE2, "Jump on parity odd", ops::jpo),
    Instruction::address("jz", 0xCA, "Jump on zero", ops::jz),
    Instruction::data16("lda", 0x3A, "Load accumulator direct", ops::lda),
    Instruction::pair("ldax", 0x0A, BD, "Load accumulator indirect", ops::ldax),
    Instruction::data16("lhld", 0x2A, "Load H and L direct", ops::lhld),
    Instruction::data16("lxi b", 0x01, "Load immediate into B and C", ops::lxi_b),
    Instruction::data16("lxi d", 0x11, "Load immediate into D and E", ops::lxi_d),
    Instruction::data16("lxi h", 0x21, "Load immediate into H and L", ops::lxi_h),
    Instruction::data16("lxi sp", 0x31, "Load immediate into stack pointer", ops::lxi_sp),
    Instruction::source("mov a", 0x78, "Copy from source to register A", ops::mov_a),
    Instruction::source("mov b", 0x40, "Copy from source to register B", ops::mov_b),
    Instruction::source("mov c", 0x48, "Copy from source to register C", ops::mov_c),
    Instruction::source("mov d", 0x50, "Copy from source to register D", ops::mov_d),
    Instruction::source("mov e", 0x58, "Copy from source to register E", ops::mov_e),
    Instruction::source("mov h", 0x60, "Copy from source to register H", ops::mov_h),
    Instruction::source("mov l", 0x68, "Copy from source to register L", ops::mov_l),
    Instruction::register("mov m", 0x70, "Copy from register to memory", ops::mov_m),
    Instruction::data8("mvi a", 0x3E, "Move immediate to register A", ops::mvi_a),
    Instruction::data8("mvi b", 0x06, "Move immediate to register B", ops::mvi_b),
    Instruction::data8("mvi c", 0x0E, "Move immediate to register C", ops::mvi_c),
    Instruction::data8("mvi d", 0x16, "Move immediate to register D", ops::mvi_d),
    Instruction::data8("mvi e", 0x1E, "Move immediate to register E", ops::mvi_e),
    Instruction::data8("mvi h", 0x26, "Move immediate to register H", ops::mvi_h),
    Instruction::data8("mvi l", 0x2E, "Move immediate to register L", ops::mvi_l),
    Instruction::data8("mvi m", 0x36, "Move immediate to memory", ops::mvi_m),
    Instruction::implied("nop", 0x00, "No operation", ops::nop),
    Instruction::source("ora", 0xB0, "Logical OR with accumulator", ops::ora),
    Instruction::data8("ori", 0xF6, "OR immediate with accumulator", ops::ori),
    Instruction::data8("out", 0xD3, "Output to port", ops::output),
    Instruction::implied("pchl", 0xE9, "Jump to address in H and L", ops::pchl),
    Instruction::pair("pop", 0xC1, PSW, "Pop off stack to register pair", ops::pop),
    Instruction::pair("push", 0xC5, PSW, "Push register pair onto stack", ops::push),
    Instruction::implied("ral", 0x17, "Rotate accumulator left through carry", ops::ral),
    Instruction::implied("rar", 0x1F, "Rotate accumulator right through carry", ops::rar),
    Instruction::implied("rc", 0xD8, "Return on carry", ops::rc),
    Instruction::implied("ret", 0xC9, "Return unconditionally", ops::ret),
    Instruction::implied("rim", 0x20, "Read interrupt mask", ops::rim),
    Instruction::implied("rlc", 0x07, "Rotate accumulator left", ops::rlc),
    Instruction::implied("rm", 0xF8, "Return on minus", ops::rm),
    Instruction::implied("rnc", 0xD0, "Return on no carry", ops::rnc),
    Instruction::implied("rnz", 0xC0, "Return on no zero", ops::rnz),
    Instruction::implied("rp", 0xF0, "Return on positive", ops::rp),
    Instruction::implied("rpe", 0xE8, "Return on parity even", ops::rpe),
    Instruction::implied("rpo", 0xE0, "Return on parity odd", ops::rpo),
    Instruction::implied("rrc", 0x0F, "Rotate accumulator right", ops::rrc),
    Instruction::restart("rst", 0xC7, "Restart", ops::rst),
    Instruction::implied("rz", 0xC8, "Return on zero", ops::rz),
    Instruction::source("sbb", 0x98, "Subtract source and borrow from accumulator", ops::sbb),
    Instruction::data8("sbi", 0xDE, "Subtract immediate with borrow", ops::sbi),
    Instruction::data16("shld", 0x22, "Store H and L direct", ops::shld),
    Instruction::implied("sim", 0x30, "Set interrupt mask", ops::sim),
    Instruction::implied("sphl", 0xF9, "Copy H and L to stack pointer", ops::sphl),
    Instruction::data16("sta", 0x32, "Store accumulator direct", ops::sta),
    Instruction::pair("stax", 0x02, BD, "Store accumulator indirect", ops::stax),
    Instruction::implied("stc", 0x37, "Set carry", ops::stc),
    Instruction::source("sub", 0x90, "Subtract source from accumulator", ops::sub),
    Instruction::data8("sui", 0xD6, "Subtract immediate from accumulator", ops::sui),
    Instruction::implied("xchg", 0xEB, "Exchange H and L with D and E", ops::xchg),
    Instruction::source("xra", 0xA8, "Exclusive OR with accumulator", ops::xra),
    Instruction::data8("xri", 0xEE, "Exclusive OR immediate with accumulator", ops::xri),
    Instruction::implied("xthl", 0xE3, "Exchange H and L with top of stack", ops::xthl),
];
