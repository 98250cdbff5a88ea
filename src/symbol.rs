use std::fmt;
use std::str::FromStr;

/// Encoding offset reserved for "memory addressed by H:L" in register-coded opcodes.
pub const MEMORY_OFFSET: u8 = 6;

/// General purpose 8-bit registers. The discriminant is the offset used when
/// encoding register operands into opcodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    B = 0,
    C = 1,
    D = 2,
    E = 3,
    H = 4,
    L = 5,
    /// Accumulator.
    A = 7,
}

impl Register {
    pub const ALL: [Register; 7] = [
        Register::B,
        Register::C,
        Register::D,
        Register::E,
        Register::H,
        Register::L,
        Register::A,
    ];

    pub fn offset(self) -> u8 {
        self as u8
    }

    /// Index into the register file.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Register::A),
            "b" => Ok(Register::B),
            "c" => Ok(Register::C),
            "d" => Ok(Register::D),
            "e" => Ok(Register::E),
            "h" => Ok(Register::H),
            "l" => Ok(Register::L),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::B => "B",
            Register::C => "C",
            Register::D => "D",
            Register::E => "E",
            Register::H => "H",
            Register::L => "L",
            Register::A => "A",
        };
        f.write_str(name)
    }
}

/// Operand of the register-or-memory addressing mode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
    Reg(Register),
    /// Byte in memory at the address held by H:L.
    Memory,
}

impl Source {
    pub const ALL: [Source; 8] = [
        Source::Reg(Register::B),
        Source::Reg(Register::C),
        Source::Reg(Register::D),
        Source::Reg(Register::E),
        Source::Reg(Register::H),
        Source::Reg(Register::L),
        Source::Memory,
        Source::Reg(Register::A),
    ];

    pub fn offset(self) -> u8 {
        match self {
            Source::Reg(reg) => reg.offset(),
            Source::Memory => MEMORY_OFFSET,
        }
    }
}

impl FromStr for Source {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(Source::Memory),
            _ => s.parse().map(Source::Reg),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Reg(reg) => reg.fmt(f),
            Source::Memory => f.write_str("M"),
        }
    }
}

/// Register pairs. `SP` and `PSW` share the last encoding slot; which one an
/// opcode means depends on its operand kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pair {
    /// B:C
    B,
    /// D:E
    D,
    /// H:L
    H,
    /// Stack pointer.
    SP,
    /// Accumulator and packed flags.
    PSW,
}

impl Pair {
    pub const WITH_SP: [Pair; 4] = [Pair::B, Pair::D, Pair::H, Pair::SP];
    pub const WITH_PSW: [Pair; 4] = [Pair::B, Pair::D, Pair::H, Pair::PSW];
    pub const BD: [Pair; 2] = [Pair::B, Pair::D];

    pub fn offset(self) -> u8 {
        match self {
            Pair::B => 0x00,
            Pair::D => 0x10,
            Pair::H => 0x20,
            Pair::SP | Pair::PSW => 0x30,
        }
    }

    /// High and low registers of a general purpose pair.
    pub fn registers(self) -> Option<(Register, Register)> {
        match self {
            Pair::B => Some((Register::B, Register::C)),
            Pair::D => Some((Register::D, Register::E)),
            Pair::H => Some((Register::H, Register::L)),
            Pair::SP | Pair::PSW => None,
        }
    }
}

impl FromStr for Pair {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b" => Ok(Pair::B),
            "d" => Ok(Pair::D),
            "h" => Ok(Pair::H),
            "sp" => Ok(Pair::SP),
            "psw" => Ok(Pair::PSW),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pair::B => "B",
            Pair::D => "D",
            Pair::H => "H",
            Pair::SP => "SP",
            Pair::PSW => "PSW",
        };
        f.write_str(name)
    }
}

/// Status flags set by arithmetic and logical instructions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Flag {
    /// Sign: bit 7 of the result.
    S,
    /// Zero
    Z,
    /// Auxiliary carry out of bit 3.
    AC,
    /// Even parity
    P,
    /// Carry
    C,
}

impl Flag {
    pub const ALL: [Flag; 5] = [Flag::S, Flag::Z, Flag::AC, Flag::P, Flag::C];

    /// Bit position inside the packed flag byte pushed by `PUSH PSW`.
    pub fn bit(self) -> u8 {
        match self {
            Flag::S => 7,
            Flag::Z => 6,
            Flag::AC => 4,
            Flag::P => 2,
            Flag::C => 0,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Flag::S => "S",
            Flag::Z => "Z",
            Flag::AC => "AC",
            Flag::P => "P",
            Flag::C => "C",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_offsets_leave_memory_slot_free() {
        for reg in Register::ALL {
            assert_ne!(reg.offset(), MEMORY_OFFSET);
        }
    }

    #[test]
    fn sources_are_ordered_by_offset() {
        for (i, source) in Source::ALL.iter().enumerate() {
            assert_eq!(source.offset() as usize, i);
        }
        assert_eq!("m".parse(), Ok(Source::Memory));
        assert_eq!("a".parse(), Ok(Source::Reg(Register::A)));
        assert!("x".parse::<Source>().is_err());
    }

    #[test]
    fn pair_offsets() {
        assert_eq!(Pair::B.offset(), 0x00);
        assert_eq!(Pair::D.offset(), 0x10);
        assert_eq!(Pair::H.offset(), 0x20);
        assert_eq!(Pair::SP.offset(), Pair::PSW.offset());
        assert_eq!(Pair::H.registers(), Some((Register::H, Register::L)));
        assert_eq!(Pair::PSW.registers(), None);
    }
}
