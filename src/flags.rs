use crate::symbol::Flag;

/// Flag values produced by a single arithmetic or logical operation.
/// `None` leaves the flag untouched.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct FlagUpdate {
    pub s: Option<bool>,
    pub z: Option<bool>,
    pub ac: Option<bool>,
    pub p: Option<bool>,
    pub c: Option<bool>,
}

impl FlagUpdate {
    /// Sign, zero and parity of `result`.
    pub fn szp(result: u8) -> Self {
        FlagUpdate {
            s: Some(sign(result)),
            z: Some(result == 0),
            p: Some(parity(result)),
            ..Default::default()
        }
    }

    pub fn with_ac(self, ac: bool) -> Self {
        FlagUpdate { ac: Some(ac), ..self }
    }

    pub fn with_carry(self, c: bool) -> Self {
        FlagUpdate { c: Some(c), ..self }
    }

    /// Changes in the order they are applied.
    pub fn changes(self) -> impl Iterator<Item = (Flag, bool)> {
        [
            (Flag::AC, self.ac),
            (Flag::C, self.c),
            (Flag::P, self.p),
            (Flag::Z, self.z),
            (Flag::S, self.s),
        ]
        .into_iter()
        .filter_map(|(flag, value)| value.map(|value| (flag, value)))
    }
}

/// True when `value` has an even number of set bits.
pub fn parity(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

pub fn sign(value: u8) -> bool {
    value & 0x80 != 0
}

/// Carry out of bit 3 when adding `value`, `operand` and `carry_in`.
pub fn aux_carry_add(value: u8, operand: u8, carry_in: bool) -> bool {
    (value & 0x0f) + (operand & 0x0f) + carry_in as u8 > 0x0f
}

/// Borrow into bit 3 when subtracting `operand` and `borrow_in` from `value`.
pub fn aux_carry_sub(value: u8, operand: u8, borrow_in: bool) -> bool {
    (value & 0x0f) < (operand & 0x0f) + borrow_in as u8
}

/// Pack flags into the byte stored by `PUSH PSW`. Bit 1 always reads as set,
/// bits 3 and 5 as clear.
pub fn pack(get: impl Fn(Flag) -> bool) -> u8 {
    Flag::ALL
        .into_iter()
        .filter(|&flag| get(flag))
        .fold(0b0000_0010, |acc, flag| acc | 1 << flag.bit())
}

/// Inverse of [`pack`].
pub fn unpack(byte: u8) -> impl Iterator<Item = (Flag, bool)> {
    Flag::ALL
        .into_iter()
        .map(move |flag| (flag, byte & (1 << flag.bit()) != 0))
}
