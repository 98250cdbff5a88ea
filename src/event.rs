use std::fmt;

use crate::symbol::{Flag, Register};

/// Change notification fired by [`Cpu`](crate::Cpu) at the point of mutation.
///
/// Value events are only fired when the stored value actually changes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
    ProgramCounter(u16),
    StackPointer(u16),
    InterruptMask(u8),
    Register(Register, u8),
    Flag(Flag, bool),
    Memory(u16, u8),
    /// Fired by `HLT` every time it executes.
    Halted,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::ProgramCounter(pc) => write!(f, "PC = {pc:04X}"),
            Event::StackPointer(sp) => write!(f, "SP = {sp:04X}"),
            Event::InterruptMask(mask) => write!(f, "IM = {mask:02X}"),
            Event::Register(reg, value) => write!(f, "{reg} = {value:02X}"),
            Event::Flag(flag, value) => write!(f, "{flag} = {}", *value as u8),
            Event::Memory(addr, value) => write!(f, "[{addr:04X}] = {value:02X}"),
            Event::Halted => f.write_str("halted"),
        }
    }
}

/// Callback registered through [`Cpu::subscribe`](crate::Cpu::subscribe).
pub type Observer = Box<dyn FnMut(&Event)>;
