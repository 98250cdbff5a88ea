use crate::catalog::{catalog, Operand, OperandKind};
use crate::error::CpuError;
use crate::event::{Event, Observer};
use crate::flags::{self, FlagUpdate};
use crate::symbol::{Flag, Pair, Register, Source};

/// The 8085 can address 64KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Opcode of `HLT`; `run` stops in front of it.
pub const HALT_OPCODE: u8 = 0x76;

/// Complete processor state: register file, flags, program counter, stack
/// pointer, interrupt mask and memory.
///
/// Every mutation goes through an accessor which notifies subscribed observers
/// synchronously when the stored value changes.
pub struct Cpu {
    mem: Box<[u8]>,
    pc: u16,
    sp: u16,
    /// Indexed by register offset; slot 6 is never used.
    reg: [u8; 8],
    flags: [bool; 5],
    interrupt_mask: u8,
    /// Set when the last instruction fell through past the last address.
    overran: bool,
    observers: Vec<Observer>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Processor with a full 64KB of zeroed memory.
    pub fn new() -> Self {
        Self::with_memory_size(MEMORY_MAX)
    }

    /// Processor with `size` bytes of memory, clamped to between one byte and
    /// 64KB. Addresses beyond a smaller memory wrap around it.
    pub fn with_memory_size(size: usize) -> Self {
        Cpu {
            mem: vec![0; size.clamp(1, MEMORY_MAX)].into_boxed_slice(),
            pc: 0,
            sp: 0,
            reg: [0; 8],
            flags: [false; 5],
            interrupt_mask: 0,
            overran: false,
            observers: Vec::new(),
        }
    }

    /// Register a callback for every change notification.
    pub fn subscribe(&mut self, observer: impl FnMut(&Event) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self, event: Event) {
        for observer in self.observers.iter_mut() {
            observer(&event);
        }
    }

    /// Copy `bytes` into memory starting at `addr`. Does not notify.
    pub fn set_memory(&mut self, addr: u16, bytes: &[u8]) {
        let len = self.mem.len();
        for (i, byte) in bytes.iter().enumerate() {
            self.mem[(addr as usize + i) % len] = *byte;
        }
    }

    /// Copy a program into memory and point the program counter at it.
    pub fn load(&mut self, origin: u16, program: &[u8]) {
        self.set_memory(origin, program);
        self.set_pc(origin);
    }

    pub fn memory(&self) -> &[u8] {
        &self.mem
    }

    fn mem_index(&self, addr: u16) -> usize {
        addr as usize % self.mem.len()
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.mem[self.mem_index(addr)]
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        let idx = self.mem_index(addr);
        if self.mem[idx] != value {
            self.mem[idx] = value;
            self.notify(Event::Memory(addr, value));
        }
    }

    /// Little-endian word at `addr`.
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.read(addr), self.read(addr.wrapping_add(1))])
    }

    pub fn write_word(&mut self, addr: u16, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.write(addr, low);
        self.write(addr.wrapping_add(1), high);
    }

    pub fn reg(&self, reg: Register) -> u8 {
        self.reg[reg.index()]
    }

    pub fn set_reg(&mut self, reg: Register, value: u8) {
        if self.reg[reg.index()] != value {
            self.reg[reg.index()] = value;
            self.notify(Event::Register(reg, value));
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.flags[flag.index()]
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if self.flags[flag.index()] != value {
            self.flags[flag.index()] = value;
            self.notify(Event::Flag(flag, value));
        }
    }

    pub(crate) fn apply(&mut self, update: FlagUpdate) {
        for (flag, value) in update.changes() {
            self.set_flag(flag, value);
        }
    }

    /// Flags packed the way `PUSH PSW` stores them.
    pub fn packed_flags(&self) -> u8 {
        flags::pack(|flag| self.flag(flag))
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u16) {
        if self.pc != value {
            self.pc = value;
            self.notify(Event::ProgramCounter(value));
        }
    }

    pub fn sp(&self) -> u16 {
        self.sp
    }

    pub fn set_sp(&mut self, value: u16) {
        if self.sp != value {
            self.sp = value;
            self.notify(Event::StackPointer(value));
        }
    }

    pub fn interrupt_mask(&self) -> u8 {
        self.interrupt_mask
    }

    pub fn set_interrupt_mask(&mut self, value: u8) {
        if self.interrupt_mask != value {
            self.interrupt_mask = value;
            self.notify(Event::InterruptMask(value));
        }
    }

    /// 16-bit value of a register pair, the stack pointer, or the accumulator
    /// with packed flags.
    pub fn pair(&self, pair: Pair) -> u16 {
        match (pair, pair.registers()) {
            (_, Some((high, low))) => u16::from_be_bytes([self.reg(high), self.reg(low)]),
            (Pair::SP, None) => self.sp,
            (_, None) => u16::from_be_bytes([self.reg(Register::A), self.packed_flags()]),
        }
    }

    pub fn set_pair(&mut self, pair: Pair, value: u16) {
        let [high, low] = value.to_be_bytes();
        match pair {
            Pair::SP => self.set_sp(value),
            Pair::PSW => {
                for (flag, set) in flags::unpack(low) {
                    self.set_flag(flag, set);
                }
                self.set_reg(Register::A, high);
            }
            _ => {
                if let Some((high_reg, low_reg)) = pair.registers() {
                    self.set_reg(low_reg, low);
                    self.set_reg(high_reg, high);
                }
            }
        }
    }

    /// Register value, or the byte at H:L for [`Source::Memory`].
    pub fn source(&self, source: Source) -> u8 {
        match source {
            Source::Reg(reg) => self.reg(reg),
            Source::Memory => self.read(self.pair(Pair::H)),
        }
    }

    pub fn set_source(&mut self, source: Source, value: u8) {
        match source {
            Source::Reg(reg) => self.set_reg(reg, value),
            Source::Memory => self.write(self.pair(Pair::H), value),
        }
    }

    pub(crate) fn push(&mut self, value: u16) {
        let sp = self.sp.wrapping_sub(2);
        self.write_word(sp, value);
        self.set_sp(sp);
    }

    pub(crate) fn pop(&mut self) -> u16 {
        let value = self.read_word(self.sp);
        self.set_sp(self.sp.wrapping_add(2));
        value
    }

    pub(crate) fn halt(&mut self) {
        self.notify(Event::Halted);
    }

    fn fetch(&mut self) -> u8 {
        let pc = self.pc;
        let byte = self.read(pc);
        self.set_pc(pc.wrapping_add(1));
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let low = self.fetch();
        let high = self.fetch();
        u16::from_le_bytes([low, high])
    }

    /// Execute the instruction at the program counter.
    pub fn step(&mut self) -> Result<(), CpuError> {
        let address = self.pc;
        let opcode = self.fetch();
        let entry = catalog()
            .by_opcode(opcode)
            .ok_or(CpuError::UnknownOpcode { opcode, address })?;

        let (operand, len) = match entry.instruction.kind() {
            OperandKind::Data8 => (Operand::Byte(self.fetch()), 2),
            OperandKind::Data16 | OperandKind::LabelAddress16 => {
                (Operand::Word(self.fetch_word()), 3)
            }
            _ => (entry.selector, 1),
        };
        entry.instruction.execute(self, operand);

        // Only a fall-through past the top of memory counts; jumps do not
        let next = address as usize + len;
        self.overran = next >= self.mem.len() && self.pc == next as u16;
        Ok(())
    }

    /// True when the next `run` would not execute anything: `HLT` is under
    /// the program counter or execution has run off the end of memory.
    pub fn is_stopped(&self) -> bool {
        self.overran || self.pc as usize >= self.mem.len() || self.read(self.pc) == HALT_OPCODE
    }

    /// Step until `HLT` is under the program counter or execution runs off the
    /// end of memory.
    pub fn run(&mut self) -> Result<(), CpuError> {
        self.run_for(usize::MAX).map(|_| ())
    }

    /// Like [`Cpu::run`] but executes at most `limit` instructions. Returns the
    /// number of instructions executed.
    pub fn run_for(&mut self, limit: usize) -> Result<usize, CpuError> {
        self.overran = false;
        let mut steps = 0;
        while steps < limit && !self.is_stopped() {
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn recorded(cpu: &mut Cpu) -> Rc<RefCell<Vec<Event>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        cpu.subscribe(move |event| sink.borrow_mut().push(*event));
        events
    }

    #[test]
    fn notifies_only_on_change() {
        let mut cpu = Cpu::new();
        let events = recorded(&mut cpu);
        cpu.set_reg(Register::B, 0);
        cpu.set_flag(Flag::Z, false);
        cpu.set_reg(Register::B, 4);
        cpu.set_flag(Flag::Z, true);
        cpu.write(0x10, 0);
        cpu.write(0x10, 9);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Register(Register::B, 4),
                Event::Flag(Flag::Z, true),
                Event::Memory(0x10, 9)
            ]
        );
    }

    #[test]
    fn pairs() {
        let mut cpu = Cpu::new();
        cpu.set_pair(Pair::H, 0x3005);
        assert_eq!(cpu.reg(Register::H), 0x30);
        assert_eq!(cpu.reg(Register::L), 0x05);
        assert_eq!(cpu.pair(Pair::H), 0x3005);
        cpu.set_pair(Pair::SP, 0xfff0);
        assert_eq!(cpu.sp(), 0xfff0);

        cpu.set_pair(Pair::PSW, 0x4281);
        assert_eq!(cpu.reg(Register::A), 0x42);
        assert!(cpu.flag(Flag::S));
        assert!(cpu.flag(Flag::C));
        assert!(!cpu.flag(Flag::Z));
        assert_eq!(cpu.pair(Pair::PSW), 0x4283);
    }

    #[test]
    fn stack_is_little_endian_and_grows_down() {
        let mut cpu = Cpu::new();
        cpu.set_sp(0x2000);
        cpu.push(0x1234);
        assert_eq!(cpu.sp(), 0x1ffe);
        assert_eq!(cpu.read(0x1ffe), 0x34);
        assert_eq!(cpu.read(0x1fff), 0x12);
        assert_eq!(cpu.pop(), 0x1234);
        assert_eq!(cpu.sp(), 0x2000);
    }

    #[test]
    fn small_memory_wraps() {
        let mut cpu = Cpu::with_memory_size(0x100);
        cpu.set_memory(0xff, &[1, 2]);
        assert_eq!(cpu.read(0xff), 1);
        assert_eq!(cpu.read(0x00), 2);
        assert_eq!(cpu.read(0x1ff), 1);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut cpu = Cpu::new();
        cpu.load(0x400, &[0x00, 0xdd]);
        assert_eq!(cpu.step(), Ok(()));
        assert_eq!(
            cpu.step(),
            Err(CpuError::UnknownOpcode {
                opcode: 0xdd,
                address: 0x401
            })
        );
        cpu.set_pc(0x400);
        assert_eq!(
            cpu.run(),
            Err(CpuError::UnknownOpcode {
                opcode: 0xdd,
                address: 0x401
            })
        );
    }

    #[test]
    fn run_stops_in_front_of_halt() {
        let mut cpu = Cpu::new();
        let events = recorded(&mut cpu);
        cpu.load(0x10, &[0x00, 0x00, HALT_OPCODE]);
        cpu.run().unwrap();
        assert_eq!(cpu.pc(), 0x12);
        assert!(!events.borrow().contains(&Event::Halted));
    }

    #[test]
    fn run_stops_at_end_of_memory() {
        let mut cpu = Cpu::with_memory_size(0x20);
        cpu.set_pc(0x1e);
        assert_eq!(cpu.run_for(100), Ok(2));
        assert_eq!(cpu.pc(), 0x20);

        let mut cpu = Cpu::new();
        cpu.set_pc(0xfffe);
        assert_eq!(cpu.run_for(100), Ok(2));
        assert_eq!(cpu.pc(), 0x0000);
    }

    #[test]
    fn jump_from_top_of_memory_keeps_running() {
        let mut cpu = Cpu::new();
        // JMP 0100h with its address in the last two bytes
        cpu.load(0xfffd, &[0xc3, 0x00, 0x01]);
        cpu.set_memory(0x100, &[0x00, 0x00, HALT_OPCODE]);
        assert_eq!(cpu.run_for(100), Ok(3));
        assert_eq!(cpu.pc(), 0x102);

        // CALL from the same place returns into the wrapped address
        let mut cpu = Cpu::new();
        cpu.set_sp(0x2000);
        cpu.load(0xfffd, &[0xcd, 0x00, 0x01]);
        cpu.set_memory(0x100, &[HALT_OPCODE]);
        assert_eq!(cpu.run_for(100), Ok(1));
        assert_eq!(cpu.pc(), 0x100);
        assert_eq!(cpu.sp(), 0x1ffe);
    }

    #[test]
    fn memory_size_is_clamped() {
        assert_eq!(Cpu::with_memory_size(0).memory().len(), 1);
        assert_eq!(Cpu::with_memory_size(0x20000).memory().len(), MEMORY_MAX);
    }

    #[test]
    fn run_for_respects_limit() {
        let mut cpu = Cpu::new();
        // JMP 0000h
        cpu.load(0, &[0xc3, 0x00, 0x00]);
        assert_eq!(cpu.run_for(5), Ok(5));
        assert_eq!(cpu.pc(), 0);
    }
}
