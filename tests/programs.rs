use std::cell::RefCell;
use std::rc::Rc;

use i8085::{catalog, compile, disassemble, Assembler, Cpu, CpuError, Event, Register};

fn recorded(cpu: &mut Cpu) -> Rc<RefCell<Vec<Event>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    cpu.subscribe(move |event| sink.borrow_mut().push(*event));
    events
}

fn load(path: &str, origin: u16) -> Cpu {
    let src = std::fs::read_to_string(path).unwrap();
    let program = Assembler::with_origin(origin).compile(&src).unwrap();
    let mut cpu = Cpu::new();
    cpu.load(origin, &program.bytes);
    cpu
}

#[test]
fn adds_two_numbers() {
    let mut cpu = load("tests/files/add.asm", 0x400);
    cpu.set_memory(0x3005, &[0x14, 0x89]);
    let events = recorded(&mut cpu);

    for _ in 0..6 {
        cpu.step().unwrap();
        assert!(!events.borrow().contains(&Event::Halted));
    }
    events.borrow_mut().clear();
    cpu.step().unwrap();

    assert_eq!(cpu.read(0x3007), 0x9d);
    assert_eq!(events.borrow().last(), Some(&Event::Halted));
}

#[test]
fn run_stops_in_front_of_halt() {
    let mut cpu = load("tests/files/add.asm", 0x400);
    cpu.set_memory(0x3005, &[0x14, 0x89]);
    cpu.run().unwrap();
    assert_eq!(cpu.pc(), 0x408);
    assert_eq!(cpu.read(0x3007), 0x9d);
    assert!(cpu.is_stopped());
}

#[test]
fn exchanges_memory() {
    let mut cpu = load("tests/files/exchange.asm", 0);
    cpu.set_memory(0x5000, &[0x22]);
    cpu.set_memory(0x6000, &[0x44]);
    cpu.run().unwrap();
    assert_eq!(cpu.read(0x5000), 0x44);
    assert_eq!(cpu.read(0x6000), 0x22);
}

#[test]
fn sorts_ten_bytes() {
    let src = std::fs::read_to_string("tests/files/sort.asm").unwrap();
    assert_eq!(
        compile(&src).unwrap().bytes,
        vec![
            0x06, 0x09, 0x21, 0x00, 0x30, 0x0e, 0x09, 0x7e, 0x23, 0xbe, 0xda, 0x15, 0x00, 0xca,
            0x15, 0x00, 0x56, 0x77, 0x2b, 0x72, 0x23, 0x0d, 0xc2, 0x07, 0x00, 0x05, 0xc2, 0x02,
            0x00, 0x76
        ]
    );

    let mut cpu = load("tests/files/sort.asm", 0x400);
    cpu.set_memory(
        0x3000,
        &[0x12, 0x01, 0x05, 0xad, 0x03, 0x56, 0x1a, 0xd2, 0x00, 0x44],
    );
    cpu.run().unwrap();
    assert_eq!(
        &cpu.memory()[0x3000..0x300a],
        &[0x00, 0x01, 0x03, 0x05, 0x12, 0x1a, 0x44, 0x56, 0xad, 0xd2]
    );
}

#[test]
fn calls_and_returns() {
    let mut cpu = load("tests/files/subroutine.asm", 0);
    cpu.run().unwrap();
    assert_eq!(cpu.read(0x5000), 30);
    assert_eq!(cpu.reg(Register::B), 15);
    assert_eq!(cpu.sp(), 0x4000);
}

#[test]
fn notifications_follow_fetch_order() {
    let program = compile("mvi a, 05h\nhlt").unwrap();
    let mut cpu = Cpu::new();
    cpu.load(0x100, &program.bytes);
    let events = recorded(&mut cpu);
    cpu.step().unwrap();
    cpu.step().unwrap();
    assert_eq!(
        *events.borrow(),
        vec![
            Event::ProgramCounter(0x101),
            Event::ProgramCounter(0x102),
            Event::Register(Register::A, 0x05),
            Event::ProgramCounter(0x103),
            Event::Halted,
        ]
    );
}

#[test]
fn unknown_opcode_stops_execution() {
    let mut cpu = Cpu::new();
    cpu.load(0x200, &[0x00, 0xcb, 0x76]);
    assert_eq!(
        cpu.run(),
        Err(CpuError::UnknownOpcode {
            opcode: 0xcb,
            address: 0x201
        })
    );
}

#[test]
fn every_opcode_survives_reassembly() {
    for entry in catalog().entries() {
        let bytes = [entry.opcode, 0x34, 0x12];
        let decoded = catalog().decode(&bytes).unwrap();
        let text = decoded.to_string();

        let assembled = compile(&text).unwrap_or_else(|err| panic!("`{text}`: {err}"));
        assert_eq!(assembled.bytes, decoded.encode(), "`{text}`");
        assert_eq!(assembled.bytes[0], entry.opcode, "`{text}`");

        let again = catalog().decode(&assembled.bytes).unwrap();
        assert_eq!(again.instruction, entry.instruction);
        assert_eq!(again.operand, decoded.operand);
    }
}

#[test]
fn disassembly_reassembles() {
    let src = std::fs::read_to_string("tests/files/sort.asm").unwrap();
    let program = Assembler::with_origin(0x400).compile(&src).unwrap();
    let listing = disassemble(&program.bytes, 0x400)
        .into_iter()
        .map(|line| line.text)
        .collect::<Vec<_>>()
        .join("\n");
    let again = Assembler::with_origin(0x400).compile(&listing).unwrap();
    assert_eq!(again.bytes, program.bytes);
}
