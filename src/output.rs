//! Text rendering of processor state for the command line.
//!
//! Everything here returns a `String`; printing is left to the caller. With
//! `--minimal` set, colour and box drawing are stripped and values are shown
//! as plain `NAME value` lines suited to black-box tests.

use std::cell::RefCell;

use crate::event::Event;
use crate::runtime::Cpu;
use crate::symbol::{Flag, Pair, Register};

thread_local! {
    static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
}

const BOX_WIDTH: usize = 36;
const BYTES_PER_ROW: usize = 16;

const REGISTER_ORDER: [Register; 7] = [
    Register::A,
    Register::B,
    Register::C,
    Register::D,
    Register::E,
    Register::H,
    Register::L,
];

pub fn set_minimal(new_value: bool) -> bool {
    IS_MINIMAL.with(|value| value.replace(new_value))
}

pub fn is_minimal() -> bool {
    IS_MINIMAL.with(|value| *value.borrow())
}

/// Register file, pairs, program counter, stack pointer, interrupt mask and
/// flags.
pub fn registers(cpu: &Cpu) -> String {
    if is_minimal() {
        let mut out = String::new();
        for reg in REGISTER_ORDER {
            out.push_str(&format!("{reg} {:02X}\n", cpu.reg(reg)));
        }
        out.push_str(&format!("PC {:04X}\n", cpu.pc()));
        out.push_str(&format!("SP {:04X}\n", cpu.sp()));
        out.push_str(&format!("IM {:02X}\n", cpu.interrupt_mask()));
        out.push_str(&format!("FLAGS {}\n", flag_list(cpu)));
        return out;
    }

    let rows = [
        format!(
            "A   {:02X}      BC  {:04X}    DE  {:04X}",
            cpu.reg(Register::A),
            cpu.pair(Pair::B),
            cpu.pair(Pair::D)
        ),
        format!(
            "HL  {:04X}    PSW {:04X}    IM  {:02X}",
            cpu.pair(Pair::H),
            cpu.pair(Pair::PSW),
            cpu.interrupt_mask()
        ),
        format!("PC  {:04X}    SP  {:04X}", cpu.pc(), cpu.sp()),
        flag_list(cpu),
    ];

    let mut out = format!("\x1b[2m┌{}┐\x1b[0m\n", "─".repeat(BOX_WIDTH));
    for row in rows {
        out.push_str(&format!(
            "\x1b[2m│\x1b[0m {row:<width$} \x1b[2m│\x1b[0m\n",
            width = BOX_WIDTH - 2
        ));
    }
    out.push_str(&format!("\x1b[2m└{}┘\x1b[0m\n", "─".repeat(BOX_WIDTH)));
    out
}

fn flag_list(cpu: &Cpu) -> String {
    Flag::ALL
        .iter()
        .map(|&flag| format!("{flag}={}", cpu.flag(flag) as u8))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex dump of `len` bytes from `addr`, sixteen to a row.
pub fn memory(cpu: &Cpu, addr: u16, len: usize) -> String {
    let mut out = String::new();
    let mut offset = 0;
    while offset < len {
        let row_addr = addr.wrapping_add(offset as u16);
        let count = BYTES_PER_ROW.min(len - offset);
        let bytes = (0..count)
            .map(|i| format!("{:02X}", cpu.read(row_addr.wrapping_add(i as u16))))
            .collect::<Vec<_>>()
            .join(" ");
        if is_minimal() {
            out.push_str(&format!("[{row_addr:04X}] {bytes}\n"));
        } else {
            out.push_str(&format!("\x1b[2m{row_addr:04X}\x1b[0m  {bytes}\n"));
        }
        offset += count;
    }
    out
}

/// One change notification, indented under the step that fired it.
pub fn event(event: &Event) -> String {
    match (is_minimal(), event) {
        (true, _) => format!("  {event}\n"),
        (false, Event::Halted) => format!("  \x1b[1m{event}\x1b[0m\n"),
        (false, _) => format!("  \x1b[2m{event}\x1b[0m\n"),
    }
}

/// Address and disassembly of one instruction.
pub fn listing(addr: u16, text: &str) -> String {
    if is_minimal() {
        format!("{addr:04X} {text}\n")
    } else {
        format!("\x1b[2m{addr:04X}\x1b[0m  \x1b[1m{text}\x1b[0m\n")
    }
}
