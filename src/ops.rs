//! Semantic actions referenced by the instruction table.

use std::cmp::Ordering;

use crate::flags::{aux_carry_add, aux_carry_sub, FlagUpdate};
use crate::runtime::Cpu;
use crate::symbol::{Flag, Pair, Register, Source};

use Register::{A, B, C, D, E, H, L};

// Data transfer

fn copy(cpu: &mut Cpu, dest: Source, src: Source) {
    let value = cpu.source(src);
    cpu.set_source(dest, value);
}

pub fn mov_a(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(A), src)
}

pub fn mov_b(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(B), src)
}

pub fn mov_c(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(C), src)
}

pub fn mov_d(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(D), src)
}

pub fn mov_e(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(E), src)
}

pub fn mov_h(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(H), src)
}

pub fn mov_l(cpu: &mut Cpu, src: Source) {
    copy(cpu, Source::Reg(L), src)
}

pub fn mov_m(cpu: &mut Cpu, src: Register) {
    copy(cpu, Source::Memory, Source::Reg(src))
}

pub fn mvi_a(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(A, value)
}

pub fn mvi_b(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(B, value)
}

pub fn mvi_c(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(C, value)
}

pub fn mvi_d(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(D, value)
}

pub fn mvi_e(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(E, value)
}

pub fn mvi_h(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(H, value)
}

pub fn mvi_l(cpu: &mut Cpu, value: u8) {
    cpu.set_reg(L, value)
}

pub fn mvi_m(cpu: &mut Cpu, value: u8) {
    cpu.set_source(Source::Memory, value)
}

pub fn lxi_b(cpu: &mut Cpu, value: u16) {
    cpu.set_pair(Pair::B, value)
}

pub fn lxi_d(cpu: &mut Cpu, value: u16) {
    cpu.set_pair(Pair::D, value)
}

pub fn lxi_h(cpu: &mut Cpu, value: u16) {
    cpu.set_pair(Pair::H, value)
}

pub fn lxi_sp(cpu: &mut Cpu, value: u16) {
    cpu.set_sp(value)
}

pub fn lda(cpu: &mut Cpu, addr: u16) {
    let value = cpu.read(addr);
    cpu.set_reg(A, value);
}

pub fn sta(cpu: &mut Cpu, addr: u16) {
    cpu.write(addr, cpu.reg(A));
}

pub fn lhld(cpu: &mut Cpu, addr: u16) {
    let value = cpu.read_word(addr);
    cpu.set_pair(Pair::H, value);
}

pub fn shld(cpu: &mut Cpu, addr: u16) {
    cpu.write_word(addr, cpu.pair(Pair::H));
}

pub fn ldax(cpu: &mut Cpu, pair: Pair) {
    let value = cpu.read(cpu.pair(pair));
    cpu.set_reg(A, value);
}

pub fn stax(cpu: &mut Cpu, pair: Pair) {
    cpu.write(cpu.pair(pair), cpu.reg(A));
}

pub fn xchg(cpu: &mut Cpu) {
    let de = cpu.pair(Pair::D);
    let hl = cpu.pair(Pair::H);
    cpu.set_pair(Pair::D, hl);
    cpu.set_pair(Pair::H, de);
}

pub fn xthl(cpu: &mut Cpu) {
    let sp = cpu.sp();
    let top = cpu.read_word(sp);
    cpu.write_word(sp, cpu.pair(Pair::H));
    cpu.set_pair(Pair::H, top);
}

pub fn sphl(cpu: &mut Cpu) {
    cpu.set_sp(cpu.pair(Pair::H))
}

pub fn pchl(cpu: &mut Cpu) {
    cpu.set_pc(cpu.pair(Pair::H))
}

pub fn push(cpu: &mut Cpu, pair: Pair) {
    cpu.push(cpu.pair(pair))
}

pub fn pop(cpu: &mut Cpu, pair: Pair) {
    let value = cpu.pop();
    cpu.set_pair(pair, value);
}

// Arithmetic

/// Add `operand` and `carry_in` into the accumulator, updating every flag.
fn add_to_accumulator(cpu: &mut Cpu, operand: u8, carry_in: bool) {
    let acc = cpu.reg(A);
    let sum = acc as u16 + operand as u16 + carry_in as u16;
    let result = sum as u8;
    cpu.apply(
        FlagUpdate::szp(result)
            .with_ac(aux_carry_add(acc, operand, carry_in))
            .with_carry(sum > 0xff),
    );
    cpu.set_reg(A, result);
}

/// Subtract `operand` and `borrow_in` from the accumulator, updating every
/// flag, and return the difference without storing it.
///
/// Carry is set on borrow and cleared otherwise, except that an exact match
/// keeps the previous carry.
fn subtract_from_accumulator(cpu: &mut Cpu, operand: u8, borrow_in: bool) -> u8 {
    let acc = cpu.reg(A);
    let subtrahend = operand as u16 + borrow_in as u16;
    let result = (acc as u16).wrapping_sub(subtrahend) as u8;
    let carry = match (acc as u16).cmp(&subtrahend) {
        Ordering::Less => true,
        Ordering::Equal => cpu.flag(Flag::C),
        Ordering::Greater => false,
    };
    cpu.apply(
        FlagUpdate::szp(result)
            .with_ac(aux_carry_sub(acc, operand, borrow_in))
            .with_carry(carry),
    );
    result
}

pub fn add(cpu: &mut Cpu, src: Source) {
    let value = cpu.source(src);
    add_to_accumulator(cpu, value, false)
}

pub fn adi(cpu: &mut Cpu, value: u8) {
    add_to_accumulator(cpu, value, false)
}

/// Carry is always left clear afterwards.
pub fn adc(cpu: &mut Cpu, src: Source) {
    let (value, carry) = (cpu.source(src), cpu.flag(Flag::C));
    add_to_accumulator(cpu, value, carry);
    cpu.set_flag(Flag::C, false);
}

pub fn aci(cpu: &mut Cpu, value: u8) {
    let carry = cpu.flag(Flag::C);
    add_to_accumulator(cpu, value, carry)
}

pub fn sub(cpu: &mut Cpu, src: Source) {
    let value = cpu.source(src);
    let result = subtract_from_accumulator(cpu, value, false);
    cpu.set_reg(A, result);
}

pub fn sui(cpu: &mut Cpu, value: u8) {
    let result = subtract_from_accumulator(cpu, value, false);
    cpu.set_reg(A, result);
}

/// Carry is always left clear afterwards, like `ADC`.
pub fn sbb(cpu: &mut Cpu, src: Source) {
    let (value, borrow) = (cpu.source(src), cpu.flag(Flag::C));
    let result = subtract_from_accumulator(cpu, value, borrow);
    cpu.set_reg(A, result);
    cpu.set_flag(Flag::C, false);
}

pub fn sbi(cpu: &mut Cpu, value: u8) {
    let borrow = cpu.flag(Flag::C);
    let result = subtract_from_accumulator(cpu, value, borrow);
    cpu.set_reg(A, result);
    cpu.set_flag(Flag::C, false);
}

/// Never touches carry.
pub fn inr(cpu: &mut Cpu, src: Source) {
    let value = cpu.source(src);
    let result = value.wrapping_add(1);
    cpu.apply(FlagUpdate::szp(result).with_ac(aux_carry_add(value, 1, false)));
    cpu.set_source(src, result);
}

/// Never touches carry.
pub fn dcr(cpu: &mut Cpu, src: Source) {
    let value = cpu.source(src);
    let result = value.wrapping_sub(1);
    cpu.apply(FlagUpdate::szp(result).with_ac(aux_carry_sub(value, 1, false)));
    cpu.set_source(src, result);
}

pub fn inx(cpu: &mut Cpu, pair: Pair) {
    cpu.set_pair(pair, cpu.pair(pair).wrapping_add(1))
}

pub fn dcx(cpu: &mut Cpu, pair: Pair) {
    cpu.set_pair(pair, cpu.pair(pair).wrapping_sub(1))
}

pub fn dad(cpu: &mut Cpu, pair: Pair) {
    let sum = cpu.pair(Pair::H) as u32 + cpu.pair(pair) as u32;
    cpu.set_flag(Flag::C, sum > 0xffff);
    cpu.set_pair(Pair::H, sum as u16);
}

pub fn daa(cpu: &mut Cpu) {
    let acc = cpu.reg(A);
    let low = acc & 0x0f;
    let high = acc >> 4;
    let mut carry = cpu.flag(Flag::C);
    let mut correction = 0;

    if cpu.flag(Flag::AC) || low > 9 {
        correction |= 0x06;
    }
    if carry || high > 9 || (high >= 9 && low > 9) {
        correction |= 0x60;
        carry = true;
    }

    let result = acc.wrapping_add(correction);
    cpu.apply(
        FlagUpdate::szp(result)
            .with_ac(aux_carry_add(acc, correction, false))
            .with_carry(carry),
    );
    cpu.set_reg(A, result);
}

// Logical

fn logical(cpu: &mut Cpu, result: u8, ac: bool) {
    cpu.apply(FlagUpdate::szp(result).with_ac(ac).with_carry(false));
    cpu.set_reg(A, result);
}

pub fn ana(cpu: &mut Cpu, src: Source) {
    let result = cpu.reg(A) & cpu.source(src);
    logical(cpu, result, true)
}

pub fn ani(cpu: &mut Cpu, value: u8) {
    let result = cpu.reg(A) & value;
    logical(cpu, result, true)
}

pub fn ora(cpu: &mut Cpu, src: Source) {
    let result = cpu.reg(A) | cpu.source(src);
    logical(cpu, result, false)
}

pub fn ori(cpu: &mut Cpu, value: u8) {
    let result = cpu.reg(A) | value;
    logical(cpu, result, false)
}

pub fn xra(cpu: &mut Cpu, src: Source) {
    let result = cpu.reg(A) ^ cpu.source(src);
    logical(cpu, result, false)
}

pub fn xri(cpu: &mut Cpu, value: u8) {
    let result = cpu.reg(A) ^ value;
    logical(cpu, result, false)
}

pub fn cmp(cpu: &mut Cpu, src: Source) {
    let value = cpu.source(src);
    subtract_from_accumulator(cpu, value, false);
}

pub fn cpi(cpu: &mut Cpu, value: u8) {
    subtract_from_accumulator(cpu, value, false);
}

pub fn rlc(cpu: &mut Cpu) {
    let acc = cpu.reg(A);
    cpu.set_flag(Flag::C, acc & 0x80 != 0);
    cpu.set_reg(A, acc.rotate_left(1));
}

pub fn rrc(cpu: &mut Cpu) {
    let acc = cpu.reg(A);
    cpu.set_flag(Flag::C, acc & 0x01 != 0);
    cpu.set_reg(A, acc.rotate_right(1));
}

pub fn ral(cpu: &mut Cpu) {
    let acc = cpu.reg(A);
    let carry_in = cpu.flag(Flag::C) as u8;
    cpu.set_flag(Flag::C, acc & 0x80 != 0);
    cpu.set_reg(A, acc << 1 | carry_in);
}

pub fn rar(cpu: &mut Cpu) {
    let acc = cpu.reg(A);
    let carry_in = cpu.flag(Flag::C) as u8;
    cpu.set_flag(Flag::C, acc & 0x01 != 0);
    cpu.set_reg(A, acc >> 1 | carry_in << 7);
}

pub fn cma(cpu: &mut Cpu) {
    cpu.set_reg(A, !cpu.reg(A))
}

pub fn cmc(cpu: &mut Cpu) {
    cpu.set_flag(Flag::C, !cpu.flag(Flag::C))
}

pub fn stc(cpu: &mut Cpu) {
    cpu.set_flag(Flag::C, true)
}

// Branch

fn jump_if(cpu: &mut Cpu, addr: u16, flag: Flag, expected: bool) {
    if cpu.flag(flag) == expected {
        cpu.set_pc(addr);
    }
}

fn call_if(cpu: &mut Cpu, addr: u16, flag: Flag, expected: bool) {
    if cpu.flag(flag) == expected {
        call(cpu, addr);
    }
}

fn return_if(cpu: &mut Cpu, flag: Flag, expected: bool) {
    if cpu.flag(flag) == expected {
        ret(cpu);
    }
}

pub fn jmp(cpu: &mut Cpu, addr: u16) {
    cpu.set_pc(addr)
}

pub fn jnz(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::Z, false)
}

pub fn jz(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::Z, true)
}

pub fn jnc(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::C, false)
}

pub fn jc(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::C, true)
}

pub fn jpo(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::P, false)
}

pub fn jpe(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::P, true)
}

pub fn jp(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::S, false)
}

pub fn jm(cpu: &mut Cpu, addr: u16) {
    jump_if(cpu, addr, Flag::S, true)
}

pub fn call(cpu: &mut Cpu, addr: u16) {
    cpu.push(cpu.pc());
    cpu.set_pc(addr);
}

pub fn cnz(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::Z, false)
}

pub fn cz(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::Z, true)
}

pub fn cnc(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::C, false)
}

pub fn cc(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::C, true)
}

pub fn cpo(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::P, false)
}

pub fn cpe(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::P, true)
}

pub fn cp(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::S, false)
}

pub fn cm(cpu: &mut Cpu, addr: u16) {
    call_if(cpu, addr, Flag::S, true)
}

pub fn ret(cpu: &mut Cpu) {
    let addr = cpu.pop();
    cpu.set_pc(addr);
}

pub fn rnz(cpu: &mut Cpu) {
    return_if(cpu, Flag::Z, false)
}

pub fn rz(cpu: &mut Cpu) {
    return_if(cpu, Flag::Z, true)
}

pub fn rnc(cpu: &mut Cpu) {
    return_if(cpu, Flag::C, false)
}

pub fn rc(cpu: &mut Cpu) {
    return_if(cpu, Flag::C, true)
}

pub fn rpo(cpu: &mut Cpu) {
    return_if(cpu, Flag::P, false)
}

pub fn rpe(cpu: &mut Cpu) {
    return_if(cpu, Flag::P, true)
}

pub fn rp(cpu: &mut Cpu) {
    return_if(cpu, Flag::S, false)
}

pub fn rm(cpu: &mut Cpu) {
    return_if(cpu, Flag::S, true)
}

pub fn rst(cpu: &mut Cpu, index: u8) {
    call(cpu, index as u16 * 8)
}

// Control

/// Interrupt enable bit of the mask register, as read by `RIM`.
const INTERRUPT_ENABLE: u8 = 0x08;
/// `SIM` only updates the RST 5.5/6.5/7.5 masks when this bit of A is set.
const MASK_SET_ENABLE: u8 = 0x08;
const RST_MASKS: u8 = 0x07;

pub fn nop(_cpu: &mut Cpu) {}

pub fn hlt(cpu: &mut Cpu) {
    cpu.halt()
}

pub fn ei(cpu: &mut Cpu) {
    cpu.set_interrupt_mask(cpu.interrupt_mask() | INTERRUPT_ENABLE)
}

pub fn di(cpu: &mut Cpu) {
    cpu.set_interrupt_mask(cpu.interrupt_mask() & !INTERRUPT_ENABLE)
}

pub fn sim(cpu: &mut Cpu) {
    let acc = cpu.reg(A);
    if acc & MASK_SET_ENABLE != 0 {
        cpu.set_interrupt_mask(cpu.interrupt_mask() & !RST_MASKS | acc & RST_MASKS);
    }
}

pub fn rim(cpu: &mut Cpu) {
    cpu.set_reg(A, cpu.interrupt_mask())
}

// No device is attached to the I/O ports.
pub fn input(_cpu: &mut Cpu, _port: u8) {}

pub fn output(_cpu: &mut Cpu, _port: u8) {}
