// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Integer load/store handlers.
//!
//! Base registers always use the SP register form; transfer registers use
//! the zero-register form. Faulting accesses surface the guest address
//! through [`StepResult::MemoryFault`].

use super::alu::extend_value;
use super::StepResult;
use crate::decoder::{AddrMode, Extend};
use crate::memory::MemoryWindow;
use crate::state::CpuState;

/// Resolve the effective address and perform any base writeback.
pub(crate) fn resolve_addr(state: &mut CpuState, rn: u32, imm: i64, mode: AddrMode) -> u64 {
    let base = state.reg_sp(rn);
    match mode {
        AddrMode::Offset => (base as i64).wrapping_add(imm) as u64,
        AddrMode::PreIndex => {
            let addr = (base as i64).wrapping_add(imm) as u64;
            state.set_reg_sp(rn, addr);
            addr
        }
        AddrMode::PostIndex => {
            state.set_reg_sp(rn, (base as i64).wrapping_add(imm) as u64);
            base
        }
    }
}

/// Read `1 << size` bytes, with optional sign extension into a W or X
/// destination.
fn read_scaled(
    mem: &MemoryWindow,
    addr: u64,
    size: u32,
    sign_extend: bool,
    to64: bool,
) -> Result<u64, u64> {
    let raw = match size {
        0 => mem.read_u8(addr).map(u64::from),
        1 => mem.read_u16(addr).map(u64::from),
        2 => mem.read_u32(addr).map(u64::from),
        _ => mem.read_u64(addr),
    }
    .map_err(|_| addr)?;

    if !sign_extend {
        return Ok(raw);
    }
    let extended = match size {
        0 => raw as i8 as i64 as u64,
        1 => raw as i16 as i64 as u64,
        2 => raw as i32 as i64 as u64,
        _ => raw,
    };
    Ok(if to64 { extended } else { extended & 0xFFFF_FFFF })
}

fn write_scaled(mem: &mut MemoryWindow, addr: u64, val: u64, size: u32) -> Result<(), u64> {
    match size {
        0 => mem.write_u8(addr, val as u8),
        1 => mem.write_u16(addr, val as u16),
        2 => mem.write_u32(addr, val as u32),
        _ => mem.write_u64(addr, val),
    }
    .map_err(|_| addr)
}

#[allow(clippy::too_many_arguments)]
pub fn exec_load_imm(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
    sign_extend: bool,
    to64: bool,
) -> StepResult {
    let addr = resolve_addr(state, rn, imm, mode);
    match read_scaled(mem, addr, size, sign_extend, to64) {
        Ok(val) => {
            state.set_reg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

pub fn exec_store_imm(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rt: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
) -> StepResult {
    let val = state.reg(rt);
    let addr = resolve_addr(state, rn, imm, mode);
    match write_scaled(mem, addr, val, size) {
        Ok(()) => StepResult::Continue,
        Err(a) => StepResult::MemoryFault(a),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_load_reg(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    rn: u32,
    rm: u32,
    size: u32,
    extend: Extend,
    amount: u32,
    sign_extend: bool,
    to64: bool,
) -> StepResult {
    let offset = extend_value(state.reg(rm), extend, amount);
    let addr = state.reg_sp(rn).wrapping_add(offset);
    match read_scaled(mem, addr, size, sign_extend, to64) {
        Ok(val) => {
            state.set_reg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_store_reg(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rt: u32,
    rn: u32,
    rm: u32,
    size: u32,
    extend: Extend,
    amount: u32,
) -> StepResult {
    let offset = extend_value(state.reg(rm), extend, amount);
    let addr = state.reg_sp(rn).wrapping_add(offset);
    match write_scaled(mem, addr, state.reg(rt), size) {
        Ok(()) => StepResult::Continue,
        Err(a) => StepResult::MemoryFault(a),
    }
}

pub fn exec_load_lit(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    opc: u32,
    imm: i64,
) -> StepResult {
    let addr = (state.pc as i64).wrapping_add(imm) as u64;
    let (size, sign_ext) = match opc {
        0b00 => (2, false),
        0b01 => (3, false),
        _ => (2, true), // LDRSW
    };
    match read_scaled(mem, addr, size, sign_ext, true) {
        Ok(val) => {
            state.set_reg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_load_pair(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    rt2: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
    sign_extend: bool,
) -> StepResult {
    let addr = resolve_addr(state, rn, imm, mode);
    let step = 1u64 << size;
    let v1 = match read_scaled(mem, addr, size, sign_extend, true) {
        Ok(v) => v,
        Err(a) => return StepResult::MemoryFault(a),
    };
    let v2 = match read_scaled(mem, addr.wrapping_add(step), size, sign_extend, true) {
        Ok(v) => v,
        Err(a) => return StepResult::MemoryFault(a),
    };
    state.set_reg(rt, v1);
    state.set_reg(rt2, v2);
    StepResult::Continue
}

pub fn exec_store_pair(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rt: u32,
    rt2: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
) -> StepResult {
    let v1 = state.reg(rt);
    let v2 = state.reg(rt2);
    let addr = resolve_addr(state, rn, imm, mode);
    let step = 1u64 << size;
    if let Err(a) = write_scaled(mem, addr, v1, size) {
        return StepResult::MemoryFault(a);
    }
    if let Err(a) = write_scaled(mem, addr.wrapping_add(step), v2, size) {
        return StepResult::MemoryFault(a);
    }
    StepResult::Continue
}

/// LDXR / LDAXR / LDAR: acquire semantics collapse to a plain load with a
/// single execution context.
pub fn exec_load_acq(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    rn: u32,
    size: u32,
) -> StepResult {
    let addr = state.reg_sp(rn);
    match read_scaled(mem, addr, size, false, false) {
        Ok(val) => {
            state.set_reg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

/// STLR: release semantics collapse to a plain store.
pub fn exec_store_rel(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rt: u32,
    rn: u32,
    size: u32,
) -> StepResult {
    let addr = state.reg_sp(rn);
    match write_scaled(mem, addr, state.reg(rt), size) {
        Ok(()) => StepResult::Continue,
        Err(a) => StepResult::MemoryFault(a),
    }
}

/// STXR / STLXR. The store always happens and the status register always
/// reports success; there is no other observer to lose exclusivity to.
pub fn exec_store_excl(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rs: u32,
    rt: u32,
    rn: u32,
    size: u32,
) -> StepResult {
    let addr = state.reg_sp(rn);
    match write_scaled(mem, addr, state.reg(rt), size) {
        Ok(()) => {
            state.set_reg(rs, 0);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}
