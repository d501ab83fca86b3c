// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! System register access and DC ZVA.
//!
//! Only the small enumerated register set is implemented; any other
//! MRS/MSR encoding is a decode failure.

use super::StepResult;
use crate::memory::MemoryWindow;
use crate::state::CpuState;
use aemu_common::{align_down, CNTFRQ_HZ, ZVA_BLOCK_SIZE};

use std::sync::OnceLock;
use std::time::Instant;

/// Packed (op0:op1:CRn:CRm:op2) encodings, matching the decoder's key.
mod key {
    const fn pack(op0: u32, op1: u32, crn: u32, crm: u32, op2: u32) -> u32 {
        (op0 << 14) | (op1 << 11) | (crn << 7) | (crm << 3) | op2
    }

    pub const TPIDR_EL0: u32 = pack(3, 3, 13, 0, 2);
    pub const CNTVCT_EL0: u32 = pack(3, 3, 14, 0, 2);
    pub const CNTFRQ_EL0: u32 = pack(3, 3, 14, 0, 0);
    pub const MIDR_EL1: u32 = pack(3, 0, 0, 0, 0);
    pub const DCZID_EL0: u32 = pack(3, 3, 0, 0, 7);
    pub const FPCR: u32 = pack(3, 3, 4, 4, 0);
}

/// MIDR_EL1 value: an arbitrary but stable implementer/part id.
const MIDR_VALUE: u64 = 0x410F_D0C0;

/// DCZID_EL0: log2 of the ZVA block size in words, so 128 bytes -> 5.
const DCZID_VALUE: u64 = 5;

/// Virtual counter: monotonic nanoseconds since the first read.
fn virtual_count() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

pub fn exec_mrs(state: &mut CpuState, rt: u32, reg_key: u32) -> StepResult {
    let value = match reg_key {
        key::TPIDR_EL0 => state.tpidr_el0,
        key::CNTVCT_EL0 => virtual_count(),
        key::CNTFRQ_EL0 => CNTFRQ_HZ,
        key::MIDR_EL1 => MIDR_VALUE,
        key::DCZID_EL0 => DCZID_VALUE,
        key::FPCR => state.fpcr,
        _ => {
            return StepResult::Fatal { msg: "unhandled system register read", value: reg_key as u64 }
        }
    };
    state.set_reg(rt, value);
    StepResult::Continue
}

pub fn exec_msr(state: &mut CpuState, rt: u32, reg_key: u32) -> StepResult {
    let value = state.reg(rt);
    match reg_key {
        key::TPIDR_EL0 => state.tpidr_el0 = value,
        key::FPCR => {
            // Accepted but inert: rounding stays nearest-even.
            log::debug!("MSR FPCR, {value:#x} ignored");
            state.fpcr = value;
        }
        _ => {
            return StepResult::Fatal { msg: "unhandled system register write", value: reg_key as u64 }
        }
    }
    StepResult::Continue
}

/// DC ZVA: zero the aligned 128-byte block containing the address in Xt.
pub fn exec_dc_zva(state: &mut CpuState, mem: &mut MemoryWindow, rt: u32) -> StepResult {
    let addr = align_down(state.reg(rt), ZVA_BLOCK_SIZE);
    match mem.fill(addr, 0, ZVA_BLOCK_SIZE) {
        Ok(()) => StepResult::Continue,
        Err(_) => StepResult::MemoryFault(addr),
    }
}
