// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Scalar FP handlers and SIMD register loads/stores.
//!
//! Single and double precision use native host arithmetic; half
//! precision is widened to f64 around each operation. Every scalar write
//! clears the rest of the 128-bit register.

use super::mem::resolve_addr;
use super::StepResult;
use crate::bits::{f16_to_f64, f64_to_f16, vfp_expand_imm};
use crate::decoder::{AddrMode, Extend, FpBinOp, FpRounding, FpType};
use crate::flags::nzcv_from_fcmp;
use crate::memory::MemoryWindow;
use crate::state::CpuState;

/// Read a scalar FP operand, widened to f64 (exact for all inputs).
fn read_f64(state: &CpuState, ftype: FpType, reg: u32) -> f64 {
    let raw = state.vreg_lane(reg, 0, 64);
    match ftype {
        FpType::Single => f32::from_bits(raw as u32) as f64,
        FpType::Double => f64::from_bits(raw),
        FpType::Half => f16_to_f64(raw as u16),
    }
}

/// Write a scalar FP result, rounding to the target precision and zeroing
/// the rest of the register.
fn write_f64(state: &mut CpuState, ftype: FpType, reg: u32, val: f64) {
    let bits = match ftype {
        FpType::Single => (val as f32).to_bits() as u64,
        FpType::Double => val.to_bits(),
        FpType::Half => f64_to_f16(val) as u64,
    };
    state.set_vreg_scalar(reg, ftype.esize(), bits);
}

pub fn exec_fmov_reg(state: &mut CpuState, ftype: FpType, rd: u32, rn: u32) -> StepResult {
    let raw = state.vreg_lane(rn, 0, 64);
    let bits = match ftype {
        FpType::Single => raw & 0xFFFF_FFFF,
        FpType::Double => raw,
        FpType::Half => raw & 0xFFFF,
    };
    state.set_vreg_scalar(rd, ftype.esize(), bits);
    StepResult::Continue
}

pub fn exec_fmov_imm(state: &mut CpuState, ftype: FpType, rd: u32, imm8: u32) -> StepResult {
    let bits = vfp_expand_imm(imm8, ftype.esize());
    state.set_vreg_scalar(rd, ftype.esize(), bits);
    StepResult::Continue
}

pub fn exec_fmov_to_gp(state: &mut CpuState, sf: bool, rd: u32, rn: u32, top: bool) -> StepResult {
    let raw = if top {
        state.vreg_lane(rn, 1, 64)
    } else {
        state.vreg_lane(rn, 0, 64)
    };
    state.set_reg(rd, if sf { raw } else { raw & 0xFFFF_FFFF });
    StepResult::Continue
}

pub fn exec_fmov_from_gp(state: &mut CpuState, sf: bool, rd: u32, rn: u32, top: bool) -> StepResult {
    let val = state.reg(rn);
    if top {
        // FMOV Vd.D[1], Xn keeps the low double intact.
        state.set_vreg_lane(rd, 1, 64, val);
    } else if sf {
        state.set_vreg_scalar(rd, 64, val);
    } else {
        state.set_vreg_scalar(rd, 32, val & 0xFFFF_FFFF);
    }
    StepResult::Continue
}

pub fn exec_fp_unary(state: &mut CpuState, ftype: FpType, op: u32, rd: u32, rn: u32) -> StepResult {
    let val = read_f64(state, ftype, rn);
    let result = match op {
        0b000001 => val.abs(),
        0b000010 => -val,
        _ => val.sqrt(),
    };
    write_f64(state, ftype, rd, result);
    StepResult::Continue
}

pub fn exec_fp_arith(
    state: &mut CpuState,
    ftype: FpType,
    op: FpBinOp,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    // Single precision must round each operation at 32 bits; doing the
    // arithmetic in f64 and rounding once at the end is not the same.
    if ftype == FpType::Single {
        let a = f32::from_bits(state.vreg_lane(rn, 0, 32) as u32);
        let b = f32::from_bits(state.vreg_lane(rm, 0, 32) as u32);
        let r = match op {
            FpBinOp::Add => a + b,
            FpBinOp::Sub => a - b,
            FpBinOp::Mul => a * b,
            FpBinOp::Div => a / b,
            FpBinOp::Nmul => -(a * b),
            FpBinOp::Max => a.max(b),
            FpBinOp::Min => a.min(b),
            FpBinOp::MaxNm => {
                if a.is_nan() { b } else if b.is_nan() { a } else { a.max(b) }
            }
            FpBinOp::MinNm => {
                if a.is_nan() { b } else if b.is_nan() { a } else { a.min(b) }
            }
        };
        state.set_vreg_scalar(rd, 32, r.to_bits() as u64);
        return StepResult::Continue;
    }

    let a = read_f64(state, ftype, rn);
    let b = read_f64(state, ftype, rm);
    let r = match op {
        FpBinOp::Add => a + b,
        FpBinOp::Sub => a - b,
        FpBinOp::Mul => a * b,
        FpBinOp::Div => a / b,
        FpBinOp::Nmul => -(a * b),
        FpBinOp::Max => a.max(b),
        FpBinOp::Min => a.min(b),
        FpBinOp::MaxNm => {
            if a.is_nan() { b } else if b.is_nan() { a } else { a.max(b) }
        }
        FpBinOp::MinNm => {
            if a.is_nan() { b } else if b.is_nan() { a } else { a.min(b) }
        }
    };
    write_f64(state, ftype, rd, r);
    StepResult::Continue
}

pub fn exec_fp_fma(
    state: &mut CpuState,
    ftype: FpType,
    op: u32,
    rd: u32,
    rn: u32,
    rm: u32,
    ra: u32,
) -> StepResult {
    // op: 0 FMADD, 1 FMSUB, 2 FNMADD, 3 FNMSUB.
    if ftype == FpType::Single {
        let a = f32::from_bits(state.vreg_lane(rn, 0, 32) as u32);
        let b = f32::from_bits(state.vreg_lane(rm, 0, 32) as u32);
        let c = f32::from_bits(state.vreg_lane(ra, 0, 32) as u32);
        let r = match op {
            0 => a.mul_add(b, c),
            1 => (-a).mul_add(b, c),
            2 => (-a).mul_add(b, -c),
            _ => a.mul_add(b, -c),
        };
        state.set_vreg_scalar(rd, 32, r.to_bits() as u64);
        return StepResult::Continue;
    }
    let a = read_f64(state, ftype, rn);
    let b = read_f64(state, ftype, rm);
    let c = read_f64(state, ftype, ra);
    let r = match op {
        0 => a.mul_add(b, c),
        1 => (-a).mul_add(b, c),
        2 => (-a).mul_add(b, -c),
        _ => a.mul_add(b, -c),
    };
    write_f64(state, ftype, rd, r);
    StepResult::Continue
}

pub fn exec_fp_compare(
    state: &mut CpuState,
    ftype: FpType,
    rn: u32,
    rm: u32,
    with_zero: bool,
) -> StepResult {
    let a = read_f64(state, ftype, rn);
    let b = if with_zero { 0.0 } else { read_f64(state, ftype, rm) };
    state.set_nzcv(nzcv_from_fcmp(a, b));
    StepResult::Continue
}

pub fn exec_fp_cond_compare(
    state: &mut CpuState,
    ftype: FpType,
    rn: u32,
    rm: u32,
    cond: u32,
    nzcv: u8,
) -> StepResult {
    if state.condition_holds(cond) {
        let a = read_f64(state, ftype, rn);
        let b = read_f64(state, ftype, rm);
        state.set_nzcv(nzcv_from_fcmp(a, b));
    } else {
        state.set_nzcv(nzcv);
    }
    StepResult::Continue
}

pub fn exec_fp_cond_select(
    state: &mut CpuState,
    ftype: FpType,
    rd: u32,
    rn: u32,
    rm: u32,
    cond: u32,
) -> StepResult {
    let src = if state.condition_holds(cond) { rn } else { rm };
    let raw = state.vreg_lane(src, 0, 64);
    state.set_vreg_scalar(rd, ftype.esize(), raw);
    StepResult::Continue
}

pub fn exec_fp_convert(
    state: &mut CpuState,
    rd: u32,
    rn: u32,
    from: FpType,
    to: FpType,
) -> StepResult {
    let val = read_f64(state, from, rn);
    write_f64(state, to, rd, val);
    StepResult::Continue
}

/// Apply an FP rounding direction, producing an integral f64.
fn round_f64(val: f64, round: FpRounding) -> f64 {
    match round {
        FpRounding::TieEven => val.round_ties_even(),
        FpRounding::PosInf => val.ceil(),
        FpRounding::NegInf => val.floor(),
        FpRounding::Zero => val.trunc(),
        FpRounding::TieAway => val.round(),
    }
}

pub fn exec_fp_to_int(
    state: &mut CpuState,
    sf: bool,
    ftype: FpType,
    rd: u32,
    rn: u32,
    unsigned: bool,
    round: FpRounding,
) -> StepResult {
    let rounded = round_f64(read_f64(state, ftype, rn), round);
    // Saturating casts: out-of-range positives clamp to the type maximum,
    // negatives clamp to zero for the unsigned forms, NaN becomes zero.
    let result = match (sf, unsigned) {
        (true, false) => rounded as i64 as u64,
        (true, true) => rounded as u64,
        (false, false) => rounded as i32 as u32 as u64,
        (false, true) => (rounded as u32) as u64,
    };
    state.set_reg(rd, result);
    StepResult::Continue
}

pub fn exec_int_to_fp(
    state: &mut CpuState,
    sf: bool,
    ftype: FpType,
    rd: u32,
    rn: u32,
    unsigned: bool,
) -> StepResult {
    let raw = state.reg(rn);
    let val = match (sf, unsigned) {
        (true, false) => raw as i64 as f64,
        (true, true) => raw as f64,
        (false, false) => raw as u32 as i32 as f64,
        (false, true) => raw as u32 as f64,
    };
    // Round once at the destination precision.
    if ftype == FpType::Single {
        let single = match (sf, unsigned) {
            (true, false) => raw as i64 as f32,
            (true, true) => raw as f32,
            (false, false) => raw as u32 as i32 as f32,
            (false, true) => raw as u32 as f32,
        };
        state.set_vreg_scalar(rd, 32, single.to_bits() as u64);
    } else {
        write_f64(state, ftype, rd, val);
    }
    StepResult::Continue
}

pub fn exec_fp_to_fixed(
    state: &mut CpuState,
    sf: bool,
    ftype: FpType,
    rd: u32,
    rn: u32,
    unsigned: bool,
    fbits: u32,
) -> StepResult {
    let scaled = read_f64(state, ftype, rn) * (fbits as f64).exp2();
    let truncated = scaled.trunc();
    let result = match (sf, unsigned) {
        (true, false) => truncated as i64 as u64,
        (true, true) => truncated as u64,
        (false, false) => truncated as i32 as u32 as u64,
        (false, true) => (truncated as u32) as u64,
    };
    state.set_reg(rd, result);
    StepResult::Continue
}

pub fn exec_fixed_to_fp(
    state: &mut CpuState,
    sf: bool,
    ftype: FpType,
    rd: u32,
    rn: u32,
    unsigned: bool,
    fbits: u32,
) -> StepResult {
    let raw = state.reg(rn);
    let int_val = match (sf, unsigned) {
        (true, false) => raw as i64 as f64,
        (true, true) => raw as f64,
        (false, false) => raw as u32 as i32 as f64,
        (false, true) => raw as u32 as f64,
    };
    write_f64(state, ftype, rd, int_val / (fbits as f64).exp2());
    StepResult::Continue
}

pub fn exec_fp_round(
    state: &mut CpuState,
    ftype: FpType,
    rd: u32,
    rn: u32,
    round: FpRounding,
) -> StepResult {
    let result = round_f64(read_f64(state, ftype, rn), round);
    write_f64(state, ftype, rd, result);
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// SIMD register loads and stores
// ---------------------------------------------------------------------------

fn read_simd(mem: &MemoryWindow, addr: u64, size: u32) -> Result<u128, u64> {
    match size {
        0 => mem.read_u8(addr).map(u128::from),
        1 => mem.read_u16(addr).map(u128::from),
        2 => mem.read_u32(addr).map(u128::from),
        3 => mem.read_u64(addr).map(u128::from),
        _ => mem.read_u128(addr),
    }
    .map_err(|_| addr)
}

fn write_simd(mem: &mut MemoryWindow, addr: u64, val: u128, size: u32) -> Result<(), u64> {
    match size {
        0 => mem.write_u8(addr, val as u8),
        1 => mem.write_u16(addr, val as u16),
        2 => mem.write_u32(addr, val as u32),
        3 => mem.write_u64(addr, val as u64),
        _ => mem.write_u128(addr, val),
    }
    .map_err(|_| addr)
}

pub fn exec_simd_load_imm(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
) -> StepResult {
    let addr = resolve_addr(state, rn, imm, mode);
    match read_simd(mem, addr, size) {
        Ok(val) => {
            state.set_vreg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

pub fn exec_simd_store_imm(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rt: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
) -> StepResult {
    let val = state.vreg(rt);
    let addr = resolve_addr(state, rn, imm, mode);
    match write_simd(mem, addr, val, size) {
        Ok(()) => StepResult::Continue,
        Err(a) => StepResult::MemoryFault(a),
    }
}

pub fn exec_simd_load_reg(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    rn: u32,
    rm: u32,
    size: u32,
    extend: Extend,
    amount: u32,
) -> StepResult {
    let offset = super::alu::extend_value(state.reg(rm), extend, amount);
    let addr = state.reg_sp(rn).wrapping_add(offset);
    match read_simd(mem, addr, size) {
        Ok(val) => {
            state.set_vreg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

pub fn exec_simd_store_reg(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    rt: u32,
    rn: u32,
    rm: u32,
    size: u32,
    extend: Extend,
    amount: u32,
) -> StepResult {
    let offset = super::alu::extend_value(state.reg(rm), extend, amount);
    let addr = state.reg_sp(rn).wrapping_add(offset);
    match write_simd(mem, addr, state.vreg(rt), size) {
        Ok(()) => StepResult::Continue,
        Err(a) => StepResult::MemoryFault(a),
    }
}

pub fn exec_simd_load_lit(
    state: &mut CpuState,
    mem: &MemoryWindow,
    rt: u32,
    size: u32,
    imm: i64,
) -> StepResult {
    let addr = (state.pc as i64).wrapping_add(imm) as u64;
    match read_simd(mem, addr, size) {
        Ok(val) => {
            state.set_vreg(rt, val);
            StepResult::Continue
        }
        Err(a) => StepResult::MemoryFault(a),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_simd_pair(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    load: bool,
    rt: u32,
    rt2: u32,
    rn: u32,
    imm: i64,
    size: u32,
    mode: AddrMode,
) -> StepResult {
    let (v1, v2) = (state.vreg(rt), state.vreg(rt2));
    let addr = resolve_addr(state, rn, imm, mode);
    let step = 1u64 << size;
    if load {
        let v1 = match read_simd(mem, addr, size) {
            Ok(v) => v,
            Err(a) => return StepResult::MemoryFault(a),
        };
        let v2 = match read_simd(mem, addr.wrapping_add(step), size) {
            Ok(v) => v,
            Err(a) => return StepResult::MemoryFault(a),
        };
        state.set_vreg(rt, v1);
        state.set_vreg(rt2, v2);
    } else {
        if let Err(a) = write_simd(mem, addr, v1, size) {
            return StepResult::MemoryFault(a);
        }
        if let Err(a) = write_simd(mem, addr.wrapping_add(step), v2, size) {
            return StepResult::MemoryFault(a);
        }
    }
    StepResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_d(reg: u32, val: f64) -> CpuState {
        let mut s = CpuState::new();
        s.set_vreg_scalar(reg, 64, val.to_bits());
        s
    }

    #[test]
    fn test_fadd_double() {
        let mut s = state_with_d(0, 1.5);
        s.set_vreg_scalar(1, 64, 2.25f64.to_bits());
        exec_fp_arith(&mut s, FpType::Double, FpBinOp::Add, 2, 0, 1);
        assert_eq!(f64::from_bits(s.vreg_lane(2, 0, 64)), 3.75);
        assert_eq!(s.vreg_lane(2, 1, 64), 0); // upper half zeroed
    }

    #[test]
    fn test_fp_single_rounds_at_32_bits() {
        let mut s = CpuState::new();
        s.set_vreg_scalar(0, 32, 1.0e30f32.to_bits() as u64);
        s.set_vreg_scalar(1, 32, 1.0e30f32.to_bits() as u64);
        exec_fp_arith(&mut s, FpType::Single, FpBinOp::Mul, 2, 0, 1);
        // Overflows f32: must be +inf, not a finite f64 demoted later.
        assert_eq!(f32::from_bits(s.vreg_lane(2, 0, 32) as u32), f32::INFINITY);
    }

    #[test]
    fn test_fnmul() {
        let mut s = state_with_d(0, 3.0);
        s.set_vreg_scalar(1, 64, 2.0f64.to_bits());
        exec_fp_arith(&mut s, FpType::Double, FpBinOp::Nmul, 2, 0, 1);
        assert_eq!(f64::from_bits(s.vreg_lane(2, 0, 64)), -6.0);
    }

    #[test]
    fn test_fma_variants() {
        let mut s = CpuState::new();
        s.set_vreg_scalar(1, 64, 2.0f64.to_bits());
        s.set_vreg_scalar(2, 64, 3.0f64.to_bits());
        s.set_vreg_scalar(3, 64, 4.0f64.to_bits());
        // FMADD: 4 + 2*3
        exec_fp_fma(&mut s, FpType::Double, 0, 0, 1, 2, 3);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 10.0);
        // FMSUB: 4 - 2*3
        exec_fp_fma(&mut s, FpType::Double, 1, 0, 1, 2, 3);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), -2.0);
        // FNMADD: -(4 + 2*3)
        exec_fp_fma(&mut s, FpType::Double, 2, 0, 1, 2, 3);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), -10.0);
        // FNMSUB: 2*3 - 4
        exec_fp_fma(&mut s, FpType::Double, 3, 0, 1, 2, 3);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 2.0);
    }

    #[test]
    fn test_fcmp_flag_patterns() {
        let mut s = state_with_d(0, 1.0);
        s.set_vreg_scalar(1, 64, 2.0f64.to_bits());
        exec_fp_compare(&mut s, FpType::Double, 0, 1, false);
        assert_eq!(s.nzcv_nibble(), 0b1000); // less
        exec_fp_compare(&mut s, FpType::Double, 1, 0, false);
        assert_eq!(s.nzcv_nibble(), 0b0010); // greater
        exec_fp_compare(&mut s, FpType::Double, 0, 0, false);
        assert_eq!(s.nzcv_nibble(), 0b0110); // equal
        s.set_vreg_scalar(1, 64, f64::NAN.to_bits());
        exec_fp_compare(&mut s, FpType::Double, 0, 1, false);
        assert_eq!(s.nzcv_nibble(), 0b0011); // unordered
        // Compare with zero form.
        exec_fp_compare(&mut s, FpType::Double, 0, 31, true);
        assert_eq!(s.nzcv_nibble(), 0b0010);
    }

    #[test]
    fn test_fccmp_condition_false_uses_imm() {
        let mut s = state_with_d(0, 1.0);
        s.set_nzcv(0); // EQ fails
        exec_fp_cond_compare(&mut s, FpType::Double, 0, 0, 0b0000, 0b0101);
        assert_eq!(s.nzcv_nibble(), 0b0101);
    }

    #[test]
    fn test_fcsel() {
        let mut s = state_with_d(0, 1.0);
        s.set_vreg_scalar(1, 64, 2.0f64.to_bits());
        s.set_nzcv(crate::flags::Z);
        exec_fp_cond_select(&mut s, FpType::Double, 2, 0, 1, 0b0000);
        assert_eq!(f64::from_bits(s.vreg_lane(2, 0, 64)), 1.0);
        s.set_nzcv(0);
        exec_fp_cond_select(&mut s, FpType::Double, 2, 0, 1, 0b0000);
        assert_eq!(f64::from_bits(s.vreg_lane(2, 0, 64)), 2.0);
    }

    #[test]
    fn test_fcvt_half_single_double() {
        let mut s = CpuState::new();
        s.set_vreg_scalar(0, 32, 1.5f32.to_bits() as u64);
        exec_fp_convert(&mut s, 1, 0, FpType::Single, FpType::Double);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), 1.5);
        exec_fp_convert(&mut s, 2, 1, FpType::Double, FpType::Half);
        assert_eq!(s.vreg_lane(2, 0, 16), 0x3E00); // 1.5 as f16
        exec_fp_convert(&mut s, 3, 2, FpType::Half, FpType::Single);
        assert_eq!(f32::from_bits(s.vreg_lane(3, 0, 32) as u32), 1.5);
    }

    #[test]
    fn test_fcvtzu_negative_clamps_to_zero() {
        let mut s = state_with_d(0, -3.5);
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, true, FpRounding::Zero);
        assert_eq!(s.reg(1), 0);
    }

    #[test]
    fn test_fcvtz_saturation() {
        let mut s = state_with_d(0, 1e30);
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, true, FpRounding::Zero);
        assert_eq!(s.reg(1), u64::MAX);
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, false, FpRounding::Zero);
        assert_eq!(s.reg(1), i64::MAX as u64);
        exec_fp_to_int(&mut s, false, FpType::Double, 1, 0, false, FpRounding::Zero);
        assert_eq!(s.reg(1), i32::MAX as u64);
        s.set_vreg_scalar(0, 64, f64::INFINITY.to_bits());
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, true, FpRounding::Zero);
        assert_eq!(s.reg(1), u64::MAX);
        s.set_vreg_scalar(0, 64, f64::NAN.to_bits());
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, false, FpRounding::Zero);
        assert_eq!(s.reg(1), 0);
    }

    #[test]
    fn test_fcvtzs_truncates_toward_zero() {
        let mut s = state_with_d(0, -3.7);
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, false, FpRounding::Zero);
        assert_eq!(s.reg(1) as i64, -3);
    }

    #[test]
    fn test_fcvtas_ties_away() {
        let mut s = state_with_d(0, 2.5);
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, false, FpRounding::TieAway);
        assert_eq!(s.reg(1), 3);
        s.set_vreg_scalar(0, 64, (-2.5f64).to_bits());
        exec_fp_to_int(&mut s, true, FpType::Double, 1, 0, false, FpRounding::TieAway);
        assert_eq!(s.reg(1) as i64, -3);
    }

    #[test]
    fn test_scvtf_ucvtf() {
        let mut s = CpuState::new();
        s.set_reg(0, -42i64 as u64);
        exec_int_to_fp(&mut s, true, FpType::Double, 1, 0, false);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), -42.0);
        exec_int_to_fp(&mut s, true, FpType::Double, 1, 0, true);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), (u64::MAX - 41) as f64);
        // W form ignores the high word.
        s.set_reg(0, 0xFFFF_FFFF_0000_0007);
        exec_int_to_fp(&mut s, false, FpType::Single, 1, 0, true);
        assert_eq!(f32::from_bits(s.vreg_lane(1, 0, 32) as u32), 7.0);
    }

    #[test]
    fn test_fixed_point_conversions() {
        let mut s = CpuState::new();
        // SCVTF D0, X1, #16: 0x1_0000 / 2^16 = 1.0.
        s.set_reg(1, 0x1_0000);
        exec_fixed_to_fp(&mut s, true, FpType::Double, 0, 1, false, 16);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 1.0);
        // FCVTZS X2, D0, #16 round-trips.
        exec_fp_to_fixed(&mut s, true, FpType::Double, 2, 0, false, 16);
        assert_eq!(s.reg(2), 0x1_0000);
    }

    #[test]
    fn test_frint_modes() {
        let mut s = state_with_d(0, 2.5);
        exec_fp_round(&mut s, FpType::Double, 1, 0, FpRounding::TieEven);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), 2.0);
        exec_fp_round(&mut s, FpType::Double, 1, 0, FpRounding::TieAway);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), 3.0);
        s.set_vreg_scalar(0, 64, (-2.5f64).to_bits());
        exec_fp_round(&mut s, FpType::Double, 1, 0, FpRounding::PosInf);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), -2.0);
        exec_fp_round(&mut s, FpType::Double, 1, 0, FpRounding::NegInf);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), -3.0);
        exec_fp_round(&mut s, FpType::Double, 1, 0, FpRounding::Zero);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), -2.0);
    }

    #[test]
    fn test_fmov_imm() {
        let mut s = CpuState::new();
        exec_fmov_imm(&mut s, FpType::Double, 0, 0x70); // 1.0
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 1.0);
        exec_fmov_imm(&mut s, FpType::Single, 1, 0x80); // -2.0
        assert_eq!(f32::from_bits(s.vreg_lane(1, 0, 32) as u32), -2.0);
    }

    #[test]
    fn test_fmov_gp_round_trip() {
        let mut s = CpuState::new();
        s.set_reg(0, 0x4045_0000_0000_0000); // 42.0 bits
        exec_fmov_from_gp(&mut s, true, 1, 0, false);
        assert_eq!(f64::from_bits(s.vreg_lane(1, 0, 64)), 42.0);
        exec_fmov_to_gp(&mut s, true, 2, 1, false);
        assert_eq!(s.reg(2), 0x4045_0000_0000_0000);
    }

    #[test]
    fn test_fmov_top_half() {
        let mut s = CpuState::new();
        s.set_vreg_scalar(0, 64, 1.0f64.to_bits());
        s.set_reg(1, 0xDEAD);
        exec_fmov_from_gp(&mut s, true, 0, 1, true);
        // Low double preserved, high double written.
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 1.0);
        assert_eq!(s.vreg_lane(0, 1, 64), 0xDEAD);
        exec_fmov_to_gp(&mut s, true, 2, 0, true);
        assert_eq!(s.reg(2), 0xDEAD);
    }

    #[test]
    fn test_simd_load_store_q() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        s.set_vreg(0, 0x0011_2233_4455_6677_8899_AABB_CCDD_EEFF);
        s.set_reg(0, 0x100);
        exec_simd_store_imm(&mut s, &mut m, 0, 0, 0, 4, AddrMode::Offset);
        exec_simd_load_imm(&mut s, &m, 1, 0, 0, 4, AddrMode::Offset);
        assert_eq!(s.vreg(1), 0x0011_2233_4455_6677_8899_AABB_CCDD_EEFF);
    }

    #[test]
    fn test_simd_narrow_load_zeroes_register() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        m.write_u32(0x100, 0xDEAD_BEEF).unwrap();
        s.set_vreg(1, u128::MAX);
        s.set_reg(0, 0x100);
        // LDR S1, [X0]: loads 32 bits, clears the rest.
        exec_simd_load_imm(&mut s, &m, 1, 0, 0, 2, AddrMode::Offset);
        assert_eq!(s.vreg(1), 0xDEAD_BEEF);
    }

    #[test]
    fn test_simd_pair_round_trip() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        s.set_vreg(0, 0x1111);
        s.set_vreg(1, 0x2222);
        s.set_reg(2, 0x200);
        exec_simd_pair(&mut s, &mut m, false, 0, 1, 2, 0, 4, AddrMode::Offset);
        exec_simd_pair(&mut s, &mut m, true, 3, 4, 2, 0, 4, AddrMode::Offset);
        assert_eq!(s.vreg(3), 0x1111);
        assert_eq!(s.vreg(4), 0x2222);
    }
}
