// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Vector (Advanced SIMD) instruction handlers.
//!
//! Every operation computes its element size and lane count, stages
//! results in a local array, and only then writes the destination, so the
//! read-before-write rule holds when the destination aliases a source.
//! Operations on a 64-bit (Q=0) vector zero the upper half of the
//! destination register.

use super::StepResult;
use crate::bits::adv_simd_expand_imm;
use crate::memory::MemoryWindow;
use crate::state::CpuState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Element size in bits from the 2-bit size field.
#[inline]
fn esize_from_size(size: u32) -> u32 {
    8 << size
}

#[inline]
fn lane_count(q: bool, esize: u32) -> u32 {
    if q {
        128 / esize
    } else {
        64 / esize
    }
}

/// Mask a lane value to `esize` bits.
#[inline]
fn mask(val: u64, esize: u32) -> u64 {
    if esize >= 64 {
        val
    } else {
        val & ((1u64 << esize) - 1)
    }
}

#[inline]
fn all_ones(esize: u32) -> u64 {
    mask(u64::MAX, esize)
}

/// Sign-extend a lane value from `esize` bits.
#[inline]
fn sext(val: u64, esize: u32) -> i64 {
    if esize >= 64 {
        val as i64
    } else {
        let shift = 64 - esize;
        ((val << shift) as i64) >> shift
    }
}

/// Write staged lane results, zeroing the rest of the register.
fn write_lanes(state: &mut CpuState, rd: u32, q: bool, esize: u32, results: &[u64]) {
    state.set_vreg(rd, 0);
    for (i, &val) in results.iter().take(lane_count(q, esize) as usize).enumerate() {
        state.set_vreg_lane(rd, i as u32, esize, val);
    }
}

/// Lane-wise binary operation.
fn for_each_lane<F>(state: &mut CpuState, q: bool, esize: u32, rd: u32, rn: u32, rm: u32, f: F)
where
    F: Fn(u64, u64) -> u64,
{
    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];
    for i in 0..lanes {
        let a = state.vreg_lane(rn, i, esize);
        let b = state.vreg_lane(rm, i, esize);
        results[i as usize] = mask(f(a, b), esize);
    }
    write_lanes(state, rd, q, esize, &results);
}

/// Lane-wise binary operation that also reads the destination
/// (multiply-accumulate and friends).
fn for_each_lane_acc<F>(state: &mut CpuState, q: bool, esize: u32, rd: u32, rn: u32, rm: u32, f: F)
where
    F: Fn(u64, u64, u64) -> u64,
{
    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];
    for i in 0..lanes {
        let a = state.vreg_lane(rn, i, esize);
        let b = state.vreg_lane(rm, i, esize);
        let d = state.vreg_lane(rd, i, esize);
        results[i as usize] = mask(f(a, b, d), esize);
    }
    write_lanes(state, rd, q, esize, &results);
}

/// Lane-wise unary operation.
fn for_each_lane_unary<F>(state: &mut CpuState, q: bool, esize: u32, rd: u32, rn: u32, f: F)
where
    F: Fn(u64) -> u64,
{
    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];
    for i in 0..lanes {
        results[i as usize] = mask(f(state.vreg_lane(rn, i, esize)), esize);
    }
    write_lanes(state, rd, q, esize, &results);
}

/// Pairwise operation: low half from Vn pairs, high half from Vm pairs.
fn for_each_pair<F>(state: &mut CpuState, q: bool, esize: u32, rd: u32, rn: u32, rm: u32, f: F)
where
    F: Fn(u64, u64) -> u64,
{
    let lanes = lane_count(q, esize);
    let pairs = lanes / 2;
    let mut results = [0u64; 16];
    for i in 0..pairs {
        let a = state.vreg_lane(rn, i * 2, esize);
        let b = state.vreg_lane(rn, i * 2 + 1, esize);
        results[i as usize] = mask(f(a, b), esize);
    }
    for i in 0..pairs {
        let a = state.vreg_lane(rm, i * 2, esize);
        let b = state.vreg_lane(rm, i * 2 + 1, esize);
        results[(pairs + i) as usize] = mask(f(a, b), esize);
    }
    write_lanes(state, rd, q, esize, &results);
}

/// Decode imm5 into (esize, lane index).
fn decode_imm5(imm5: u32) -> (u32, u32) {
    if imm5 & 1 != 0 {
        (8, imm5 >> 1)
    } else if imm5 & 2 != 0 {
        (16, imm5 >> 2)
    } else if imm5 & 4 != 0 {
        (32, imm5 >> 3)
    } else {
        (64, imm5 >> 4)
    }
}

fn unhandled(what: &'static str, value: u64) -> StepResult {
    StepResult::Fatal { msg: what, value }
}

// ---------------------------------------------------------------------------
// Copy group: DUP, INS, UMOV, SMOV
// ---------------------------------------------------------------------------

pub fn exec_dup_element(state: &mut CpuState, q: bool, rd: u32, rn: u32, imm5: u32) -> StepResult {
    let (esize, index) = decode_imm5(imm5);
    let val = state.vreg_lane(rn, index, esize);
    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];
    results[..lanes as usize].fill(val);
    write_lanes(state, rd, q, esize, &results);
    StepResult::Continue
}

pub fn exec_dup_general(state: &mut CpuState, q: bool, rd: u32, rn: u32, imm5: u32) -> StepResult {
    let (esize, _) = decode_imm5(imm5);
    let val = mask(state.reg(rn), esize);
    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];
    results[..lanes as usize].fill(val);
    write_lanes(state, rd, q, esize, &results);
    StepResult::Continue
}

pub fn exec_ins_general(state: &mut CpuState, rd: u32, rn: u32, imm5: u32) -> StepResult {
    let (esize, index) = decode_imm5(imm5);
    let val = mask(state.reg(rn), esize);
    state.set_vreg_lane(rd, index, esize, val);
    StepResult::Continue
}

pub fn exec_ins_element(
    state: &mut CpuState,
    rd: u32,
    rn: u32,
    imm5: u32,
    imm4: u32,
) -> StepResult {
    if imm5 == 0 {
        return unhandled("unhandled INS encoding", imm5 as u64);
    }
    let (esize, dst_index) = decode_imm5(imm5);
    let src_index = imm4 >> imm5.trailing_zeros();
    let val = state.vreg_lane(rn, src_index, esize);
    state.set_vreg_lane(rd, dst_index, esize, val);
    StepResult::Continue
}

pub fn exec_umov(state: &mut CpuState, q: bool, rd: u32, rn: u32, imm5: u32) -> StepResult {
    let (esize, index) = decode_imm5(imm5);
    // The X form exists only for 64-bit elements.
    if (esize == 64) != q {
        return unhandled("unhandled UMOV size", imm5 as u64);
    }
    let val = state.vreg_lane(rn, index, esize);
    state.set_reg(rd, val);
    StepResult::Continue
}

pub fn exec_smov(state: &mut CpuState, q: bool, rd: u32, rn: u32, imm5: u32) -> StepResult {
    let (esize, index) = decode_imm5(imm5);
    let val = sext(state.vreg_lane(rn, index, esize), esize) as u64;
    state.set_reg(rd, if q { val } else { val & 0xFFFF_FFFF });
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Three same
// ---------------------------------------------------------------------------

pub fn exec_vec_three_same(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    // Bitwise group: the size field selects the operation.
    if opcode == 0b00011 {
        let a = state.vreg(rn);
        let b = state.vreg(rm);
        let d = state.vreg(rd);
        let result = if !u {
            match size {
                0 => a & b,  // AND
                1 => a & !b, // BIC
                2 => a | b,  // ORR (and MOV when n == m)
                _ => a | !b, // ORN
            }
        } else {
            match size {
                0 => a ^ b,                 // EOR
                1 => (d & a) | (!d & b),    // BSL: destination selects
                2 => (a & b) | (!b & d),    // BIT: Vm selects inserts
                _ => (a & !b) | (d & b),    // BIF
            }
        };
        let q_mask = if q { u128::MAX } else { u64::MAX as u128 };
        state.set_vreg(rd, result & q_mask);
        return StepResult::Continue;
    }

    // FP group: element width from size<0>, operation from size<1>.
    if opcode >= 0b11000 {
        return exec_vec_three_same_fp(state, q, u, size, opcode, rd, rn, rm);
    }

    let esize = esize_from_size(size);
    match (u, opcode) {
        (false, 0b00001) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            let sum = sext(a, esize).saturating_add(sext(b, esize));
            saturate_signed(sum, esize)
        }),
        (true, 0b00001) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            let sum = a.wrapping_add(b);
            if mask(sum, esize) < a || sum > all_ones(esize) {
                all_ones(esize)
            } else {
                sum
            }
        }),
        (false, 0b00101) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            let diff = sext(a, esize).saturating_sub(sext(b, esize));
            saturate_signed(diff, esize)
        }),
        (true, 0b00101) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.saturating_sub(b))
        }
        (false, 0b00110) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            if sext(a, esize) > sext(b, esize) { all_ones(esize) } else { 0 }
        }),
        (true, 0b00110) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| if a > b { all_ones(esize) } else { 0 })
        }
        (false, 0b00111) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            if sext(a, esize) >= sext(b, esize) { all_ones(esize) } else { 0 }
        }),
        (true, 0b00111) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| if a >= b { all_ones(esize) } else { 0 })
        }
        // SSHL/USHL: shift by the signed low byte of each Vm lane;
        // negative amounts shift right.
        (false, 0b01000) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            let amount = (b as u8) as i8 as i64;
            if amount >= 0 {
                if amount >= esize as i64 { 0 } else { a << amount }
            } else {
                let sh = -amount as u32;
                if sh >= esize {
                    (sext(a, esize) >> (esize - 1)) as u64
                } else {
                    (sext(a, esize) >> sh) as u64
                }
            }
        }),
        (true, 0b01000) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            let amount = (b as u8) as i8 as i64;
            if amount >= 0 {
                if amount >= esize as i64 { 0 } else { a << amount }
            } else {
                let sh = -amount as u32;
                if sh >= esize { 0 } else { a >> sh }
            }
        }),
        (false, 0b01100) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            if sext(a, esize) > sext(b, esize) { a } else { b }
        }),
        (true, 0b01100) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.max(b)),
        (false, 0b01101) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            if sext(a, esize) < sext(b, esize) { a } else { b }
        }),
        (true, 0b01101) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.min(b)),
        (false, 0b01110) => for_each_lane(state, q, esize, rd, rn, rm, |a, b| {
            sext(a, esize).wrapping_sub(sext(b, esize)).unsigned_abs()
        }),
        (true, 0b01110) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.abs_diff(b))
        }
        (false, 0b10000) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.wrapping_add(b))
        }
        (true, 0b10000) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.wrapping_sub(b))
        }
        (false, 0b10001) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| if a & b != 0 { all_ones(esize) } else { 0 })
        }
        (true, 0b10001) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| if a == b { all_ones(esize) } else { 0 })
        }
        (false, 0b10010) => for_each_lane_acc(state, q, esize, rd, rn, rm, |a, b, d| {
            d.wrapping_add(a.wrapping_mul(b))
        }),
        (true, 0b10010) => for_each_lane_acc(state, q, esize, rd, rn, rm, |a, b, d| {
            d.wrapping_sub(a.wrapping_mul(b))
        }),
        (false, 0b10011) => {
            for_each_lane(state, q, esize, rd, rn, rm, |a, b| a.wrapping_mul(b))
        }
        (false, 0b10100) => for_each_pair(state, q, esize, rd, rn, rm, |a, b| {
            if sext(a, esize) > sext(b, esize) { a } else { b }
        }),
        (true, 0b10100) => for_each_pair(state, q, esize, rd, rn, rm, |a, b| a.max(b)),
        (false, 0b10101) => for_each_pair(state, q, esize, rd, rn, rm, |a, b| {
            if sext(a, esize) < sext(b, esize) { a } else { b }
        }),
        (true, 0b10101) => for_each_pair(state, q, esize, rd, rn, rm, |a, b| a.min(b)),
        (false, 0b10111) => {
            for_each_pair(state, q, esize, rd, rn, rm, |a, b| a.wrapping_add(b))
        }
        _ => return unhandled("unhandled vector three-same opcode", opcode as u64),
    }
    StepResult::Continue
}

/// Clamp a signed wide value into `esize` bits.
fn saturate_signed(val: i64, esize: u32) -> u64 {
    if esize >= 64 {
        return val as u64;
    }
    let max = (1i64 << (esize - 1)) - 1;
    let min = -(1i64 << (esize - 1));
    val.clamp(min, max) as u64
}

fn exec_vec_three_same_fp(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    let double = size & 1 != 0;
    let sel = size >> 1; // high size bit picks the operation variant
    let esize = if double { 64 } else { 32 };

    // FADDP (vector) is pairwise, not lane-wise.
    if u && sel == 0 && opcode == 0b11010 {
        return exec_vec_faddp(state, q, double, rd, rn, rm);
    }

    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];

    for i in 0..lanes {
        let a_bits = state.vreg_lane(rn, i, esize);
        let b_bits = state.vreg_lane(rm, i, esize);
        let d_bits = state.vreg_lane(rd, i, esize);

        let out = if double {
            let a = f64::from_bits(a_bits);
            let b = f64::from_bits(b_bits);
            let d = f64::from_bits(d_bits);
            match (u, sel, opcode) {
                (false, 0, 0b11000) => fmaxnm(a, b).to_bits(),
                (false, 1, 0b11000) => fminnm(a, b).to_bits(),
                (false, 0, 0b11001) => a.mul_add(b, d).to_bits(),
                (false, 1, 0b11001) => (-a).mul_add(b, d).to_bits(),
                (false, 0, 0b11010) => (a + b).to_bits(),
                (false, 1, 0b11010) => (a - b).to_bits(),
                (true, 1, 0b11010) => (a - b).abs().to_bits(),
                (true, 0, 0b11011) => (a * b).to_bits(),
                (false, 0, 0b11100) => bool_lane64(a == b),
                (true, 0, 0b11100) => bool_lane64(a >= b),
                (true, 1, 0b11100) => bool_lane64(a > b),
                (true, 0, 0b11101) => bool_lane64(a.abs() >= b.abs()),
                (true, 1, 0b11101) => bool_lane64(a.abs() > b.abs()),
                (false, 0, 0b11110) => a.max(b).to_bits(),
                (false, 1, 0b11110) => a.min(b).to_bits(),
                (true, 0, 0b11111) => (a / b).to_bits(),
                _ => return unhandled("unhandled vector FP opcode", opcode as u64),
            }
        } else {
            let a = f32::from_bits(a_bits as u32);
            let b = f32::from_bits(b_bits as u32);
            let d = f32::from_bits(d_bits as u32);
            (match (u, sel, opcode) {
                (false, 0, 0b11000) => fmaxnm32(a, b).to_bits(),
                (false, 1, 0b11000) => fminnm32(a, b).to_bits(),
                (false, 0, 0b11001) => a.mul_add(b, d).to_bits(),
                (false, 1, 0b11001) => (-a).mul_add(b, d).to_bits(),
                (false, 0, 0b11010) => (a + b).to_bits(),
                (false, 1, 0b11010) => (a - b).to_bits(),
                (true, 1, 0b11010) => (a - b).abs().to_bits(),
                (true, 0, 0b11011) => (a * b).to_bits(),
                (false, 0, 0b11100) => bool_lane32(a == b),
                (true, 0, 0b11100) => bool_lane32(a >= b),
                (true, 1, 0b11100) => bool_lane32(a > b),
                (true, 0, 0b11101) => bool_lane32(a.abs() >= b.abs()),
                (true, 1, 0b11101) => bool_lane32(a.abs() > b.abs()),
                (false, 0, 0b11110) => a.max(b).to_bits(),
                (false, 1, 0b11110) => a.min(b).to_bits(),
                (true, 0, 0b11111) => (a / b).to_bits(),
                _ => return unhandled("unhandled vector FP opcode", opcode as u64),
            }) as u64
        };
        results[i as usize] = out;
    }

    write_lanes(state, rd, q, esize, &results);
    StepResult::Continue
}

#[inline]
fn bool_lane64(cond: bool) -> u64 {
    if cond { u64::MAX } else { 0 }
}

#[inline]
fn bool_lane32(cond: bool) -> u32 {
    if cond { u32::MAX } else { 0 }
}

fn fmaxnm(a: f64, b: f64) -> f64 {
    if a.is_nan() { b } else if b.is_nan() { a } else { a.max(b) }
}

fn fminnm(a: f64, b: f64) -> f64 {
    if a.is_nan() { b } else if b.is_nan() { a } else { a.min(b) }
}

fn fmaxnm32(a: f32, b: f32) -> f32 {
    if a.is_nan() { b } else if b.is_nan() { a } else { a.max(b) }
}

fn fminnm32(a: f32, b: f32) -> f32 {
    if a.is_nan() { b } else if b.is_nan() { a } else { a.min(b) }
}

/// FADDP (vector): pairwise FP add across the Vn:Vm concatenation.
fn exec_vec_faddp(
    state: &mut CpuState,
    q: bool,
    double: bool,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    let esize = if double { 64 } else { 32 };
    for_each_pair(state, q, esize, rd, rn, rm, |a, b| {
        if double {
            (f64::from_bits(a) + f64::from_bits(b)).to_bits()
        } else {
            (f32::from_bits(a as u32) + f32::from_bits(b as u32)).to_bits() as u64
        }
    });
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Two-register misc
// ---------------------------------------------------------------------------

pub fn exec_vec_two_reg(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
) -> StepResult {
    let esize = esize_from_size(size);

    // FP forms: element width from size<0>, group from size<1>.
    if opcode >= 0b11010 || (opcode >= 0b01100 && opcode <= 0b01111 && size >= 2) {
        return exec_vec_two_reg_fp(state, q, u, size, opcode, rd, rn);
    }

    match (u, opcode) {
        // REV64: reverse elements within each 64-bit doubleword.
        (false, 0b00000) => {
            let groups = if q { 2 } else { 1 };
            let per = 64 / esize;
            let mut results = [0u64; 16];
            for g in 0..groups {
                for i in 0..per {
                    results[(g * per + (per - 1 - i)) as usize] =
                        state.vreg_lane(rn, g * per + i, esize);
                }
            }
            write_lanes(state, rd, q, esize, &results);
        }
        // REV32: reverse elements within each word.
        (true, 0b00000) => {
            let groups = if q { 4 } else { 2 };
            let per = 32 / esize;
            let mut results = [0u64; 16];
            for g in 0..groups {
                for i in 0..per {
                    results[(g * per + (per - 1 - i)) as usize] =
                        state.vreg_lane(rn, g * per + i, esize);
                }
            }
            write_lanes(state, rd, q, esize, &results);
        }
        // REV16: byte swap within halfwords.
        (false, 0b00001) => {
            for_each_lane_unary(state, q, 16, rd, rn, |v| ((v & 0xFF) << 8) | (v >> 8));
        }
        (false, 0b00101) if size == 0 => {
            for_each_lane_unary(state, q, 8, rd, rn, |v| v.count_ones() as u64);
        }
        (true, 0b00101) if size == 0 => {
            let v = state.vreg(rn);
            let q_mask = if q { u128::MAX } else { u64::MAX as u128 };
            state.set_vreg(rd, !v & q_mask);
        }
        (true, 0b00101) if size == 1 => {
            for_each_lane_unary(state, q, 8, rd, rn, |v| (v as u8).reverse_bits() as u64);
        }
        (false, 0b01000) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| {
                if sext(v, esize) > 0 { all_ones(esize) } else { 0 }
            });
        }
        (false, 0b01001) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| {
                if v == 0 { all_ones(esize) } else { 0 }
            });
        }
        (false, 0b01010) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| {
                if sext(v, esize) < 0 { all_ones(esize) } else { 0 }
            });
        }
        (true, 0b01000) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| {
                if sext(v, esize) >= 0 { all_ones(esize) } else { 0 }
            });
        }
        (true, 0b01001) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| {
                if sext(v, esize) <= 0 { all_ones(esize) } else { 0 }
            });
        }
        (false, 0b01011) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| sext(v, esize).unsigned_abs());
        }
        (true, 0b01011) => {
            for_each_lane_unary(state, q, esize, rd, rn, |v| 0u64.wrapping_sub(v));
        }
        // XTN/XTN2: narrow each double-width element.
        (false, 0b10010) => {
            let dst_esize = esize;
            let src_esize = esize * 2;
            let src_lanes = 64 / dst_esize;
            let mut results = [0u64; 8];
            for i in 0..src_lanes {
                results[i as usize] = mask(state.vreg_lane(rn, i, src_esize), dst_esize);
            }
            if q {
                // XTN2 fills the upper half, keeping the lower.
                for i in 0..src_lanes {
                    state.set_vreg_lane(rd, src_lanes + i, dst_esize, results[i as usize]);
                }
            } else {
                state.set_vreg(rd, 0);
                for i in 0..src_lanes {
                    state.set_vreg_lane(rd, i, dst_esize, results[i as usize]);
                }
            }
        }
        _ => return unhandled("unhandled vector two-reg opcode", opcode as u64),
    }
    StepResult::Continue
}

fn exec_vec_two_reg_fp(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
) -> StepResult {
    let double = size & 1 != 0;
    let sel = size >> 1;
    let esize = if double { 64 } else { 32 };

    let op64: fn(f64) -> u64 = match (u, sel, opcode) {
        (false, 1, 0b01100) => |v| bool_lane64(v > 0.0),  // FCMGT #0
        (false, 1, 0b01101) => |v| bool_lane64(v == 0.0), // FCMEQ #0
        (false, 1, 0b01110) => |v| bool_lane64(v < 0.0),  // FCMLT #0
        (true, 1, 0b01100) => |v| bool_lane64(v >= 0.0),  // FCMGE #0
        (true, 1, 0b01101) => |v| bool_lane64(v <= 0.0),  // FCMLE #0
        (false, 1, 0b01111) => |v| v.abs().to_bits(),     // FABS
        (true, 1, 0b01111) => |v| (-v).to_bits(),         // FNEG
        (false, 1, 0b11011) => |v| v as i64 as u64,       // FCVTZS
        (true, 1, 0b11011) => |v| v as u64,               // FCVTZU
        (true, 1, 0b11111) => |v| v.sqrt().to_bits(),     // FSQRT
        (false, 0, 0b11101) => |v| v.to_bits(),           // SCVTF (input converted below)
        (true, 0, 0b11101) => |v| v.to_bits(),            // UCVTF
        _ => return unhandled("unhandled vector FP two-reg opcode", opcode as u64),
    };

    let is_cvtf = opcode == 0b11101 && sel == 0;
    let lanes = lane_count(q, esize);
    let mut results = [0u64; 16];
    for i in 0..lanes {
        let raw = state.vreg_lane(rn, i, esize);
        results[i as usize] = if double {
            let v = if is_cvtf {
                if u { raw as f64 } else { raw as i64 as f64 }
            } else {
                f64::from_bits(raw)
            };
            op64(v)
        } else {
            let v32 = raw as u32;
            // Run the f32 lanes through the same f64 ops where exact,
            // with width-correct conversion at the edges.
            match (u, sel, opcode) {
                (false, 1, 0b01111) => f32::from_bits(v32).abs().to_bits() as u64,
                (true, 1, 0b01111) => (-f32::from_bits(v32)).to_bits() as u64,
                (true, 1, 0b11111) => f32::from_bits(v32).sqrt().to_bits() as u64,
                (false, 1, 0b11011) => (f32::from_bits(v32) as i32) as u32 as u64,
                (true, 1, 0b11011) => (f32::from_bits(v32) as u32) as u64,
                (false, 0, 0b11101) => ((v32 as i32) as f32).to_bits() as u64,
                (true, 0, 0b11101) => (v32 as f32).to_bits() as u64,
                _ => {
                    let v = f32::from_bits(v32) as f64;
                    mask(op64(v), 32)
                }
            }
        };
    }
    write_lanes(state, rd, q, esize, &results);
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Across lanes
// ---------------------------------------------------------------------------

pub fn exec_vec_across(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
) -> StepResult {
    let esize = esize_from_size(size);
    let lanes = lane_count(q, esize);

    let result = match (u, opcode) {
        // ADDV: horizontal sum into a scalar of the element size.
        (false, 0b11011) => {
            let mut sum = 0u64;
            for i in 0..lanes {
                sum = sum.wrapping_add(state.vreg_lane(rn, i, esize));
            }
            state.set_vreg_scalar(rd, esize, mask(sum, esize));
            return StepResult::Continue;
        }
        // SADDLV / UADDLV: widening horizontal sum.
        (false, 0b00011) | (true, 0b00011) => {
            let mut sum = 0u64;
            for i in 0..lanes {
                let v = state.vreg_lane(rn, i, esize);
                let widened = if u { v } else { sext(v, esize) as u64 };
                sum = sum.wrapping_add(widened);
            }
            state.set_vreg_scalar(rd, esize * 2, mask(sum, esize * 2));
            return StepResult::Continue;
        }
        (false, 0b01010) => {
            (0..lanes).map(|i| state.vreg_lane(rn, i, esize)).max_by_key(|&v| sext(v, esize))
        }
        (false, 0b11010) => {
            (0..lanes).map(|i| state.vreg_lane(rn, i, esize)).min_by_key(|&v| sext(v, esize))
        }
        (true, 0b01010) => (0..lanes).map(|i| state.vreg_lane(rn, i, esize)).max(),
        (true, 0b11010) => (0..lanes).map(|i| state.vreg_lane(rn, i, esize)).min(),
        _ => return unhandled("unhandled across-lanes opcode", opcode as u64),
    };
    state.set_vreg_scalar(rd, esize, result.unwrap_or(0));
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Three different (widening)
// ---------------------------------------------------------------------------

pub fn exec_vec_three_diff(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    let src_esize = esize_from_size(size);
    if src_esize == 64 {
        return unhandled("unhandled three-diff size", size as u64);
    }
    let dst_esize = src_esize * 2;
    let src_lanes = 64 / src_esize;
    // The "2" forms (q set) read the upper halves of the sources.
    let src_off = if q { src_lanes } else { 0 };

    let widen = |v: u64| -> u64 {
        if u {
            v
        } else {
            sext(v, src_esize) as u64
        }
    };

    let mut results = [0u64; 8];
    for i in 0..src_lanes {
        let a = widen(state.vreg_lane(rn, src_off + i, src_esize));
        let b = widen(state.vreg_lane(rm, src_off + i, src_esize));
        results[i as usize] = match opcode {
            0b0000 => a.wrapping_add(b),
            0b0010 => a.wrapping_sub(b),
            // SADDW/UADDW: the Vn operand is already wide.
            0b0001 => state.vreg_lane(rn, i, dst_esize).wrapping_add(b),
            0b1100 => a.wrapping_mul(b),
            _ => return unhandled("unhandled three-diff opcode", opcode as u64),
        };
    }

    state.set_vreg(rd, 0);
    for i in 0..src_lanes {
        state.set_vreg_lane(rd, i, dst_esize, mask(results[i as usize], dst_esize));
    }
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Modified immediate
// ---------------------------------------------------------------------------

pub fn exec_vec_mod_imm(
    state: &mut CpuState,
    q: bool,
    op: u32,
    cmode: u32,
    rd: u32,
    imm8: u32,
) -> StepResult {
    let imm64 = adv_simd_expand_imm(op, cmode, imm8);
    let with_logic = cmode & 1 == 1 && cmode >> 2 != 0b11;

    if with_logic {
        // ORR (op 0) / BIC (op 1) merge into the existing register.
        let [lo, hi] = state.v[rd as usize];
        let (new_lo, new_hi) = if op == 0 {
            (lo | imm64, hi | imm64)
        } else {
            (lo & !imm64, hi & !imm64)
        };
        state.v[rd as usize][0] = new_lo;
        if q {
            state.v[rd as usize][1] = new_hi;
        }
        return StepResult::Continue;
    }

    // MOVI / MVNI / FMOV (vector immediate) replace the register.
    let value = if op == 1 && cmode != 0b1110 && cmode != 0b1111 {
        !imm64
    } else {
        imm64
    };
    state.v[rd as usize] = [value, if q { value } else { 0 }];
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Shift by immediate
// ---------------------------------------------------------------------------

/// Element size from immh (highest set bit).
fn shift_esize(immh: u32) -> u32 {
    if immh & 0b1000 != 0 {
        64
    } else if immh & 0b0100 != 0 {
        32
    } else if immh & 0b0010 != 0 {
        16
    } else {
        8
    }
}

pub fn exec_vec_shift_imm(
    state: &mut CpuState,
    q: bool,
    u: bool,
    immh: u32,
    immb: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
) -> StepResult {
    let esize = shift_esize(immh);
    let immhb = (immh << 3) | immb;

    match (u, opcode) {
        // SSHR / USHR: shift = 2*esize - immhb.
        (false, 0b00000) => {
            let shift = (esize * 2 - immhb).min(63);
            for_each_lane_unary(state, q, esize, rd, rn, |v| (sext(v, esize) >> shift) as u64);
        }
        (true, 0b00000) => {
            let shift = esize * 2 - immhb;
            for_each_lane_unary(state, q, esize, rd, rn, |v| {
                if shift >= esize { 0 } else { v >> shift }
            });
        }
        // SSRA / USRA: shift right, accumulate into the destination.
        (false, 0b00010) => {
            let shift = (esize * 2 - immhb).min(63);
            for_each_lane_acc(state, q, esize, rd, rn, rn, |a, _, d| {
                d.wrapping_add((sext(a, esize) >> shift) as u64)
            });
        }
        (true, 0b00010) => {
            let shift = esize * 2 - immhb;
            for_each_lane_acc(state, q, esize, rd, rn, rn, |a, _, d| {
                d.wrapping_add(if shift >= esize { 0 } else { a >> shift })
            });
        }
        // SHL.
        (false, 0b01010) => {
            let shift = immhb - esize;
            for_each_lane_unary(state, q, esize, rd, rn, |v| v << shift);
        }
        // SLI: shift left, insert under a mask.
        (true, 0b01010) => {
            let shift = immhb - esize;
            let keep = mask(!(all_ones(esize) << shift), esize);
            for_each_lane_acc(state, q, esize, rd, rn, rn, |a, _, d| {
                (d & keep) | mask(a << shift, esize)
            });
        }
        // SSHLL/USHLL (and the 2 forms): widen then shift left.
        (false, 0b10100) | (true, 0b10100) => {
            let shift = immhb - esize;
            let dst_esize = esize * 2;
            if dst_esize > 64 {
                return unhandled("unhandled shift-imm size", immh as u64);
            }
            let src_lanes = 64 / esize;
            let src_off = if q { src_lanes } else { 0 };
            let mut results = [0u64; 8];
            for i in 0..src_lanes {
                let v = state.vreg_lane(rn, src_off + i, esize);
                let widened = if u { v } else { sext(v, esize) as u64 };
                results[i as usize] = mask(widened << shift, dst_esize);
            }
            state.set_vreg(rd, 0);
            for i in 0..src_lanes {
                state.set_vreg_lane(rd, i, dst_esize, results[i as usize]);
            }
        }
        // SHRN/SHRN2: narrow with right shift.
        (false, 0b10000) => {
            let shift = esize * 2 - immhb;
            let src_esize = esize * 2;
            if src_esize > 64 {
                return unhandled("unhandled shift-imm size", immh as u64);
            }
            let dst_lanes = 64 / esize;
            let mut results = [0u64; 8];
            for i in 0..dst_lanes {
                let v = state.vreg_lane(rn, i, src_esize);
                results[i as usize] = mask(v >> shift, esize);
            }
            if q {
                for i in 0..dst_lanes {
                    state.set_vreg_lane(rd, dst_lanes + i, esize, results[i as usize]);
                }
            } else {
                state.set_vreg(rd, 0);
                for i in 0..dst_lanes {
                    state.set_vreg_lane(rd, i, esize, results[i as usize]);
                }
            }
        }
        _ => return unhandled("unhandled shift-imm opcode", opcode as u64),
    }
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Permute and extract
// ---------------------------------------------------------------------------

pub fn exec_vec_permute(
    state: &mut CpuState,
    q: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    let esize = esize_from_size(size);
    let lanes = lane_count(q, esize);
    let half = lanes / 2;

    let mut n_vals = [0u64; 16];
    let mut m_vals = [0u64; 16];
    for i in 0..lanes {
        n_vals[i as usize] = state.vreg_lane(rn, i, esize);
        m_vals[i as usize] = state.vreg_lane(rm, i, esize);
    }

    let mut results = [0u64; 16];
    match opcode {
        // UZP1/UZP2: even (odd) elements of Vn then Vm.
        0b001 | 0b101 => {
            let odd = (opcode >> 2) as usize;
            for i in 0..half as usize {
                results[i] = n_vals[2 * i + odd];
                results[half as usize + i] = m_vals[2 * i + odd];
            }
        }
        // TRN1/TRN2: interleave even (odd) elements pairwise.
        0b010 | 0b110 => {
            let odd = (opcode >> 2) as usize;
            for i in 0..half as usize {
                results[2 * i] = n_vals[2 * i + odd];
                results[2 * i + 1] = m_vals[2 * i + odd];
            }
        }
        // ZIP1/ZIP2: interleave the low (high) halves.
        0b011 | 0b111 => {
            let base = if opcode >> 2 != 0 { half as usize } else { 0 };
            for i in 0..half as usize {
                results[2 * i] = n_vals[base + i];
                results[2 * i + 1] = m_vals[base + i];
            }
        }
        _ => return unhandled("unhandled permute opcode", opcode as u64),
    }
    write_lanes(state, rd, q, esize, &results);
    StepResult::Continue
}

pub fn exec_vec_extract(
    state: &mut CpuState,
    q: bool,
    imm4: u32,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    let pos = imm4 as usize;
    if !q && pos >= 8 {
        return unhandled("unhandled EXT position", imm4 as u64);
    }
    let width = if q { 16 } else { 8 };
    let n = state.vreg(rn).to_le_bytes();
    let m = state.vreg(rm).to_le_bytes();

    // Bytes [pos..] of Vn followed by the leading bytes of Vm.
    let mut out = [0u8; 16];
    for i in 0..width {
        out[i] = if pos + i < width {
            n[pos + i]
        } else {
            m[pos + i - width]
        };
    }
    state.set_vreg(rd, u128::from_le_bytes(out));
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Vector x indexed element
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub fn exec_vec_indexed(
    state: &mut CpuState,
    q: bool,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
    rm: u32,
    h: u32,
    l: u32,
    m: u32,
) -> StepResult {
    match opcode {
        // FMLA / FMLS / FMUL by element.
        0b0001 | 0b0101 | 0b1001 => {
            let double = size & 1 != 0;
            let esize = if double { 64 } else { 32 };
            let (index, rm_full) = if double {
                (h, rm)
            } else {
                ((h << 1) | l, (m << 4) | rm)
            };
            let elem = state.vreg_lane(rm_full, index, esize);
            for_each_lane_acc(state, q, esize, rd, rn, rn, |a, _, d| {
                if double {
                    let x = f64::from_bits(a);
                    let e = f64::from_bits(elem);
                    let acc = f64::from_bits(d);
                    match opcode {
                        0b0001 => x.mul_add(e, acc).to_bits(),
                        0b0101 => (-x).mul_add(e, acc).to_bits(),
                        _ => (x * e).to_bits(),
                    }
                } else {
                    let x = f32::from_bits(a as u32);
                    let e = f32::from_bits(elem as u32);
                    let acc = f32::from_bits(d as u32);
                    (match opcode {
                        0b0001 => x.mul_add(e, acc).to_bits(),
                        0b0101 => (-x).mul_add(e, acc).to_bits(),
                        _ => (x * e).to_bits(),
                    }) as u64
                }
            });
            StepResult::Continue
        }
        // MUL by element (integer).
        0b1000 if !u => {
            let esize = esize_from_size(size);
            let (index, rm_full) = if size == 1 {
                ((h << 2) | (l << 1) | m, rm)
            } else {
                ((h << 1) | l, (m << 4) | rm)
            };
            let elem = state.vreg_lane(rm_full, index, esize);
            for_each_lane_unary(state, q, esize, rd, rn, |a| a.wrapping_mul(elem));
            StepResult::Continue
        }
        _ => unhandled("unhandled indexed-element opcode", opcode as u64),
    }
}

// ---------------------------------------------------------------------------
// Table lookup
// ---------------------------------------------------------------------------

pub fn exec_vec_tbl(
    state: &mut CpuState,
    q: bool,
    len: u32,
    ext: bool,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    let regs = len as usize + 1;
    let bytes = if q { 16 } else { 8 };

    let mut table = [0u8; 64];
    for r in 0..regs {
        let reg = (rn as usize + r) % 32;
        table[r * 16..r * 16 + 16].copy_from_slice(&state.vreg(reg as u32).to_le_bytes());
    }

    let indices = state.vreg(rm).to_le_bytes();
    let dest = state.vreg(rd).to_le_bytes();

    let mut out = [0u8; 16];
    for i in 0..bytes {
        let idx = indices[i] as usize;
        out[i] = if idx < regs * 16 {
            table[idx]
        } else if ext {
            dest[i] // TBX keeps the destination byte
        } else {
            0 // TBL zeroes it
        };
    }
    state.set_vreg(rd, u128::from_le_bytes(out));
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Structure loads and stores
// ---------------------------------------------------------------------------

fn read_elem(mem: &MemoryWindow, addr: u64, ebytes: u64) -> Result<u64, u64> {
    match ebytes {
        1 => mem.read_u8(addr).map(u64::from),
        2 => mem.read_u16(addr).map(u64::from),
        4 => mem.read_u32(addr).map(u64::from),
        _ => mem.read_u64(addr),
    }
    .map_err(|_| addr)
}

fn write_elem(mem: &mut MemoryWindow, addr: u64, val: u64, ebytes: u64) -> Result<(), u64> {
    match ebytes {
        1 => mem.write_u8(addr, val as u8),
        2 => mem.write_u16(addr, val as u16),
        4 => mem.write_u32(addr, val as u32),
        _ => mem.write_u64(addr, val),
    }
    .map_err(|_| addr)
}

/// Post-index writeback shared by the structure forms: Rm of 31 means an
/// immediate advance by the bytes transferred.
fn structure_writeback(state: &mut CpuState, rn: u32, rm: Option<u32>, base: u64, total: u64) {
    if let Some(rm) = rm {
        let advance = if rm == 31 { total } else { state.reg(rm) };
        state.set_reg_sp(rn, base.wrapping_add(advance));
    }
}

#[allow(clippy::too_many_arguments)]
pub fn exec_vec_ldst_multi(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    q: bool,
    load: bool,
    opcode: u32,
    size: u32,
    rt: u32,
    rn: u32,
    rm: Option<u32>,
) -> StepResult {
    let esize = esize_from_size(size);
    let ebytes = (esize / 8) as u64;
    let datasize = if q { 128u64 } else { 64 };
    let lanes = (datasize as u32) / esize;

    // opcode encodes register count and whether elements interleave.
    let (nregs, interleave): (u32, bool) = match opcode {
        0b0111 => (1, false),
        0b1010 => (2, false),
        0b0110 => (3, false),
        0b0010 => (4, false),
        0b1000 => (2, true),
        0b0100 => (3, true),
        _ => (4, true), // 0b0000
    };

    let base = state.reg_sp(rn);
    let mut addr = base;

    if interleave {
        // LDn/STn: memory holds structures of n consecutive elements,
        // registers hold one field each.
        for lane in 0..lanes {
            for r in 0..nregs {
                let reg = (rt + r) % 32;
                if load {
                    match read_elem(mem, addr, ebytes) {
                        Ok(v) => state.set_vreg_lane(reg, lane, esize, v),
                        Err(a) => return StepResult::MemoryFault(a),
                    }
                } else {
                    let v = state.vreg_lane(reg, lane, esize);
                    if let Err(a) = write_elem(mem, addr, v, ebytes) {
                        return StepResult::MemoryFault(a);
                    }
                }
                addr = addr.wrapping_add(ebytes);
            }
        }
    } else {
        // LD1/ST1 with 1-4 registers: plain consecutive transfer.
        for r in 0..nregs {
            let reg = (rt + r) % 32;
            for lane in 0..lanes {
                if load {
                    match read_elem(mem, addr, ebytes) {
                        Ok(v) => state.set_vreg_lane(reg, lane, esize, v),
                        Err(a) => return StepResult::MemoryFault(a),
                    }
                } else {
                    let v = state.vreg_lane(reg, lane, esize);
                    if let Err(a) = write_elem(mem, addr, v, ebytes) {
                        return StepResult::MemoryFault(a);
                    }
                }
                addr = addr.wrapping_add(ebytes);
            }
        }
    }

    if load && !q {
        // 64-bit loads clear the upper halves.
        for r in 0..nregs {
            let reg = (rt + r) % 32;
            state.v[reg as usize][1] = 0;
        }
    }

    structure_writeback(state, rn, rm, base, (nregs as u64) * (datasize / 8));
    StepResult::Continue
}

#[allow(clippy::too_many_arguments)]
pub fn exec_vec_ldst_single(
    state: &mut CpuState,
    mem: &mut MemoryWindow,
    q: bool,
    load: bool,
    selem: u32,
    replicate: bool,
    opcode: u32,
    s: u32,
    size: u32,
    rt: u32,
    rn: u32,
    rm: Option<u32>,
) -> StepResult {
    // Element size and lane index come from opcode/size/S/Q.
    let (esize, index) = if replicate {
        (esize_from_size(size), 0)
    } else {
        match opcode >> 1 {
            0b00 => (8, (q as u32) << 3 | s << 2 | size),
            0b01 => (16, (q as u32) << 2 | s << 1 | (size >> 1)),
            _ => {
                if size & 1 == 0 {
                    (32, (q as u32) << 1 | s)
                } else {
                    (64, q as u32)
                }
            }
        }
    };
    let ebytes = (esize / 8) as u64;

    let base = state.reg_sp(rn);
    let mut addr = base;

    for r in 0..selem {
        let reg = (rt + r) % 32;
        if replicate {
            // LDnR: broadcast one element to every lane.
            let val = match read_elem(mem, addr, ebytes) {
                Ok(v) => v,
                Err(a) => return StepResult::MemoryFault(a),
            };
            let lanes = lane_count(q, esize);
            let mut results = [0u64; 16];
            results[..lanes as usize].fill(val);
            write_lanes(state, reg, q, esize, &results);
        } else if load {
            match read_elem(mem, addr, ebytes) {
                Ok(v) => state.set_vreg_lane(reg, index, esize, v),
                Err(a) => return StepResult::MemoryFault(a),
            }
        } else {
            let v = state.vreg_lane(reg, index, esize);
            if let Err(a) = write_elem(mem, addr, v, ebytes) {
                return StepResult::MemoryFault(a);
            }
        }
        addr = addr.wrapping_add(ebytes);
    }

    structure_writeback(state, rn, rm, base, ebytes * selem as u64);
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Scalar (single-element) forms
// ---------------------------------------------------------------------------

pub fn exec_scalar_three_same(
    state: &mut CpuState,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
    rm: u32,
) -> StepResult {
    // FP scalar forms.
    if opcode >= 0b11000 {
        let double = size & 1 != 0;
        let sel = size >> 1;
        let esize = if double { 64 } else { 32 };
        let a_bits = state.vreg_lane(rn, 0, esize);
        let b_bits = state.vreg_lane(rm, 0, esize);
        let result = if double {
            let a = f64::from_bits(a_bits);
            let b = f64::from_bits(b_bits);
            match (u, sel, opcode) {
                (true, 1, 0b11010) => (a - b).abs().to_bits(), // FABD
                (false, 0, 0b11100) => bool_lane64(a == b),
                (true, 0, 0b11100) => bool_lane64(a >= b),
                (true, 1, 0b11100) => bool_lane64(a > b),
                _ => return unhandled("unhandled scalar FP opcode", opcode as u64),
            }
        } else {
            let a = f32::from_bits(a_bits as u32);
            let b = f32::from_bits(b_bits as u32);
            (match (u, sel, opcode) {
                (true, 1, 0b11010) => (a - b).abs().to_bits(),
                (false, 0, 0b11100) => bool_lane32(a == b),
                (true, 0, 0b11100) => bool_lane32(a >= b),
                (true, 1, 0b11100) => bool_lane32(a > b),
                _ => return unhandled("unhandled scalar FP opcode", opcode as u64),
            }) as u64
        };
        state.set_vreg_scalar(rd, esize, result);
        return StepResult::Continue;
    }

    // Integer scalar forms operate on the 64-bit element.
    let a = state.vreg_lane(rn, 0, 64);
    let b = state.vreg_lane(rm, 0, 64);
    let result = match (u, opcode) {
        (false, 0b10000) => a.wrapping_add(b),
        (true, 0b10000) => a.wrapping_sub(b),
        (true, 0b10001) => bool_lane64(a == b),
        (false, 0b00110) => bool_lane64((a as i64) > (b as i64)),
        (true, 0b00110) => bool_lane64(a > b),
        (false, 0b00111) => bool_lane64((a as i64) >= (b as i64)),
        (true, 0b00111) => bool_lane64(a >= b),
        _ => return unhandled("unhandled scalar three-same opcode", opcode as u64),
    };
    state.set_vreg_scalar(rd, 64, result);
    StepResult::Continue
}

pub fn exec_scalar_two_reg(
    state: &mut CpuState,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
) -> StepResult {
    let double = size & 1 != 0;
    let sel = size >> 1;
    let esize = if double { 64 } else { 32 };

    match (u, sel, opcode) {
        // FCVTZS / FCVTZU (scalar, vector-encoded).
        (false, 1, 0b11011) => {
            let raw = state.vreg_lane(rn, 0, esize);
            let result = if double {
                f64::from_bits(raw) as i64 as u64
            } else {
                (f32::from_bits(raw as u32) as i32) as u32 as u64
            };
            state.set_vreg_scalar(rd, esize, result);
        }
        (true, 1, 0b11011) => {
            let raw = state.vreg_lane(rn, 0, esize);
            let result = if double {
                f64::from_bits(raw) as u64
            } else {
                (f32::from_bits(raw as u32) as u32) as u64
            };
            state.set_vreg_scalar(rd, esize, result);
        }
        // SCVTF / UCVTF (scalar, vector-encoded).
        (false, 0, 0b11101) => {
            let raw = state.vreg_lane(rn, 0, esize);
            let bits = if double {
                (raw as i64 as f64).to_bits()
            } else {
                ((raw as u32 as i32) as f32).to_bits() as u64
            };
            state.set_vreg_scalar(rd, esize, bits);
        }
        (true, 0, 0b11101) => {
            let raw = state.vreg_lane(rn, 0, esize);
            let bits = if double {
                (raw as f64).to_bits()
            } else {
                ((raw as u32) as f32).to_bits() as u64
            };
            state.set_vreg_scalar(rd, esize, bits);
        }
        // ABS / NEG (64-bit scalar).
        (false, _, 0b01011) => {
            let v = state.vreg_lane(rn, 0, 64) as i64;
            state.set_vreg_scalar(rd, 64, v.unsigned_abs());
        }
        (true, _, 0b01011) => {
            let v = state.vreg_lane(rn, 0, 64);
            state.set_vreg_scalar(rd, 64, 0u64.wrapping_sub(v));
        }
        _ => return unhandled("unhandled scalar two-reg opcode", opcode as u64),
    }
    StepResult::Continue
}

pub fn exec_scalar_pairwise(
    state: &mut CpuState,
    u: bool,
    size: u32,
    opcode: u32,
    rd: u32,
    rn: u32,
) -> StepResult {
    match (u, opcode) {
        // ADDP (scalar): sum the two 64-bit elements.
        (false, 0b11011) => {
            let sum = state
                .vreg_lane(rn, 0, 64)
                .wrapping_add(state.vreg_lane(rn, 1, 64));
            state.set_vreg_scalar(rd, 64, sum);
        }
        // FADDP (scalar).
        (true, 0b01101) => {
            let double = size & 1 != 0;
            if double {
                let sum = f64::from_bits(state.vreg_lane(rn, 0, 64))
                    + f64::from_bits(state.vreg_lane(rn, 1, 64));
                state.set_vreg_scalar(rd, 64, sum.to_bits());
            } else {
                let sum = f32::from_bits(state.vreg_lane(rn, 0, 32) as u32)
                    + f32::from_bits(state.vreg_lane(rn, 1, 32) as u32);
                state.set_vreg_scalar(rd, 32, sum.to_bits() as u64);
            }
        }
        _ => return unhandled("unhandled scalar pairwise opcode", opcode as u64),
    }
    StepResult::Continue
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn set_lanes(s: &mut CpuState, reg: u32, esize: u32, vals: &[u64]) {
        for (i, &v) in vals.iter().enumerate() {
            s.set_vreg_lane(reg, i as u32, esize, v);
        }
    }

    fn lanes(s: &CpuState, reg: u32, esize: u32, n: u32) -> Vec<u64> {
        (0..n).map(|i| s.vreg_lane(reg, i, esize)).collect()
    }

    #[test]
    fn test_add_sub_4s() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 2, 3, 4]);
        set_lanes(&mut s, 2, 32, &[10, 20, 30, 40]);
        exec_vec_three_same(&mut s, true, false, 2, 0b10000, 0, 1, 2);
        assert_eq!(lanes(&s, 0, 32, 4), vec![11, 22, 33, 44]);
        exec_vec_three_same(&mut s, true, true, 2, 0b10000, 0, 2, 1);
        assert_eq!(lanes(&s, 0, 32, 4), vec![9, 18, 27, 36]);
    }

    #[test]
    fn test_add_8b_zeroes_upper() {
        let mut s = CpuState::new();
        s.set_vreg(0, u128::MAX);
        set_lanes(&mut s, 1, 8, &[1; 8]);
        set_lanes(&mut s, 2, 8, &[2; 8]);
        exec_vec_three_same(&mut s, false, false, 0, 0b10000, 0, 1, 2);
        assert_eq!(s.vreg_lane(0, 0, 8), 3);
        assert_eq!(s.v[0][1], 0);
    }

    #[test]
    fn test_add_self_aliasing() {
        // ADD V0.4S, V0.4S, V0.4S must read before writing.
        let mut s = CpuState::new();
        set_lanes(&mut s, 0, 32, &[5, 6, 7, 8]);
        exec_vec_three_same(&mut s, true, false, 2, 0b10000, 0, 0, 0);
        assert_eq!(lanes(&s, 0, 32, 4), vec![10, 12, 14, 16]);
    }

    #[test]
    fn test_bitwise_ops() {
        let mut s = CpuState::new();
        s.set_vreg(1, 0xFF00_FF00_FF00_FF00_FF00_FF00_FF00_FF00);
        s.set_vreg(2, 0x0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0F);
        exec_vec_three_same(&mut s, true, false, 0, 0b00011, 0, 1, 2); // AND
        assert_eq!(s.vreg(0), 0x0F00_0F00_0F00_0F00_0F00_0F00_0F00_0F00);
        exec_vec_three_same(&mut s, true, false, 2, 0b00011, 0, 1, 2); // ORR
        assert_eq!(s.vreg(0), 0xFF0F_FF0F_FF0F_FF0F_FF0F_FF0F_FF0F_FF0F);
        exec_vec_three_same(&mut s, true, true, 0, 0b00011, 0, 1, 2); // EOR
        assert_eq!(s.vreg(0), 0xF00F_F00F_F00F_F00F_F00F_F00F_F00F_F00F);
        exec_vec_three_same(&mut s, true, false, 1, 0b00011, 0, 1, 2); // BIC
        assert_eq!(s.vreg(0), 0xF000_F000_F000_F000_F000_F000_F000_F000);
    }

    #[test]
    fn test_bsl_uses_dest_as_selector() {
        let mut s = CpuState::new();
        s.set_vreg(0, 0xFFFF_0000_FFFF_0000_FFFF_0000_FFFF_0000); // selector
        s.set_vreg(1, 0x1111_1111_1111_1111_1111_1111_1111_1111);
        s.set_vreg(2, 0x2222_2222_2222_2222_2222_2222_2222_2222);
        exec_vec_three_same(&mut s, true, true, 1, 0b00011, 0, 1, 2);
        assert_eq!(s.vreg(0), 0x1111_2222_1111_2222_1111_2222_1111_2222);
    }

    #[test]
    fn test_cm_compares() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[5, 0xFFFF_FFFF, 7, 7]);
        set_lanes(&mut s, 2, 32, &[5, 0, 8, 6]);
        exec_vec_three_same(&mut s, true, true, 2, 0b10001, 0, 1, 2); // CMEQ
        assert_eq!(lanes(&s, 0, 32, 4), vec![0xFFFF_FFFF, 0, 0, 0]);
        exec_vec_three_same(&mut s, true, true, 2, 0b00111, 0, 1, 2); // CMHS
        assert_eq!(lanes(&s, 0, 32, 4), vec![0xFFFF_FFFF, 0xFFFF_FFFF, 0, 0xFFFF_FFFF]);
        // CMGT is signed: -1 < 0.
        exec_vec_three_same(&mut s, true, false, 2, 0b00110, 0, 1, 2);
        assert_eq!(lanes(&s, 0, 32, 4), vec![0, 0, 0, 0xFFFF_FFFF]);
    }

    #[test]
    fn test_ushl_negative_shifts_right() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[0x100, 0x100, 1, 0x8000_0000]);
        set_lanes(&mut s, 2, 32, &[4, 0xFFFF_FFFC, 31, 0xFFFF_FFE0]); // +4, -4, 31, -32
        exec_vec_three_same(&mut s, true, true, 2, 0b01000, 0, 1, 2);
        assert_eq!(lanes(&s, 0, 32, 4), vec![0x1000, 0x10, 0x8000_0000, 0]);
    }

    #[test]
    fn test_sshl_negative_amount_sign_fills() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[0x8000_0000, 0x8000_0000]);
        set_lanes(&mut s, 2, 32, &[0xFFFF_FFFF, 0xFFFF_FFE0]); // -1, -32
        exec_vec_three_same(&mut s, false, false, 2, 0b01000, 0, 1, 2);
        assert_eq!(s.vreg_lane(0, 0, 32), 0xC000_0000);
        assert_eq!(s.vreg_lane(0, 1, 32), 0xFFFF_FFFF); // drained to sign
    }

    #[test]
    fn test_mla_mls() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 0, 32, &[100, 100, 100, 100]);
        set_lanes(&mut s, 1, 32, &[2, 3, 4, 5]);
        set_lanes(&mut s, 2, 32, &[10, 10, 10, 10]);
        exec_vec_three_same(&mut s, true, false, 2, 0b10010, 0, 1, 2); // MLA
        assert_eq!(lanes(&s, 0, 32, 4), vec![120, 130, 140, 150]);
        exec_vec_three_same(&mut s, true, true, 2, 0b10010, 0, 1, 2); // MLS
        assert_eq!(lanes(&s, 0, 32, 4), vec![100, 100, 100, 100]);
    }

    #[test]
    fn test_addp_umaxp_uminp() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 2, 3, 4]);
        set_lanes(&mut s, 2, 32, &[10, 20, 30, 40]);
        exec_vec_three_same(&mut s, true, false, 2, 0b10111, 0, 1, 2); // ADDP
        assert_eq!(lanes(&s, 0, 32, 4), vec![3, 7, 30, 70]);
        exec_vec_three_same(&mut s, true, true, 2, 0b10100, 0, 1, 2); // UMAXP
        assert_eq!(lanes(&s, 0, 32, 4), vec![2, 4, 20, 40]);
        exec_vec_three_same(&mut s, true, true, 2, 0b10101, 0, 1, 2); // UMINP
        assert_eq!(lanes(&s, 0, 32, 4), vec![1, 3, 10, 30]);
    }

    #[test]
    fn test_fadd_fmul_4s() {
        let mut s = CpuState::new();
        let f = |v: f32| v.to_bits() as u64;
        set_lanes(&mut s, 1, 32, &[f(1.0), f(2.0), f(3.0), f(4.0)]);
        set_lanes(&mut s, 2, 32, &[f(0.5), f(0.5), f(0.5), f(0.5)]);
        // FADD: u=0, size=00, opcode 11010.
        exec_vec_three_same(&mut s, true, false, 0, 0b11010, 0, 1, 2);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 0, 32) as u32), 1.5);
        // FSUB: u=0, size=10 (high bit set).
        exec_vec_three_same(&mut s, true, false, 2, 0b11010, 0, 1, 2);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 3, 32) as u32), 3.5);
        // FMUL: u=1, size=00, opcode 11011.
        exec_vec_three_same(&mut s, true, true, 0, 0b11011, 0, 1, 2);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 1, 32) as u32), 1.0);
        // FDIV: u=1, size=00, opcode 11111.
        exec_vec_three_same(&mut s, true, true, 0, 0b11111, 0, 1, 2);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 2, 32) as u32), 6.0);
    }

    #[test]
    fn test_fmla_2d() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 0, 64, &[10.0f64.to_bits(), 20.0f64.to_bits()]);
        set_lanes(&mut s, 1, 64, &[2.0f64.to_bits(), 3.0f64.to_bits()]);
        set_lanes(&mut s, 2, 64, &[4.0f64.to_bits(), 5.0f64.to_bits()]);
        // FMLA: u=0, size=01, opcode 11001.
        exec_vec_three_same(&mut s, true, false, 1, 0b11001, 0, 1, 2);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 18.0);
        assert_eq!(f64::from_bits(s.vreg_lane(0, 1, 64)), 35.0);
    }

    #[test]
    fn test_faddp_vector() {
        let mut s = CpuState::new();
        let f = |v: f32| v.to_bits() as u64;
        set_lanes(&mut s, 1, 32, &[f(1.0), f(2.0), f(3.0), f(4.0)]);
        set_lanes(&mut s, 2, 32, &[f(10.0), f(20.0), f(30.0), f(40.0)]);
        // FADDP vector: u=1, size=00, opcode 11010.
        exec_vec_three_same(&mut s, true, true, 0, 0b11010, 0, 1, 2);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 0, 32) as u32), 3.0);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 1, 32) as u32), 7.0);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 2, 32) as u32), 30.0);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 3, 32) as u32), 70.0);
    }

    #[test]
    fn test_dup_general_and_addv() {
        // DUP V0.4S, W0 with W0=1, then a horizontal sum.
        let mut s = CpuState::new();
        s.set_reg(0, 1);
        exec_dup_general(&mut s, true, 0, 0, 0b00100);
        assert_eq!(lanes(&s, 0, 32, 4), vec![1, 1, 1, 1]);
        exec_vec_across(&mut s, true, false, 2, 0b11011, 1, 0);
        assert_eq!(s.vreg(1), 4);
    }

    #[test]
    fn test_dup_element() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[10, 20, 30, 40]);
        // imm5 = 01100: esize 32, lane 1.
        exec_dup_element(&mut s, true, 0, 1, 0b01100);
        assert_eq!(lanes(&s, 0, 32, 4), vec![20, 20, 20, 20]);
    }

    #[test]
    fn test_ins_and_umov_smov() {
        let mut s = CpuState::new();
        s.set_reg(0, 0xDEAD_BEEF_CAFE);
        // INS V1.S[2], W0.
        exec_ins_general(&mut s, 1, 0, 0b10100);
        assert_eq!(s.vreg_lane(1, 2, 32), 0xBEEF_CAFE);
        // INS V2.S[0], V1.S[2].
        exec_ins_element(&mut s, 2, 1, 0b00100, 0b1000);
        assert_eq!(s.vreg_lane(2, 0, 32), 0xBEEF_CAFE);
        // UMOV W3, V1.S[2].
        exec_umov(&mut s, false, 3, 1, 0b10100);
        assert_eq!(s.reg(3), 0xBEEF_CAFE);
        // SMOV X4, V1.B[8] with a negative byte.
        s.set_vreg_lane(1, 8, 8, 0x80);
        exec_smov(&mut s, true, 4, 1, 0b10001);
        assert_eq!(s.reg(4) as i64, -128);
    }

    #[test]
    fn test_ins_preserves_other_lanes() {
        let mut s = CpuState::new();
        s.set_vreg(1, u128::MAX);
        s.set_reg(0, 0);
        exec_ins_general(&mut s, 1, 0, 0b00100); // lane 0, 32-bit
        assert_eq!(s.vreg_lane(1, 0, 32), 0);
        assert_eq!(s.vreg_lane(1, 1, 32), u32::MAX as u64);
    }

    #[test]
    fn test_umov_d() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 64, &[0x1111, 0x2222]);
        exec_umov(&mut s, true, 0, 1, 0b11000); // D[1]
        assert_eq!(s.reg(0), 0x2222);
    }

    #[test]
    fn test_two_reg_unary() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[5, 0xFFFF_FFFB, 0, 0x8000_0000]);
        exec_vec_two_reg(&mut s, true, false, 2, 0b01011, 0, 1); // ABS
        assert_eq!(lanes(&s, 0, 32, 4), vec![5, 5, 0, 0x8000_0000]);
        exec_vec_two_reg(&mut s, true, true, 2, 0b01011, 0, 1); // NEG
        assert_eq!(lanes(&s, 0, 32, 4), vec![0xFFFF_FFFB, 5, 0, 0x8000_0000]);
    }

    #[test]
    fn test_cnt_and_not() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 8, &[0xFF, 0x0F, 0x01, 0x00]);
        exec_vec_two_reg(&mut s, false, false, 0, 0b00101, 0, 1); // CNT
        assert_eq!(lanes(&s, 0, 8, 4), vec![8, 4, 1, 0]);
        s.set_vreg(1, 0xAAAA_AAAA_AAAA_AAAA_AAAA_AAAA_AAAA_AAAA);
        exec_vec_two_reg(&mut s, true, true, 0, 0b00101, 0, 1); // NOT
        assert_eq!(s.vreg(0), 0x5555_5555_5555_5555_5555_5555_5555_5555);
    }

    #[test]
    fn test_zero_compares() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 0, 0xFFFF_FFFF, 2]);
        exec_vec_two_reg(&mut s, true, false, 2, 0b01001, 0, 1); // CMEQ #0
        assert_eq!(lanes(&s, 0, 32, 4), vec![0, 0xFFFF_FFFF, 0, 0]);
        exec_vec_two_reg(&mut s, true, false, 2, 0b01010, 0, 1); // CMLT #0
        assert_eq!(lanes(&s, 0, 32, 4), vec![0, 0, 0xFFFF_FFFF, 0]);
    }

    #[test]
    fn test_xtn_and_xtn2() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 64, &[0x1_0000_0001, 0x2_0000_0002]);
        // XTN V0.2S, V1.2D.
        exec_vec_two_reg(&mut s, false, false, 2, 0b10010, 0, 1);
        assert_eq!(lanes(&s, 0, 32, 2), vec![1, 2]);
        assert_eq!(s.v[0][1], 0);
        // XTN2 V0.4S, V1.2D keeps the low half.
        exec_vec_two_reg(&mut s, true, false, 2, 0b10010, 0, 1);
        assert_eq!(lanes(&s, 0, 32, 4), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_rev64_vector() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 2, 3, 4]);
        exec_vec_two_reg(&mut s, true, false, 2, 0b00000, 0, 1);
        assert_eq!(lanes(&s, 0, 32, 4), vec![2, 1, 4, 3]);
    }

    #[test]
    fn test_vector_fcvt_and_cvtf() {
        let mut s = CpuState::new();
        let f = |v: f32| v.to_bits() as u64;
        set_lanes(&mut s, 1, 32, &[f(1.5), f(-2.5), f(1e20), f(-1.0)]);
        // FCVTZS 4S: u=0, size=10, opcode 11011.
        exec_vec_two_reg(&mut s, true, false, 2, 0b11011, 0, 1);
        assert_eq!(
            lanes(&s, 0, 32, 4),
            vec![1, (-2i32) as u32 as u64, i32::MAX as u64, (-1i32) as u32 as u64]
        );
        // FCVTZU clamps negatives to zero.
        exec_vec_two_reg(&mut s, true, true, 2, 0b11011, 0, 1);
        assert_eq!(s.vreg_lane(0, 3, 32), 0);
        // SCVTF round-trips small integers.
        set_lanes(&mut s, 1, 32, &[3, 0xFFFF_FFFD, 0, 1]);
        exec_vec_two_reg(&mut s, true, false, 0, 0b11101, 0, 1);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 0, 32) as u32), 3.0);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 1, 32) as u32), -3.0);
        // UCVTF treats the same lane as unsigned.
        exec_vec_two_reg(&mut s, true, true, 0, 0b11101, 0, 1);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 1, 32) as u32), 4294967040.0f32);
    }

    #[test]
    fn test_fabs_fneg_vector() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 64, &[(-1.5f64).to_bits(), 2.5f64.to_bits()]);
        exec_vec_two_reg(&mut s, true, false, 3, 0b01111, 0, 1); // FABS 2D
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 1.5);
        exec_vec_two_reg(&mut s, true, true, 3, 0b01111, 0, 1); // FNEG 2D
        assert_eq!(f64::from_bits(s.vreg_lane(0, 1, 64)), -2.5);
    }

    #[test]
    fn test_across_lanes_minmax() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[5, 0xFFFF_FFFF, 3, 10]);
        exec_vec_across(&mut s, true, true, 2, 0b01010, 0, 1); // UMAXV
        assert_eq!(s.vreg(0), 0xFFFF_FFFF);
        exec_vec_across(&mut s, true, false, 2, 0b01010, 0, 1); // SMAXV (signed: -1 loses)
        assert_eq!(s.vreg(0), 10);
        exec_vec_across(&mut s, true, false, 2, 0b11010, 0, 1); // SMINV
        assert_eq!(s.vreg(0), 0xFFFF_FFFF);
        exec_vec_across(&mut s, true, true, 2, 0b11010, 0, 1); // UMINV
        assert_eq!(s.vreg(0), 3);
    }

    #[test]
    fn test_uaddlv() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 8, &[0xFF; 16]);
        exec_vec_across(&mut s, true, true, 0, 0b00011, 0, 1);
        assert_eq!(s.vreg(0), 16 * 0xFF);
    }

    #[test]
    fn test_umull_smull() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[0xFFFF_FFFF, 2, 0, 0]);
        set_lanes(&mut s, 2, 32, &[0xFFFF_FFFF, 3, 0, 0]);
        exec_vec_three_diff(&mut s, false, true, 2, 0b1100, 0, 1, 2); // UMULL
        assert_eq!(s.vreg_lane(0, 0, 64), 0xFFFF_FFFE_0000_0001);
        assert_eq!(s.vreg_lane(0, 1, 64), 6);
        exec_vec_three_diff(&mut s, false, false, 2, 0b1100, 0, 1, 2); // SMULL
        assert_eq!(s.vreg_lane(0, 0, 64), 1); // (-1) * (-1)
    }

    #[test]
    fn test_umull2_reads_upper() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[0, 0, 7, 8]);
        set_lanes(&mut s, 2, 32, &[0, 0, 9, 10]);
        exec_vec_three_diff(&mut s, true, true, 2, 0b1100, 0, 1, 2);
        assert_eq!(s.vreg_lane(0, 0, 64), 63);
        assert_eq!(s.vreg_lane(0, 1, 64), 80);
    }

    #[test]
    fn test_saddl_usubl() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 16, &[0xFFFF, 10, 0, 0]);
        set_lanes(&mut s, 2, 16, &[1, 3, 0, 0]);
        exec_vec_three_diff(&mut s, false, false, 1, 0b0000, 0, 1, 2); // SADDL
        assert_eq!(s.vreg_lane(0, 0, 32), 0); // -1 + 1
        assert_eq!(s.vreg_lane(0, 1, 32), 13);
        exec_vec_three_diff(&mut s, false, true, 1, 0b0010, 0, 1, 2); // USUBL
        assert_eq!(s.vreg_lane(0, 0, 32), 0xFFFE);
        assert_eq!(s.vreg_lane(0, 1, 32), 7);
    }

    #[test]
    fn test_movi_mvni_orr_bic() {
        let mut s = CpuState::new();
        exec_vec_mod_imm(&mut s, true, 0, 0b0000, 0, 0x12); // MOVI 4S
        assert_eq!(lanes(&s, 0, 32, 4), vec![0x12, 0x12, 0x12, 0x12]);
        exec_vec_mod_imm(&mut s, true, 1, 0b0000, 0, 0x12); // MVNI 4S
        assert_eq!(s.vreg_lane(0, 0, 32), !0x12u32 as u64);
        // ORR immediate merges.
        s.set_vreg(1, 0x1);
        exec_vec_mod_imm(&mut s, false, 0, 0b0001, 1, 0xF0);
        assert_eq!(s.v[1][0], 0x0000_00F1_0000_00F1);
        // BIC immediate clears.
        exec_vec_mod_imm(&mut s, false, 1, 0b0001, 1, 0xF0);
        assert_eq!(s.v[1][0], 0x0000_0001_0000_0001);
        // MOVI 2D (op=1, cmode=1110): per-bit byte fan-out.
        exec_vec_mod_imm(&mut s, true, 1, 0b1110, 2, 0xFF);
        assert_eq!(s.vreg(2), u128::MAX);
    }

    #[test]
    fn test_shift_immediate_forms() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 0xFF, 0x8000_0000, 0x10]);
        // SHL V0.4S, V1.4S, #3: immh:immb = 0100:011 -> 35, shift 3.
        exec_vec_shift_imm(&mut s, true, false, 0b0100, 0b011, 0b01010, 0, 1);
        assert_eq!(lanes(&s, 0, 32, 4), vec![8, 0x7F8, 0, 0x80]);
        // USHR #4: immh:immb = 0111:100 -> 60, shift 64-60 = 4.
        exec_vec_shift_imm(&mut s, true, true, 0b0111, 0b100, 0b00000, 0, 1);
        assert_eq!(lanes(&s, 0, 32, 4), vec![0, 0xF, 0x0800_0000, 1]);
        // SSHR #4 sign-fills.
        exec_vec_shift_imm(&mut s, true, false, 0b0111, 0b100, 0b00000, 0, 1);
        assert_eq!(s.vreg_lane(0, 2, 32), 0xF800_0000);
    }

    #[test]
    fn test_usra_accumulates() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 0, 32, &[100, 100, 100, 100]);
        set_lanes(&mut s, 1, 32, &[0x10, 0x20, 0x30, 0x40]);
        // USRA #4.
        exec_vec_shift_imm(&mut s, true, true, 0b0111, 0b100, 0b00010, 0, 1);
        assert_eq!(lanes(&s, 0, 32, 4), vec![101, 102, 103, 104]);
    }

    #[test]
    fn test_ushll_sshll() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 8, &[0x80, 2, 3, 4, 5, 6, 7, 8]);
        // USHLL V0.8H, V1.8B, #1: immh:immb = 0001:001 -> 9, shift 1.
        exec_vec_shift_imm(&mut s, false, true, 0b0001, 0b001, 0b10100, 0, 1);
        assert_eq!(s.vreg_lane(0, 0, 16), 0x100);
        assert_eq!(s.vreg_lane(0, 1, 16), 4);
        // SSHLL sign-extends first.
        exec_vec_shift_imm(&mut s, false, false, 0b0001, 0b001, 0b10100, 0, 1);
        assert_eq!(s.vreg_lane(0, 0, 16), 0xFF00);
    }

    #[test]
    fn test_ushll2_reads_upper_half() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 8, &[0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
        exec_vec_shift_imm(&mut s, true, true, 0b0001, 0b000, 0b10100, 0, 1);
        assert_eq!(s.vreg_lane(0, 0, 16), 1);
        assert_eq!(s.vreg_lane(0, 7, 16), 8);
    }

    #[test]
    fn test_shrn() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[0x1230, 0x4560, 0x7890, 0xABC0]);
        // SHRN V0.4H, V1.4S, #4: immh:immb = 0001:100 -> 12, shift 32-...
        // esize 16: shift = 32 - 12 = 20? No: immhb=0b0001100=12, shift = 2*16-12 = 20.
        // Use #4: immhb = 32 - 4 = 28 = 0b11100: immh=0011, immb=100.
        exec_vec_shift_imm(&mut s, false, false, 0b0011, 0b100, 0b10000, 0, 1);
        assert_eq!(lanes(&s, 0, 16, 4), vec![0x123, 0x456, 0x789, 0xABC]);
    }

    #[test]
    fn test_zip_uzp_trn() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 2, 3, 4]);
        set_lanes(&mut s, 2, 32, &[10, 20, 30, 40]);
        exec_vec_permute(&mut s, true, 2, 0b011, 0, 1, 2); // ZIP1
        assert_eq!(lanes(&s, 0, 32, 4), vec![1, 10, 2, 20]);
        exec_vec_permute(&mut s, true, 2, 0b111, 0, 1, 2); // ZIP2
        assert_eq!(lanes(&s, 0, 32, 4), vec![3, 30, 4, 40]);
        exec_vec_permute(&mut s, true, 2, 0b001, 0, 1, 2); // UZP1
        assert_eq!(lanes(&s, 0, 32, 4), vec![1, 3, 10, 30]);
        exec_vec_permute(&mut s, true, 2, 0b101, 0, 1, 2); // UZP2
        assert_eq!(lanes(&s, 0, 32, 4), vec![2, 4, 20, 40]);
        exec_vec_permute(&mut s, true, 2, 0b010, 0, 1, 2); // TRN1
        assert_eq!(lanes(&s, 0, 32, 4), vec![1, 10, 3, 30]);
        exec_vec_permute(&mut s, true, 2, 0b110, 0, 1, 2); // TRN2
        assert_eq!(lanes(&s, 0, 32, 4), vec![2, 20, 4, 40]);
    }

    #[test]
    fn test_ext() {
        let mut s = CpuState::new();
        s.set_vreg(1, 0x0F0E_0D0C_0B0A_0908_0706_0504_0302_0100);
        s.set_vreg(2, 0x1F1E_1D1C_1B1A_1918_1716_1514_1312_1110);
        exec_vec_extract(&mut s, true, 4, 0, 1, 2);
        let out = s.vreg(0).to_le_bytes();
        assert_eq!(out[0], 0x04);
        assert_eq!(out[11], 0x0F);
        assert_eq!(out[12], 0x10);
        assert_eq!(out[15], 0x13);
    }

    #[test]
    fn test_tbl_and_tbx() {
        let mut s = CpuState::new();
        let mut table = [0u8; 16];
        for (i, b) in table.iter_mut().enumerate() {
            *b = 0x10 + i as u8;
        }
        s.set_vreg(1, u128::from_le_bytes(table));
        s.set_vreg(2, u128::from_le_bytes([0, 3, 15, 0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        exec_vec_tbl(&mut s, false, 0, false, 0, 1, 2);
        let out = s.vreg(0).to_le_bytes();
        assert_eq!(out[0], 0x10);
        assert_eq!(out[1], 0x13);
        assert_eq!(out[2], 0x1F);
        assert_eq!(out[3], 0); // out of range -> zero
        // TBX keeps the destination byte instead.
        s.set_vreg(0, u128::from_le_bytes([0x42; 16]));
        exec_vec_tbl(&mut s, false, 0, true, 0, 1, 2);
        let out = s.vreg(0).to_le_bytes();
        assert_eq!(out[3], 0x42);
    }

    #[test]
    fn test_tbl_two_registers() {
        let mut s = CpuState::new();
        s.set_vreg(1, u128::from_le_bytes([1; 16]));
        s.set_vreg(2, u128::from_le_bytes([2; 16]));
        // Index 16 lands in the second table register.
        s.set_vreg(3, u128::from_le_bytes([16, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        exec_vec_tbl(&mut s, true, 1, false, 0, 1, 3);
        assert_eq!(s.vreg(0).to_le_bytes()[0], 2);
    }

    #[test]
    fn test_fmul_by_element() {
        let mut s = CpuState::new();
        let f = |v: f32| v.to_bits() as u64;
        set_lanes(&mut s, 1, 32, &[f(1.0), f(2.0), f(3.0), f(4.0)]);
        set_lanes(&mut s, 2, 32, &[f(0.0), f(10.0), f(0.0), f(0.0)]);
        // FMUL V0.4S, V1.4S, V2.S[1]: size=10, h:l = 0:1, m=0, rm=2.
        exec_vec_indexed(&mut s, true, false, 2, 0b1001, 0, 1, 2, 0, 1, 0);
        assert_eq!(f32::from_bits(s.vreg_lane(0, 3, 32) as u32), 40.0);
    }

    #[test]
    fn test_mul_by_element_integer() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 32, &[1, 2, 3, 4]);
        set_lanes(&mut s, 2, 32, &[0, 7, 0, 0]);
        exec_vec_indexed(&mut s, true, false, 2, 0b1000, 0, 1, 2, 0, 1, 0);
        assert_eq!(lanes(&s, 0, 32, 4), vec![7, 14, 21, 28]);
    }

    #[test]
    fn test_scalar_ops() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 64, &[100, 0]);
        set_lanes(&mut s, 2, 64, &[30, 0]);
        exec_scalar_three_same(&mut s, true, 3, 0b10000, 0, 1, 2); // SUB D
        assert_eq!(s.vreg(0), 70);
        exec_scalar_three_same(&mut s, false, 3, 0b10000, 0, 1, 2); // ADD D
        assert_eq!(s.vreg(0), 130);
        exec_scalar_three_same(&mut s, true, 3, 0b10001, 0, 1, 1); // CMEQ D
        assert_eq!(s.vreg(0), u64::MAX as u128);
    }

    #[test]
    fn test_scalar_pairwise() {
        let mut s = CpuState::new();
        set_lanes(&mut s, 1, 64, &[3, 4]);
        exec_scalar_pairwise(&mut s, false, 3, 0b11011, 0, 1); // ADDP D0, V1.2D
        assert_eq!(s.vreg(0), 7);
        set_lanes(&mut s, 2, 64, &[1.5f64.to_bits(), 2.0f64.to_bits()]);
        exec_scalar_pairwise(&mut s, true, 1, 0b01101, 0, 2); // FADDP D0, V2.2D
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 3.5);
    }

    #[test]
    fn test_scalar_cvt() {
        let mut s = CpuState::new();
        s.set_vreg_scalar(1, 64, (-2.7f64).to_bits());
        exec_scalar_two_reg(&mut s, false, 3, 0b11011, 0, 1); // FCVTZS D
        assert_eq!(s.vreg_lane(0, 0, 64) as i64, -2);
        exec_scalar_two_reg(&mut s, true, 3, 0b11011, 0, 1); // FCVTZU D
        assert_eq!(s.vreg_lane(0, 0, 64), 0);
        s.set_vreg_scalar(1, 64, 5);
        exec_scalar_two_reg(&mut s, false, 1, 0b11101, 0, 1); // SCVTF D
        assert_eq!(f64::from_bits(s.vreg_lane(0, 0, 64)), 5.0);
    }

    #[test]
    fn test_ldst_multi_round_trip() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        set_lanes(&mut s, 0, 32, &[1, 2, 3, 4]);
        s.set_reg(5, 0x100);
        // ST1 {V0.4S}, [X5]
        exec_vec_ldst_multi(&mut s, &mut m, true, false, 0b0111, 2, 0, 5, None);
        assert_eq!(m.read_u32(0x100).unwrap(), 1);
        assert_eq!(m.read_u32(0x10C).unwrap(), 4);
        // LD1 {V1.4S}, [X5]
        exec_vec_ldst_multi(&mut s, &mut m, true, true, 0b0111, 2, 1, 5, None);
        assert_eq!(lanes(&s, 1, 32, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_ld2_deinterleaves() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        for i in 0..8u32 {
            m.write_u32(0x100 + i as u64 * 4, i).unwrap();
        }
        s.set_reg(5, 0x100);
        // LD2 {V0.4S, V1.4S}, [X5]
        exec_vec_ldst_multi(&mut s, &mut m, true, true, 0b1000, 2, 0, 5, None);
        assert_eq!(lanes(&s, 0, 32, 4), vec![0, 2, 4, 6]);
        assert_eq!(lanes(&s, 1, 32, 4), vec![1, 3, 5, 7]);
        // ST2 interleaves them back.
        exec_vec_ldst_multi(&mut s, &mut m, true, false, 0b1000, 2, 0, 5, None);
        for i in 0..8u32 {
            assert_eq!(m.read_u32(0x100 + i as u64 * 4).unwrap(), i);
        }
    }

    #[test]
    fn test_ld1_post_index() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        s.set_reg(5, 0x100);
        // LD1 {V0.16B}, [X5], #16 (rm = 31 means immediate).
        exec_vec_ldst_multi(&mut s, &mut m, true, true, 0b0111, 0, 0, 5, Some(31));
        assert_eq!(s.reg(5), 0x110);
        // Register post-index.
        s.set_reg(3, 0x20);
        exec_vec_ldst_multi(&mut s, &mut m, true, true, 0b0111, 0, 0, 5, Some(3));
        assert_eq!(s.reg(5), 0x130);
    }

    #[test]
    fn test_ld1r_broadcast() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        m.write_u32(0x100, 0xDEAD_BEEF).unwrap();
        s.set_reg(5, 0x100);
        exec_vec_ldst_single(&mut s, &mut m, true, true, 1, true, 0b110, 0, 2, 0, 5, None);
        assert_eq!(
            lanes(&s, 0, 32, 4),
            vec![0xDEAD_BEEF, 0xDEAD_BEEF, 0xDEAD_BEEF, 0xDEAD_BEEF]
        );
    }

    #[test]
    fn test_single_lane_load_store() {
        let mut s = CpuState::new();
        let mut m = MemoryWindow::new(vec![0u8; 0x1000], 0);
        m.write_u32(0x100, 0xAABB_CCDD).unwrap();
        s.set_reg(5, 0x100);
        // LD1 {V0.S}[3], [X5]: opcode 100, q=1, s=1.
        exec_vec_ldst_single(&mut s, &mut m, true, true, 1, false, 0b100, 1, 0, 0, 5, None);
        assert_eq!(s.vreg_lane(0, 3, 32), 0xAABB_CCDD);
        // ST1 {V0.S}[3], [X6].
        s.set_reg(6, 0x200);
        exec_vec_ldst_single(&mut s, &mut m, true, false, 1, false, 0b100, 1, 0, 0, 6, None);
        assert_eq!(m.read_u32(0x200).unwrap(), 0xAABB_CCDD);
    }
}
