// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Instruction execution.
//!
//! [`execute`] maps a decoded [`Instruction`] onto its handler. Handlers
//! mutate the machine state and report how the PC should move through
//! [`StepResult`]; the run loop in [`crate::cpu`] owns PC advancement and
//! error surfacing.

pub mod alu;
pub mod branch;
pub mod mem;
pub mod neon;
pub mod simd;
pub mod system;

use crate::decoder::Instruction;
use crate::memory::MemoryWindow;
use crate::state::CpuState;

/// Result of executing a single instruction.
pub enum StepResult {
    /// Advance PC by 4.
    Continue,
    /// PC was replaced by a taken branch.
    BranchTaken,
    /// SVC: hand control to the host's supervisor-call sink, then
    /// continue at PC + 4.
    Svc(u16),
    /// A guest address fell outside the memory window.
    MemoryFault(u64),
    /// Unrecoverable: decode failure, permanent UDF, BRK. Routed to the
    /// host's `hard_termination` with the message and value.
    Fatal { msg: &'static str, value: u64 },
}

/// Execute one decoded instruction against the machine state.
pub fn execute(state: &mut CpuState, mem: &mut MemoryWindow, inst: &Instruction) -> StepResult {
    use Instruction::*;

    match *inst {
        // -- Data processing (immediate) --------------------------------
        PcRel { page, rd, imm } => alu::exec_pc_rel(state, page, rd, imm),
        AddSubImm { sf, sub, set_flags, rd, rn, imm12, shift12 } => {
            alu::exec_add_sub_imm(state, sf, sub, set_flags, rd, rn, imm12, shift12)
        }
        LogicalImm { sf, opc, rd, rn, imm } => alu::exec_logical_imm(state, sf, opc, rd, rn, imm),
        MoveWide { sf, opc, rd, imm16, hw } => alu::exec_move_wide(state, sf, opc, rd, imm16, hw),
        Bitfield { sf, opc, rd, rn, immr, imms } => {
            alu::exec_bitfield(state, sf, opc, rd, rn, immr, imms)
        }
        Extr { sf, rd, rn, rm, lsb } => alu::exec_extr(state, sf, rd, rn, rm, lsb),

        // -- Data processing (register) ---------------------------------
        AddSubShifted { sf, sub, set_flags, rd, rn, rm, shift, amount } => {
            alu::exec_add_sub_shifted(state, sf, sub, set_flags, rd, rn, rm, shift, amount)
        }
        AddSubExtended { sf, sub, set_flags, rd, rn, rm, extend, amount } => {
            alu::exec_add_sub_extended(state, sf, sub, set_flags, rd, rn, rm, extend, amount)
        }
        AddSubCarry { sf, sub, set_flags, rd, rn, rm } => {
            alu::exec_add_sub_carry(state, sf, sub, set_flags, rd, rn, rm)
        }
        LogicalShifted { sf, opc, invert, rd, rn, rm, shift, amount } => {
            alu::exec_logical_shifted(state, sf, opc, invert, rd, rn, rm, shift, amount)
        }
        VarShift { sf, shift, rd, rn, rm } => alu::exec_var_shift(state, sf, shift, rd, rn, rm),
        MulAdd { sf, sub, rd, rn, rm, ra } => alu::exec_mul_add(state, sf, sub, rd, rn, rm, ra),
        MulAddLong { unsigned, sub, rd, rn, rm, ra } => {
            alu::exec_mul_add_long(state, unsigned, sub, rd, rn, rm, ra)
        }
        MulHigh { unsigned, rd, rn, rm } => alu::exec_mul_high(state, unsigned, rd, rn, rm),
        Div { unsigned, sf, rd, rn, rm } => alu::exec_div(state, unsigned, sf, rd, rn, rm),
        CondSelect { sf, op, rd, rn, rm, cond } => {
            alu::exec_cond_select(state, sf, op, rd, rn, rm, cond)
        }
        CondCompare { sf, negate, rn, rm_imm5, imm, cond, nzcv } => {
            alu::exec_cond_compare(state, sf, negate, rn, rm_imm5, imm, cond, nzcv)
        }
        CountLeading { sf, sign_bits, rd, rn } => {
            alu::exec_count_leading(state, sf, sign_bits, rd, rn)
        }
        Rbit { sf, rd, rn } => alu::exec_rbit(state, sf, rd, rn),
        Rev { sf, opc, rd, rn } => alu::exec_rev(state, sf, opc, rd, rn),

        // -- Branches ----------------------------------------------------
        Branch { link, imm } => branch::exec_branch(state, link, imm),
        BranchReg { link, rn } => branch::exec_branch_reg(state, link, rn),
        Ret { rn } => branch::exec_ret(state, rn),
        BranchCond { cond, imm } => branch::exec_branch_cond(state, cond, imm),
        CompareBranch { sf, nonzero, rt, imm } => {
            branch::exec_compare_branch(state, sf, nonzero, rt, imm)
        }
        TestBranch { nonzero, rt, bit_pos, imm } => {
            branch::exec_test_branch(state, nonzero, rt, bit_pos, imm)
        }

        // -- System ------------------------------------------------------
        Svc { imm } => StepResult::Svc(imm),
        Brk { imm } => StepResult::Fatal { msg: "BRK instruction", value: imm as u64 },
        Udf { imm } => StepResult::Fatal { msg: "permanent UDF", value: imm as u64 },
        Nop => StepResult::Continue,
        Mrs { rt, key } => system::exec_mrs(state, rt, key),
        Msr { rt, key } => system::exec_msr(state, rt, key),
        DcZva { rt } => system::exec_dc_zva(state, mem, rt),

        // -- Integer loads and stores ------------------------------------
        LoadImm { rt, rn, imm, size, mode, sign_extend, to64 } => {
            mem::exec_load_imm(state, mem, rt, rn, imm, size, mode, sign_extend, to64)
        }
        StoreImm { rt, rn, imm, size, mode } => {
            mem::exec_store_imm(state, mem, rt, rn, imm, size, mode)
        }
        LoadReg { rt, rn, rm, size, extend, amount, sign_extend, to64 } => {
            mem::exec_load_reg(state, mem, rt, rn, rm, size, extend, amount, sign_extend, to64)
        }
        StoreReg { rt, rn, rm, size, extend, amount } => {
            mem::exec_store_reg(state, mem, rt, rn, rm, size, extend, amount)
        }
        LoadLit { rt, opc, imm } => mem::exec_load_lit(state, mem, rt, opc, imm),
        LoadPair { rt, rt2, rn, imm, size, mode, sign_extend } => {
            mem::exec_load_pair(state, mem, rt, rt2, rn, imm, size, mode, sign_extend)
        }
        StorePair { rt, rt2, rn, imm, size, mode } => {
            mem::exec_store_pair(state, mem, rt, rt2, rn, imm, size, mode)
        }
        LoadAcq { rt, rn, size } => mem::exec_load_acq(state, mem, rt, rn, size),
        StoreRel { rt, rn, size } => mem::exec_store_rel(state, mem, rt, rn, size),
        StoreExcl { rs, rt, rn, size } => mem::exec_store_excl(state, mem, rs, rt, rn, size),

        // -- Scalar FP ----------------------------------------------------
        FpMovReg { ftype, rd, rn } => simd::exec_fmov_reg(state, ftype, rd, rn),
        FpMovImm { ftype, rd, imm8 } => simd::exec_fmov_imm(state, ftype, rd, imm8),
        FpMovToGp { sf, rd, rn, top } => simd::exec_fmov_to_gp(state, sf, rd, rn, top),
        FpMovFromGp { sf, rd, rn, top } => simd::exec_fmov_from_gp(state, sf, rd, rn, top),
        FpUnary { ftype, op, rd, rn } => simd::exec_fp_unary(state, ftype, op, rd, rn),
        FpArith { ftype, op, rd, rn, rm } => simd::exec_fp_arith(state, ftype, op, rd, rn, rm),
        FpFma { ftype, op, rd, rn, rm, ra } => simd::exec_fp_fma(state, ftype, op, rd, rn, rm, ra),
        FpCompare { ftype, rn, rm, with_zero } => {
            simd::exec_fp_compare(state, ftype, rn, rm, with_zero)
        }
        FpCondCompare { ftype, rn, rm, cond, nzcv } => {
            simd::exec_fp_cond_compare(state, ftype, rn, rm, cond, nzcv)
        }
        FpCondSelect { ftype, rd, rn, rm, cond } => {
            simd::exec_fp_cond_select(state, ftype, rd, rn, rm, cond)
        }
        FpConvert { rd, rn, from, to } => simd::exec_fp_convert(state, rd, rn, from, to),
        FpToInt { sf, ftype, rd, rn, unsigned, round } => {
            simd::exec_fp_to_int(state, sf, ftype, rd, rn, unsigned, round)
        }
        IntToFp { sf, ftype, rd, rn, unsigned } => {
            simd::exec_int_to_fp(state, sf, ftype, rd, rn, unsigned)
        }
        FpToFixed { sf, ftype, rd, rn, unsigned, fbits } => {
            simd::exec_fp_to_fixed(state, sf, ftype, rd, rn, unsigned, fbits)
        }
        FixedToFp { sf, ftype, rd, rn, unsigned, fbits } => {
            simd::exec_fixed_to_fp(state, sf, ftype, rd, rn, unsigned, fbits)
        }
        FpRound { ftype, rd, rn, round } => simd::exec_fp_round(state, ftype, rd, rn, round),

        // -- SIMD loads and stores ----------------------------------------
        SimdLoadImm { rt, rn, imm, size, mode } => {
            simd::exec_simd_load_imm(state, mem, rt, rn, imm, size, mode)
        }
        SimdStoreImm { rt, rn, imm, size, mode } => {
            simd::exec_simd_store_imm(state, mem, rt, rn, imm, size, mode)
        }
        SimdLoadReg { rt, rn, rm, size, extend, amount } => {
            simd::exec_simd_load_reg(state, mem, rt, rn, rm, size, extend, amount)
        }
        SimdStoreReg { rt, rn, rm, size, extend, amount } => {
            simd::exec_simd_store_reg(state, mem, rt, rn, rm, size, extend, amount)
        }
        SimdLoadLit { rt, size, imm } => simd::exec_simd_load_lit(state, mem, rt, size, imm),
        SimdLoadPair { rt, rt2, rn, imm, size, mode } => {
            simd::exec_simd_pair(state, mem, true, rt, rt2, rn, imm, size, mode)
        }
        SimdStorePair { rt, rt2, rn, imm, size, mode } => {
            simd::exec_simd_pair(state, mem, false, rt, rt2, rn, imm, size, mode)
        }
        VecLoadStoreMulti { q, load, opcode, size, rt, rn, rm } => {
            neon::exec_vec_ldst_multi(state, mem, q, load, opcode, size, rt, rn, rm)
        }
        VecLoadStoreSingle { q, load, selem, replicate, opcode, s, size, rt, rn, rm } => {
            neon::exec_vec_ldst_single(state, mem, q, load, selem, replicate, opcode, s, size, rt, rn, rm)
        }

        // -- SIMD data processing -----------------------------------------
        VecDupElement { q, rd, rn, imm5 } => neon::exec_dup_element(state, q, rd, rn, imm5),
        VecDupGeneral { q, rd, rn, imm5 } => neon::exec_dup_general(state, q, rd, rn, imm5),
        VecInsGeneral { rd, rn, imm5 } => neon::exec_ins_general(state, rd, rn, imm5),
        VecInsElement { rd, rn, imm5, imm4 } => neon::exec_ins_element(state, rd, rn, imm5, imm4),
        VecUmov { q, rd, rn, imm5 } => neon::exec_umov(state, q, rd, rn, imm5),
        VecSmov { q, rd, rn, imm5 } => neon::exec_smov(state, q, rd, rn, imm5),
        VecThreeSame { q, u, size, opcode, rd, rn, rm } => {
            neon::exec_vec_three_same(state, q, u, size, opcode, rd, rn, rm)
        }
        VecTwoReg { q, u, size, opcode, rd, rn } => {
            neon::exec_vec_two_reg(state, q, u, size, opcode, rd, rn)
        }
        VecAcross { q, u, size, opcode, rd, rn } => {
            neon::exec_vec_across(state, q, u, size, opcode, rd, rn)
        }
        VecThreeDiff { q, u, size, opcode, rd, rn, rm } => {
            neon::exec_vec_three_diff(state, q, u, size, opcode, rd, rn, rm)
        }
        VecModImm { q, op, cmode, rd, imm8 } => {
            neon::exec_vec_mod_imm(state, q, op, cmode, rd, imm8)
        }
        VecShiftImm { q, u, immh, immb, opcode, rd, rn } => {
            neon::exec_vec_shift_imm(state, q, u, immh, immb, opcode, rd, rn)
        }
        VecPermute { q, size, opcode, rd, rn, rm } => {
            neon::exec_vec_permute(state, q, size, opcode, rd, rn, rm)
        }
        VecExtract { q, imm4, rd, rn, rm } => neon::exec_vec_extract(state, q, imm4, rd, rn, rm),
        VecIndexed { q, u, size, opcode, rd, rn, rm, h, l, m } => {
            neon::exec_vec_indexed(state, q, u, size, opcode, rd, rn, rm, h, l, m)
        }
        VecTbl { q, len, ext, rd, rn, rm } => neon::exec_vec_tbl(state, q, len, ext, rd, rn, rm),
        ScalarThreeSame { u, size, opcode, rd, rn, rm } => {
            neon::exec_scalar_three_same(state, u, size, opcode, rd, rn, rm)
        }
        ScalarTwoReg { u, size, opcode, rd, rn } => {
            neon::exec_scalar_two_reg(state, u, size, opcode, rd, rn)
        }
        ScalarPairwise { u, size, opcode, rd, rn } => {
            neon::exec_scalar_pairwise(state, u, size, opcode, rd, rn)
        }

        // -- Fallback -----------------------------------------------------
        Unknown { raw } => StepResult::Fatal { msg: "unhandled opcode", value: raw as u64 },
    }
}
