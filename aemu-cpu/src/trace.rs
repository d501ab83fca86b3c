// SPDX-FileCopyrightText: 2026 aemu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Per-instruction trace rendering.
//!
//! Produces one line per instruction: PC, the raw opcode word, a
//! mnemonic-style rendering of the decoded form, and the non-zero
//! integer registers. Branch targets are symbolicated through the host.
//! The renderer only formats; the run loop decides whether to emit.

use crate::decoder::{AddrMode, FpType, Instruction, Shift};
use crate::host::Host;
use crate::state::CpuState;

use std::fmt::Write;

fn x(reg: u32) -> String {
    if reg == 31 {
        "xzr".into()
    } else {
        format!("x{reg}")
    }
}

fn x_sp(reg: u32) -> String {
    if reg == 31 {
        "sp".into()
    } else {
        format!("x{reg}")
    }
}

fn w(reg: u32) -> String {
    if reg == 31 {
        "wzr".into()
    } else {
        format!("w{reg}")
    }
}

fn gpr(reg: u32, sf: bool) -> String {
    if sf {
        x(reg)
    } else {
        w(reg)
    }
}

fn fpr(reg: u32, ftype: FpType) -> String {
    match ftype {
        FpType::Half => format!("h{reg}"),
        FpType::Single => format!("s{reg}"),
        FpType::Double => format!("d{reg}"),
    }
}

const COND_NAMES: [&str; 16] = [
    "eq", "ne", "cs", "cc", "mi", "pl", "vs", "vc", "hi", "ls", "ge", "lt", "gt", "le", "al", "nv",
];

fn shift_name(shift: Shift) -> &'static str {
    match shift {
        Shift::Lsl => "lsl",
        Shift::Lsr => "lsr",
        Shift::Asr => "asr",
        Shift::Ror => "ror",
    }
}

/// Format a branch target, with the host's best symbol guess.
fn target(pc: u64, imm: i64, host: &dyn Host) -> String {
    let addr = (pc as i64).wrapping_add(imm) as u64;
    match host.symbol_lookup(addr) {
        Some((name, 0)) => format!("{addr:#x} <{name}>"),
        Some((name, off)) => format!("{addr:#x} <{name}+{off:#x}>"),
        None => format!("{addr:#x}"),
    }
}

fn addr_suffix(rn: u32, imm: i64, mode: AddrMode) -> String {
    match mode {
        AddrMode::Offset if imm == 0 => format!("[{}]", x_sp(rn)),
        AddrMode::Offset => format!("[{}, #{imm}]", x_sp(rn)),
        AddrMode::PreIndex => format!("[{}, #{imm}]!", x_sp(rn)),
        AddrMode::PostIndex => format!("[{}], #{imm}", x_sp(rn)),
    }
}

/// Render one decoded instruction in a disassembly-like style.
fn mnemonic(state: &CpuState, inst: &Instruction, host: &dyn Host) -> String {
    use Instruction::*;

    match inst {
        PcRel { page, rd, imm } => {
            let op = if *page { "adrp" } else { "adr" };
            let base = if *page { state.pc & !0xFFF } else { state.pc };
            format!("{op} {}, {:#x}", x(*rd), (base as i64).wrapping_add(*imm))
        }
        AddSubImm { sf, sub, set_flags, rd, rn, imm12, shift12 } => {
            let op = match (sub, set_flags) {
                (false, false) => "add",
                (false, true) => "adds",
                (true, false) => "sub",
                (true, true) => "subs",
            };
            let imm = if *shift12 { imm12 << 12 } else { *imm12 };
            let rd_name = if *set_flags { gpr(*rd, *sf) } else if *sf { x_sp(*rd) } else { w(*rd) };
            format!("{op} {}, {}, #{imm:#x}", rd_name, if *sf { x_sp(*rn) } else { w(*rn) })
        }
        LogicalImm { sf, opc, rd, rn, imm } => {
            let op = ["and", "orr", "eor", "ands"][*opc as usize];
            format!("{op} {}, {}, #{imm:#x}", gpr(*rd, *sf), gpr(*rn, *sf))
        }
        MoveWide { sf, opc, rd, imm16, hw } => {
            let op = match opc {
                0 => "movn",
                2 => "movz",
                _ => "movk",
            };
            if *hw == 0 {
                format!("{op} {}, #{imm16:#x}", gpr(*rd, *sf))
            } else {
                format!("{op} {}, #{imm16:#x}, lsl #{}", gpr(*rd, *sf), hw * 16)
            }
        }
        Bitfield { sf, opc, rd, rn, immr, imms } => {
            let op = ["sbfm", "bfm", "ubfm"][*opc as usize];
            format!("{op} {}, {}, #{immr}, #{imms}", gpr(*rd, *sf), gpr(*rn, *sf))
        }
        Extr { sf, rd, rn, rm, lsb } => {
            format!("extr {}, {}, {}, #{lsb}", gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf))
        }
        AddSubShifted { sf, sub, set_flags, rd, rn, rm, shift, amount } => {
            let op = match (sub, set_flags) {
                (false, false) => "add",
                (false, true) => "adds",
                (true, false) => "sub",
                (true, true) => "subs",
            };
            let mut out = format!("{op} {}, {}, {}", gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf));
            if *amount != 0 {
                let _ = write!(out, ", {} #{amount}", shift_name(*shift));
            }
            out
        }
        AddSubCarry { sf, sub, set_flags, rd, rn, rm } => {
            let op = match (sub, set_flags) {
                (false, false) => "adc",
                (false, true) => "adcs",
                (true, false) => "sbc",
                (true, true) => "sbcs",
            };
            format!("{op} {}, {}, {}", gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf))
        }
        LogicalShifted { sf, opc, invert, rd, rn, rm, shift, amount } => {
            let op = match (opc, invert) {
                (0, false) => "and",
                (0, true) => "bic",
                (1, false) => "orr",
                (1, true) => "orn",
                (2, false) => "eor",
                (2, true) => "eon",
                (_, false) => "ands",
                (_, true) => "bics",
            };
            let mut out = format!("{op} {}, {}, {}", gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf));
            if *amount != 0 {
                let _ = write!(out, ", {} #{amount}", shift_name(*shift));
            }
            out
        }
        VarShift { sf, shift, rd, rn, rm } => {
            format!("{}v {}, {}, {}", shift_name(*shift), gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf))
        }
        MulAdd { sf, sub, rd, rn, rm, ra } => {
            let op = if *sub { "msub" } else { "madd" };
            format!("{op} {}, {}, {}, {}", gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf), gpr(*ra, *sf))
        }
        Div { unsigned, sf, rd, rn, rm } => {
            let op = if *unsigned { "udiv" } else { "sdiv" };
            format!("{op} {}, {}, {}", gpr(*rd, *sf), gpr(*rn, *sf), gpr(*rm, *sf))
        }
        CondSelect { sf, op, rd, rn, rm, cond } => {
            let name = ["csel", "csinc", "csinv", "csneg"][*op as usize];
            format!(
                "{name} {}, {}, {}, {}",
                gpr(*rd, *sf),
                gpr(*rn, *sf),
                gpr(*rm, *sf),
                COND_NAMES[*cond as usize]
            )
        }
        CondCompare { sf, negate, rn, rm_imm5, imm, cond, nzcv } => {
            let op = if *negate { "ccmn" } else { "ccmp" };
            let operand = if *imm { format!("#{rm_imm5}") } else { gpr(*rm_imm5, *sf) };
            format!("{op} {}, {operand}, #{nzcv}, {}", gpr(*rn, *sf), COND_NAMES[*cond as usize])
        }
        Branch { link, imm } => {
            format!("{} {}", if *link { "bl" } else { "b" }, target(state.pc, *imm, host))
        }
        BranchReg { link, rn } => {
            format!("{} {}", if *link { "blr" } else { "br" }, x(*rn))
        }
        Ret { rn } => {
            if *rn == 30 {
                "ret".into()
            } else {
                format!("ret {}", x(*rn))
            }
        }
        BranchCond { cond, imm } => {
            format!("b.{} {}", COND_NAMES[*cond as usize], target(state.pc, *imm, host))
        }
        CompareBranch { sf, nonzero, rt, imm } => {
            let op = if *nonzero { "cbnz" } else { "cbz" };
            format!("{op} {}, {}", gpr(*rt, *sf), target(state.pc, *imm, host))
        }
        TestBranch { nonzero, rt, bit_pos, imm } => {
            let op = if *nonzero { "tbnz" } else { "tbz" };
            format!("{op} {}, #{bit_pos}, {}", x(*rt), target(state.pc, *imm, host))
        }
        Svc { imm } => format!("svc #{imm:#x}"),
        Brk { imm } => format!("brk #{imm:#x}"),
        Udf { imm } => format!("udf #{imm:#x}"),
        Nop => "nop".into(),
        Mrs { rt, key } => format!("mrs {}, S{key:#x}", x(*rt)),
        Msr { rt, key } => format!("msr S{key:#x}, {}", x(*rt)),
        DcZva { rt } => format!("dc zva, {}", x(*rt)),
        LoadImm { rt, rn, imm, size, mode, sign_extend, to64 } => {
            let op = match (sign_extend, size) {
                (false, 0) => "ldrb",
                (false, 1) => "ldrh",
                (true, 0) => "ldrsb",
                (true, 1) => "ldrsh",
                (true, 2) => "ldrsw",
                _ => "ldr",
            };
            format!("{op} {}, {}", gpr(*rt, *to64), addr_suffix(*rn, *imm, *mode))
        }
        StoreImm { rt, rn, imm, size, mode } => {
            let op = match size {
                0 => "strb",
                1 => "strh",
                _ => "str",
            };
            format!("{op} {}, {}", gpr(*rt, *size == 3), addr_suffix(*rn, *imm, *mode))
        }
        LoadLit { rt, opc, imm } => {
            let op = if *opc == 2 { "ldrsw" } else { "ldr" };
            format!("{op} {}, {}", gpr(*rt, *opc != 0), target(state.pc, *imm, host))
        }
        LoadPair { rt, rt2, rn, imm, size, mode, sign_extend } => {
            let op = if *sign_extend { "ldpsw" } else { "ldp" };
            format!(
                "{op} {}, {}, {}",
                gpr(*rt, *size == 3 || *sign_extend),
                gpr(*rt2, *size == 3 || *sign_extend),
                addr_suffix(*rn, *imm, *mode)
            )
        }
        StorePair { rt, rt2, rn, imm, size, mode } => {
            format!(
                "stp {}, {}, {}",
                gpr(*rt, *size == 3),
                gpr(*rt2, *size == 3),
                addr_suffix(*rn, *imm, *mode)
            )
        }
        LoadAcq { rt, rn, size } => {
            format!("ldar {}, [{}]", gpr(*rt, *size == 3), x_sp(*rn))
        }
        StoreRel { rt, rn, size } => {
            format!("stlr {}, [{}]", gpr(*rt, *size == 3), x_sp(*rn))
        }
        StoreExcl { rs, rt, rn, size } => {
            format!("stxr {}, {}, [{}]", w(*rs), gpr(*rt, *size == 3), x_sp(*rn))
        }
        FpMovImm { ftype, rd, imm8 } => {
            let bits = crate::bits::vfp_expand_imm(*imm8, 64);
            format!("fmov {}, #{}", fpr(*rd, *ftype), f64::from_bits(bits))
        }
        FpMovReg { ftype, rd, rn } => {
            format!("fmov {}, {}", fpr(*rd, *ftype), fpr(*rn, *ftype))
        }
        FpArith { ftype, op, rd, rn, rm } => {
            format!("f{op:?} {}, {}, {}", fpr(*rd, *ftype), fpr(*rn, *ftype), fpr(*rm, *ftype))
                .to_lowercase()
        }
        FpCompare { ftype, rn, rm, with_zero } => {
            if *with_zero {
                format!("fcmp {}, #0.0", fpr(*rn, *ftype))
            } else {
                format!("fcmp {}, {}", fpr(*rn, *ftype), fpr(*rm, *ftype))
            }
        }
        FpCondSelect { ftype, rd, rn, rm, cond } => {
            format!(
                "fcsel {}, {}, {}, {}",
                fpr(*rd, *ftype),
                fpr(*rn, *ftype),
                fpr(*rm, *ftype),
                COND_NAMES[*cond as usize]
            )
        }
        // The remaining forms get a compact debug rendering; they are
        // rare enough in traces that exact assembler syntax is not worth
        // the code.
        other => format!("{other:?}").to_lowercase(),
    }
}

/// Render the trace line for one instruction.
pub fn render(state: &CpuState, raw: u32, inst: &Instruction, host: &dyn Host) -> String {
    let mut line = format!("{:#010x}  {raw:08x}  {}", state.pc, mnemonic(state, inst, host));

    // Dump the non-zero integer registers, flags last.
    let mut regs = String::new();
    for i in 0..31 {
        let val = state.x[i];
        if val != 0 {
            let _ = write!(regs, " x{i}={val:#x}");
        }
    }
    if state.sp != 0 {
        let _ = write!(regs, " sp={:#x}", state.sp);
    }
    if !regs.is_empty() {
        let _ = write!(line, " |{regs}");
    }
    let _ = write!(
        line,
        " [{}{}{}{}]",
        if state.n() { 'N' } else { '-' },
        if state.z() { 'Z' } else { '-' },
        if state.c() { 'C' } else { '-' },
        if state.v_flag() { 'V' } else { '-' },
    );
    line
}
