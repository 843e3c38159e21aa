//! RISC-V instruction translation: `trans_*` handlers for both the
//! 32-bit (`Decode`) and 16-bit compressed (`Decode16`) decoders.
//!
//! Both decoders dispatch onto the same set of entry points (a
//! compressed `c.addi` lands on `trans_addi` exactly like its 32-bit
//! counterpart) so the actual IR-emission logic lives in a handful of
//! shared `do_*` helpers that take plain `i64` operand fields. Each
//! trait impl below is just the argument-struct plumbing.

use super::insn_decode::decode16_impl as d16;
use super::insn_decode::*;
use super::RiscvDisasContext;
use crate::DisasJumpType;
use tcg_core::tb::{EXCP_EBREAK, EXCP_ECALL, TB_EXIT_NOCHAIN};
use tcg_core::{Cond, Context, MemOp, TempIdx, Type};

// ---------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------

fn gpr(ctx: &RiscvDisasContext, r: i64) -> TempIdx {
    ctx.gpr[r as usize]
}

/// Write `val` to `gpr[rd]`, dropping the write if `rd == x0`.
/// Reads of `gpr[0]` are always zero without any special-casing since
/// nothing ever writes it.
fn write_gpr(ctx: &RiscvDisasContext, ir: &mut Context, rd: i64, val: TempIdx) {
    if rd != 0 {
        ir.gen_mov(Type::I64, ctx.gpr[rd as usize], val);
    }
}

fn set_pc_const(ctx: &RiscvDisasContext, ir: &mut Context, pc: u64) {
    let c = ir.new_const(Type::I64, pc);
    ir.gen_mov(Type::I64, ctx.pc, c);
}

// -- ALU immediate / register --

#[derive(Clone, Copy)]
enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    SetLt,
    SetLtu,
}

fn do_alu(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    a: TempIdx,
    b: TempIdx,
    op: AluOp,
) -> bool {
    let t = ir.new_temp(Type::I64);
    match op {
        AluOp::Add => ir.gen_add(Type::I64, t, a, b),
        AluOp::Sub => ir.gen_sub(Type::I64, t, a, b),
        AluOp::And => ir.gen_and(Type::I64, t, a, b),
        AluOp::Or => ir.gen_or(Type::I64, t, a, b),
        AluOp::Xor => ir.gen_xor(Type::I64, t, a, b),
        AluOp::SetLt => ir.gen_setcond(Type::I64, t, a, b, Cond::Lt),
        AluOp::SetLtu => ir.gen_setcond(Type::I64, t, a, b, Cond::Ltu),
    };
    write_gpr(ctx, ir, rd, t);
    true
}

fn do_alu_imm(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    imm: i64,
    op: AluOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let b = ir.new_const(Type::I64, imm as u64);
    do_alu(ctx, ir, rd, a, b, op)
}

fn do_alu_reg(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    rs2: i64,
    op: AluOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let b = gpr(ctx, rs2);
    do_alu(ctx, ir, rd, a, b, op)
}

// -- Shifts --

#[derive(Clone, Copy)]
enum ShiftOp {
    Shl,
    Shr,
    Sar,
}

fn do_shift_imm(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    shamt: i64,
    op: ShiftOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let b = ir.new_const(Type::I64, shamt as u64);
    let t = ir.new_temp(Type::I64);
    match op {
        ShiftOp::Shl => ir.gen_shl(Type::I64, t, a, b),
        ShiftOp::Shr => ir.gen_shr(Type::I64, t, a, b),
        ShiftOp::Sar => ir.gen_sar(Type::I64, t, a, b),
    };
    write_gpr(ctx, ir, rd, t);
    true
}

/// Register-register shift: the shift amount is the low 6 bits of
/// `rs2` (RV64 shifts use a 6-bit amount).
fn do_shift_reg(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    rs2: i64,
    op: ShiftOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let raw = gpr(ctx, rs2);
    let mask = ir.new_const(Type::I64, 0x3f);
    let amt = ir.new_temp(Type::I64);
    ir.gen_and(Type::I64, amt, raw, mask);
    let t = ir.new_temp(Type::I64);
    match op {
        ShiftOp::Shl => ir.gen_shl(Type::I64, t, a, amt),
        ShiftOp::Shr => ir.gen_shr(Type::I64, t, a, amt),
        ShiftOp::Sar => ir.gen_sar(Type::I64, t, a, amt),
    };
    write_gpr(ctx, ir, rd, t);
    true
}

// -- W-suffix (32-bit, sign-extended result) ALU --

fn sext32(ir: &mut Context, t: TempIdx) -> TempIdx {
    let lo = ir.new_temp(Type::I32);
    ir.gen_extrl_i64_i32(lo, t);
    let out = ir.new_temp(Type::I64);
    ir.gen_ext_i32_i64(out, lo);
    out
}

fn uext32(ir: &mut Context, t: TempIdx) -> TempIdx {
    let lo = ir.new_temp(Type::I32);
    ir.gen_extrl_i64_i32(lo, t);
    let out = ir.new_temp(Type::I64);
    ir.gen_ext_u32_i64(out, lo);
    out
}

fn do_alu_imm_w(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    imm: i64,
) -> bool {
    // addiw: only the low 32 bits of the sum matter, regardless of
    // rs1's upper bits, so no pre-truncation of the operand is needed.
    let a = gpr(ctx, rs1);
    let b = ir.new_const(Type::I64, imm as u64);
    let raw = ir.new_temp(Type::I64);
    ir.gen_add(Type::I64, raw, a, b);
    let res = sext32(ir, raw);
    write_gpr(ctx, ir, rd, res);
    true
}

fn do_alu_reg_w(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    rs2: i64,
    op: AluOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let b = gpr(ctx, rs2);
    let raw = ir.new_temp(Type::I64);
    match op {
        AluOp::Add => ir.gen_add(Type::I64, raw, a, b),
        AluOp::Sub => ir.gen_sub(Type::I64, raw, a, b),
        _ => unreachable!("do_alu_reg_w only used for add/sub"),
    };
    let res = sext32(ir, raw);
    write_gpr(ctx, ir, rd, res);
    true
}

fn do_shift_imm_w(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    shamt: i64,
    op: ShiftOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let shamt_c = ir.new_const(Type::I64, shamt as u64);
    let res = match op {
        ShiftOp::Shl => {
            let raw = ir.new_temp(Type::I64);
            ir.gen_shl(Type::I64, raw, a, shamt_c);
            sext32(ir, raw)
        }
        ShiftOp::Shr => {
            let az = uext32(ir, a);
            let raw = ir.new_temp(Type::I64);
            ir.gen_shr(Type::I64, raw, az, shamt_c);
            sext32(ir, raw)
        }
        ShiftOp::Sar => {
            let as_ = sext32(ir, a);
            let raw = ir.new_temp(Type::I64);
            ir.gen_sar(Type::I64, raw, as_, shamt_c);
            raw
        }
    };
    write_gpr(ctx, ir, rd, res);
    true
}

fn do_shift_reg_w(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    rs2: i64,
    op: ShiftOp,
) -> bool {
    let a = gpr(ctx, rs1);
    let raw_shamt = gpr(ctx, rs2);
    let mask = ir.new_const(Type::I64, 0x1f);
    let amt = ir.new_temp(Type::I64);
    ir.gen_and(Type::I64, amt, raw_shamt, mask);
    let res = match op {
        ShiftOp::Shl => {
            let raw = ir.new_temp(Type::I64);
            ir.gen_shl(Type::I64, raw, a, amt);
            sext32(ir, raw)
        }
        ShiftOp::Shr => {
            let az = uext32(ir, a);
            let raw = ir.new_temp(Type::I64);
            ir.gen_shr(Type::I64, raw, az, amt);
            sext32(ir, raw)
        }
        ShiftOp::Sar => {
            let as_ = sext32(ir, a);
            let raw = ir.new_temp(Type::I64);
            ir.gen_sar(Type::I64, raw, as_, amt);
            raw
        }
    };
    write_gpr(ctx, ir, rd, res);
    true
}

fn do_mul_w(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    rs2: i64,
) -> bool {
    let a = gpr(ctx, rs1);
    let b = gpr(ctx, rs2);
    let raw = ir.new_temp(Type::I64);
    ir.gen_mul(Type::I64, raw, a, b);
    let res = sext32(ir, raw);
    write_gpr(ctx, ir, rd, res);
    true
}

// -- Branches --

fn do_branch(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rs1: i64,
    rs2: i64,
    imm: i64,
    cond: Cond,
) -> bool {
    let pc_cur = ctx.base.pc_next;
    let len = ctx.cur_insn_len as u64;
    let a = gpr(ctx, rs1);
    let b = gpr(ctx, rs2);
    let label = ir.new_label();
    ir.gen_brcond(Type::I64, a, b, cond, label);

    // Not-taken: fall through to the next instruction.
    let nt_pc = pc_cur.wrapping_add(len);
    ir.gen_goto_tb(0);
    set_pc_const(ctx, ir, nt_pc);
    ir.gen_exit_tb(0);

    ir.gen_set_label(label);

    // Taken: branch target is a compile-time constant.
    let t_pc = (pc_cur as i64).wrapping_add(imm) as u64;
    ir.gen_goto_tb(1);
    set_pc_const(ctx, ir, t_pc);
    ir.gen_exit_tb(1);

    ctx.base.is_jmp = DisasJumpType::NoReturn;
    true
}

// -- Jumps --

fn do_jal(ctx: &mut RiscvDisasContext, ir: &mut Context, rd: i64, imm: i64) -> bool {
    let pc_cur = ctx.base.pc_next;
    let link = pc_cur.wrapping_add(ctx.cur_insn_len as u64);
    if rd != 0 {
        let link_c = ir.new_const(Type::I64, link);
        ir.gen_mov(Type::I64, ctx.gpr[rd as usize], link_c);
    }
    let target = (pc_cur as i64).wrapping_add(imm) as u64;
    ir.gen_goto_tb(0);
    set_pc_const(ctx, ir, target);
    ir.gen_exit_tb(0);
    ctx.base.is_jmp = DisasJumpType::NoReturn;
    true
}

fn do_jalr(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    imm: i64,
) -> bool {
    let pc_cur = ctx.base.pc_next;
    let link = pc_cur.wrapping_add(ctx.cur_insn_len as u64);
    // Read rs1 before writing rd so `jalr rs1, rs1, imm` works.
    let rs1_val = gpr(ctx, rs1);
    let imm_c = ir.new_const(Type::I64, imm as u64);
    let sum = ir.new_temp(Type::I64);
    ir.gen_add(Type::I64, sum, rs1_val, imm_c);
    let mask = ir.new_const(Type::I64, !1i64 as u64);
    let target = ir.new_temp(Type::I64);
    ir.gen_and(Type::I64, target, sum, mask);

    if rd != 0 {
        let link_c = ir.new_const(Type::I64, link);
        ir.gen_mov(Type::I64, ctx.gpr[rd as usize], link_c);
    }
    ir.gen_mov(Type::I64, ctx.pc, target);
    ir.gen_exit_tb(TB_EXIT_NOCHAIN as u64);
    ctx.base.is_jmp = DisasJumpType::NoReturn;
    true
}

// -- Loads / stores --

fn do_load(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    rs1: i64,
    imm: i64,
    memop: MemOp,
) -> bool {
    let base = gpr(ctx, rs1);
    let imm_c = ir.new_const(Type::I64, imm as u64);
    let addr = ir.new_temp(Type::I64);
    ir.gen_add(Type::I64, addr, base, imm_c);
    let dst = ir.new_temp(Type::I64);
    ir.gen_qemu_ld(Type::I64, dst, addr, memop.bits() as u32);
    write_gpr(ctx, ir, rd, dst);
    true
}

fn do_store(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rs1: i64,
    rs2: i64,
    imm: i64,
    memop: MemOp,
) -> bool {
    let base = gpr(ctx, rs1);
    let imm_c = ir.new_const(Type::I64, imm as u64);
    let addr = ir.new_temp(Type::I64);
    ir.gen_add(Type::I64, addr, base, imm_c);
    let val = gpr(ctx, rs2);
    ir.gen_qemu_st(Type::I64, val, addr, memop.bits() as u32);
    true
}

// -- Division / remainder --
//
// x86's idiv/div trap on divisor == 0 and on signed overflow
// (MIN / -1). RISC-V defines both as returning a sentinel instead of
// trapping, so the divisor (and, for signed division, the dividend)
// are sanitized before the hardware op and the real answer is
// substituted back in afterwards with a chain of movcond selects.

fn do_div_signed(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    a: TempIdx,
    b: TempIdx,
    min_val: i64,
) {
    let ty = Type::I64;
    let zero = ir.new_const(ty, 0);
    let one = ir.new_const(ty, 1);
    let neg_one = ir.new_const(ty, (-1i64) as u64);
    let min_c = ir.new_const(ty, min_val as u64);

    let safe_b = ir.new_temp(ty);
    ir.gen_movcond(ty, safe_b, b, zero, one, b, Cond::Eq);

    let is_min = ir.new_temp(ty);
    ir.gen_setcond(ty, is_min, a, min_c, Cond::Eq);
    let is_neg1 = ir.new_temp(ty);
    ir.gen_setcond(ty, is_neg1, safe_b, neg_one, Cond::Eq);
    let is_overflow = ir.new_temp(ty);
    ir.gen_and(ty, is_overflow, is_min, is_neg1);

    let safe_b2 = ir.new_temp(ty);
    ir.gen_movcond(ty, safe_b2, is_overflow, one, one, safe_b, Cond::Eq);

    let raw = ir.new_temp(ty);
    ir.gen_divs(ty, raw, a, safe_b2);

    let res1 = ir.new_temp(ty);
    ir.gen_movcond(ty, res1, is_overflow, one, min_c, raw, Cond::Eq);

    let is_zero_b = ir.new_temp(ty);
    ir.gen_setcond(ty, is_zero_b, b, zero, Cond::Eq);
    let res2 = ir.new_temp(ty);
    ir.gen_movcond(ty, res2, is_zero_b, one, neg_one, res1, Cond::Eq);

    write_gpr(ctx, ir, rd, res2);
}

fn do_rem_signed(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    a: TempIdx,
    b: TempIdx,
    min_val: i64,
) {
    let ty = Type::I64;
    let zero = ir.new_const(ty, 0);
    let one = ir.new_const(ty, 1);
    let neg_one = ir.new_const(ty, (-1i64) as u64);
    let min_c = ir.new_const(ty, min_val as u64);

    let safe_b = ir.new_temp(ty);
    ir.gen_movcond(ty, safe_b, b, zero, one, b, Cond::Eq);

    let is_min = ir.new_temp(ty);
    ir.gen_setcond(ty, is_min, a, min_c, Cond::Eq);
    let is_neg1 = ir.new_temp(ty);
    ir.gen_setcond(ty, is_neg1, safe_b, neg_one, Cond::Eq);
    let is_overflow = ir.new_temp(ty);
    ir.gen_and(ty, is_overflow, is_min, is_neg1);

    let safe_b2 = ir.new_temp(ty);
    ir.gen_movcond(ty, safe_b2, is_overflow, one, one, safe_b, Cond::Eq);

    let raw = ir.new_temp(ty);
    ir.gen_rems(ty, raw, a, safe_b2);

    let res1 = ir.new_temp(ty);
    ir.gen_movcond(ty, res1, is_overflow, one, zero, raw, Cond::Eq);

    let is_zero_b = ir.new_temp(ty);
    ir.gen_setcond(ty, is_zero_b, b, zero, Cond::Eq);
    let res2 = ir.new_temp(ty);
    ir.gen_movcond(ty, res2, is_zero_b, one, a, res1, Cond::Eq);

    write_gpr(ctx, ir, rd, res2);
}

fn do_div_unsigned(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    a: TempIdx,
    b: TempIdx,
    sext_result: bool,
) {
    let ty = Type::I64;
    let zero = ir.new_const(ty, 0);
    let one = ir.new_const(ty, 1);
    let all_ones = ir.new_const(ty, u64::MAX);

    let safe_b = ir.new_temp(ty);
    ir.gen_movcond(ty, safe_b, b, zero, one, b, Cond::Eq);
    let raw = ir.new_temp(ty);
    ir.gen_divu(ty, raw, a, safe_b);
    let is_zero_b = ir.new_temp(ty);
    ir.gen_setcond(ty, is_zero_b, b, zero, Cond::Eq);
    let mut res = ir.new_temp(ty);
    ir.gen_movcond(ty, res, is_zero_b, one, all_ones, raw, Cond::Eq);
    if sext_result {
        res = sext32(ir, res);
    }
    write_gpr(ctx, ir, rd, res);
}

fn do_rem_unsigned(
    ctx: &mut RiscvDisasContext,
    ir: &mut Context,
    rd: i64,
    a: TempIdx,
    b: TempIdx,
    sext_result: bool,
) {
    let ty = Type::I64;
    let zero = ir.new_const(ty, 0);
    let one = ir.new_const(ty, 1);

    let safe_b = ir.new_temp(ty);
    ir.gen_movcond(ty, safe_b, b, zero, one, b, Cond::Eq);
    let raw = ir.new_temp(ty);
    ir.gen_remu(ty, raw, a, safe_b);
    let is_zero_b = ir.new_temp(ty);
    ir.gen_setcond(ty, is_zero_b, b, zero, Cond::Eq);
    let mut res = ir.new_temp(ty);
    ir.gen_movcond(ty, res, is_zero_b, one, a, raw, Cond::Eq);
    if sext_result {
        res = sext32(ir, res);
    }
    write_gpr(ctx, ir, rd, res);
}

/// `mulhsu rd, rs1, rs2` computes the high 64 bits of the signed (rs1)
/// times unsigned (rs2) product — `muluh(rs1,rs2) - (rs1 < 0 ? rs2 : 0)`.
fn do_mulhsu(ctx: &mut RiscvDisasContext, ir: &mut Context, rd: i64, rs1: i64, rs2: i64) -> bool {
    let ty = Type::I64;
    let a = gpr(ctx, rs1);
    let b = gpr(ctx, rs2);
    let zero = ir.new_const(ty, 0);
    let one = ir.new_const(ty, 1);

    let hi = ir.new_temp(ty);
    ir.gen_muluh(ty, hi, a, b);
    let is_neg = ir.new_temp(ty);
    ir.gen_setcond(ty, is_neg, a, zero, Cond::Lt);
    let correction = ir.new_temp(ty);
    ir.gen_movcond(ty, correction, is_neg, one, b, zero, Cond::Eq);
    let res = ir.new_temp(ty);
    ir.gen_sub(ty, res, hi, correction);
    write_gpr(ctx, ir, rd, res);
    true
}

// ---------------------------------------------------------------
// 32-bit decoder
// ---------------------------------------------------------------

impl Decode<Context> for RiscvDisasContext {
    fn trans_lui(&mut self, ir: &mut Context, a: &ArgsU) -> bool {
        let c = ir.new_const(Type::I64, a.imm as u64);
        write_gpr(self, ir, a.rd, c);
        true
    }

    fn trans_auipc(&mut self, ir: &mut Context, a: &ArgsU) -> bool {
        let target = (self.base.pc_next as i64).wrapping_add(a.imm) as u64;
        let c = ir.new_const(Type::I64, target);
        write_gpr(self, ir, a.rd, c);
        true
    }

    fn trans_jal(&mut self, ir: &mut Context, a: &ArgsJ) -> bool {
        do_jal(self, ir, a.rd, a.imm)
    }

    fn trans_jalr(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_jalr(self, ir, a.rd, a.rs1, a.imm)
    }

    fn trans_beq(&mut self, ir: &mut Context, a: &ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Eq)
    }
    fn trans_bne(&mut self, ir: &mut Context, a: &ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Ne)
    }
    fn trans_blt(&mut self, ir: &mut Context, a: &ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Lt)
    }
    fn trans_bge(&mut self, ir: &mut Context, a: &ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Ge)
    }
    fn trans_bltu(&mut self, ir: &mut Context, a: &ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Ltu)
    }
    fn trans_bgeu(&mut self, ir: &mut Context, a: &ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Geu)
    }

    fn trans_lb(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::sb())
    }
    fn trans_lh(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::sw())
    }
    fn trans_lw(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::sl())
    }
    fn trans_lbu(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::ub())
    }
    fn trans_lhu(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::uw())
    }
    fn trans_lwu(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::ul())
    }
    fn trans_ld(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::uq())
    }

    fn trans_sb(&mut self, ir: &mut Context, a: &ArgsS) -> bool {
        do_store(self, ir, a.rs1, a.rs2, a.imm, MemOp::ub())
    }
    fn trans_sh(&mut self, ir: &mut Context, a: &ArgsS) -> bool {
        do_store(self, ir, a.rs1, a.rs2, a.imm, MemOp::uw())
    }
    fn trans_sw(&mut self, ir: &mut Context, a: &ArgsS) -> bool {
        do_store(self, ir, a.rs1, a.rs2, a.imm, MemOp::ul())
    }
    fn trans_sd(&mut self, ir: &mut Context, a: &ArgsS) -> bool {
        do_store(self, ir, a.rs1, a.rs2, a.imm, MemOp::uq())
    }

    fn trans_addi(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::Add)
    }
    fn trans_slti(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::SetLt)
    }
    fn trans_sltiu(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::SetLtu)
    }
    fn trans_xori(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::Xor)
    }
    fn trans_ori(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::Or)
    }
    fn trans_andi(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::And)
    }

    fn trans_slli(&mut self, ir: &mut Context, a: &ArgsShift) -> bool {
        do_shift_imm(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Shl)
    }
    fn trans_srli(&mut self, ir: &mut Context, a: &ArgsShift) -> bool {
        do_shift_imm(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Shr)
    }
    fn trans_srai(&mut self, ir: &mut Context, a: &ArgsShift) -> bool {
        do_shift_imm(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Sar)
    }

    fn trans_add(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Add)
    }
    fn trans_sub(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Sub)
    }
    fn trans_sll(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_shift_reg(self, ir, a.rd, a.rs1, a.rs2, ShiftOp::Shl)
    }
    fn trans_slt(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::SetLt)
    }
    fn trans_sltu(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::SetLtu)
    }
    fn trans_xor(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Xor)
    }
    fn trans_srl(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_shift_reg(self, ir, a.rd, a.rs1, a.rs2, ShiftOp::Shr)
    }
    fn trans_sra(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_shift_reg(self, ir, a.rd, a.rs1, a.rs2, ShiftOp::Sar)
    }
    fn trans_or(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Or)
    }
    fn trans_and(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::And)
    }

    fn trans_fence(&mut self, ir: &mut Context, _a: &ArgsAutoFence) -> bool {
        ir.gen_mb(0);
        true
    }

    fn trans_addiw(&mut self, ir: &mut Context, a: &ArgsI) -> bool {
        do_alu_imm_w(self, ir, a.rd, a.rs1, a.imm)
    }
    fn trans_slliw(&mut self, ir: &mut Context, a: &ArgsShiftw) -> bool {
        do_shift_imm_w(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Shl)
    }
    fn trans_srliw(&mut self, ir: &mut Context, a: &ArgsShiftw) -> bool {
        do_shift_imm_w(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Shr)
    }
    fn trans_sraiw(&mut self, ir: &mut Context, a: &ArgsShiftw) -> bool {
        do_shift_imm_w(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Sar)
    }
    fn trans_addw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg_w(self, ir, a.rd, a.rs1, a.rs2, AluOp::Add)
    }
    fn trans_subw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_alu_reg_w(self, ir, a.rd, a.rs1, a.rs2, AluOp::Sub)
    }
    fn trans_sllw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_shift_reg_w(self, ir, a.rd, a.rs1, a.rs2, ShiftOp::Shl)
    }
    fn trans_srlw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_shift_reg_w(self, ir, a.rd, a.rs1, a.rs2, ShiftOp::Shr)
    }
    fn trans_sraw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_shift_reg_w(self, ir, a.rd, a.rs1, a.rs2, ShiftOp::Sar)
    }

    fn trans_ecall(&mut self, ir: &mut Context, _a: &ArgsEmpty) -> bool {
        set_pc_const(self, ir, self.base.pc_next);
        ir.gen_exit_tb(EXCP_ECALL as u64);
        self.base.is_jmp = DisasJumpType::NoReturn;
        true
    }
    fn trans_ebreak(&mut self, ir: &mut Context, _a: &ArgsEmpty) -> bool {
        set_pc_const(self, ir, self.base.pc_next);
        ir.gen_exit_tb(EXCP_EBREAK as u64);
        self.base.is_jmp = DisasJumpType::NoReturn;
        true
    }

    fn trans_mul(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let t = ir.new_temp(Type::I64);
        ir.gen_mul(Type::I64, t, x, y);
        write_gpr(self, ir, a.rd, t);
        true
    }
    fn trans_mulh(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let t = ir.new_temp(Type::I64);
        ir.gen_mulsh(Type::I64, t, x, y);
        write_gpr(self, ir, a.rd, t);
        true
    }
    fn trans_mulhsu(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_mulhsu(self, ir, a.rd, a.rs1, a.rs2)
    }
    fn trans_mulhu(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let t = ir.new_temp(Type::I64);
        ir.gen_muluh(Type::I64, t, x, y);
        write_gpr(self, ir, a.rd, t);
        true
    }
    fn trans_div(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        do_div_signed(self, ir, a.rd, x, y, i64::MIN);
        true
    }
    fn trans_divu(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        do_div_unsigned(self, ir, a.rd, x, y, false);
        true
    }
    fn trans_rem(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        do_rem_signed(self, ir, a.rd, x, y, i64::MIN);
        true
    }
    fn trans_remu(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        do_rem_unsigned(self, ir, a.rd, x, y, false);
        true
    }

    fn trans_mulw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        do_mul_w(self, ir, a.rd, a.rs1, a.rs2)
    }
    fn trans_divw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let xs = sext32(ir, x);
        let ys = sext32(ir, y);
        do_div_signed(self, ir, a.rd, xs, ys, -2_147_483_648i64);
        true
    }
    fn trans_divuw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let xu = uext32(ir, x);
        let yu = uext32(ir, y);
        do_div_unsigned(self, ir, a.rd, xu, yu, true);
        true
    }
    fn trans_remw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let xs = sext32(ir, x);
        let ys = sext32(ir, y);
        do_rem_signed(self, ir, a.rd, xs, ys, -2_147_483_648i64);
        true
    }
    fn trans_remuw(&mut self, ir: &mut Context, a: &ArgsR) -> bool {
        let x = gpr(self, a.rs1);
        let y = gpr(self, a.rs2);
        let xu = uext32(ir, x);
        let yu = uext32(ir, y);
        do_rem_unsigned(self, ir, a.rd, xu, yu, true);
        true
    }
}

// ---------------------------------------------------------------
// 16-bit (RVC) decoder
// ---------------------------------------------------------------

impl Decode16<Context> for RiscvDisasContext {
    fn trans_addi(&mut self, ir: &mut Context, a: &d16::ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::Add)
    }
    fn trans_lw(&mut self, ir: &mut Context, a: &d16::ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::sl())
    }
    fn trans_ld(&mut self, ir: &mut Context, a: &d16::ArgsI) -> bool {
        do_load(self, ir, a.rd, a.rs1, a.imm, MemOp::uq())
    }
    fn trans_sw(&mut self, ir: &mut Context, a: &d16::ArgsS) -> bool {
        do_store(self, ir, a.rs1, a.rs2, a.imm, MemOp::ul())
    }
    fn trans_sd(&mut self, ir: &mut Context, a: &d16::ArgsS) -> bool {
        do_store(self, ir, a.rs1, a.rs2, a.imm, MemOp::uq())
    }
    fn trans_addiw(&mut self, ir: &mut Context, a: &d16::ArgsI) -> bool {
        do_alu_imm_w(self, ir, a.rd, a.rs1, a.imm)
    }
    fn trans_lui(&mut self, ir: &mut Context, a: &d16::ArgsU) -> bool {
        let c = ir.new_const(Type::I64, a.imm as u64);
        write_gpr(self, ir, a.rd, c);
        true
    }
    fn trans_srli(&mut self, ir: &mut Context, a: &d16::ArgsShift) -> bool {
        do_shift_imm(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Shr)
    }
    fn trans_srai(&mut self, ir: &mut Context, a: &d16::ArgsShift) -> bool {
        do_shift_imm(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Sar)
    }
    fn trans_andi(&mut self, ir: &mut Context, a: &d16::ArgsI) -> bool {
        do_alu_imm(self, ir, a.rd, a.rs1, a.imm, AluOp::And)
    }
    fn trans_sub(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Sub)
    }
    fn trans_xor(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Xor)
    }
    fn trans_or(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Or)
    }
    fn trans_and(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::And)
    }
    fn trans_subw(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg_w(self, ir, a.rd, a.rs1, a.rs2, AluOp::Sub)
    }
    fn trans_addw(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg_w(self, ir, a.rd, a.rs1, a.rs2, AluOp::Add)
    }
    fn trans_jal(&mut self, ir: &mut Context, a: &d16::ArgsJ) -> bool {
        do_jal(self, ir, a.rd, a.imm)
    }
    fn trans_beq(&mut self, ir: &mut Context, a: &d16::ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Eq)
    }
    fn trans_bne(&mut self, ir: &mut Context, a: &d16::ArgsB) -> bool {
        do_branch(self, ir, a.rs1, a.rs2, a.imm, Cond::Ne)
    }
    fn trans_slli(&mut self, ir: &mut Context, a: &d16::ArgsShift) -> bool {
        do_shift_imm(self, ir, a.rd, a.rs1, a.shamt, ShiftOp::Shl)
    }
    fn trans_ebreak(&mut self, ir: &mut Context, _a: &d16::ArgsEmpty) -> bool {
        set_pc_const(self, ir, self.base.pc_next);
        ir.gen_exit_tb(EXCP_EBREAK as u64);
        self.base.is_jmp = DisasJumpType::NoReturn;
        true
    }
    fn trans_jalr(&mut self, ir: &mut Context, a: &d16::ArgsI) -> bool {
        do_jalr(self, ir, a.rd, a.rs1, a.imm)
    }
    fn trans_add(&mut self, ir: &mut Context, a: &d16::ArgsR) -> bool {
        do_alu_reg(self, ir, a.rd, a.rs1, a.rs2, AluOp::Add)
    }
}
