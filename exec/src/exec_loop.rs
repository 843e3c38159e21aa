use crate::{pages, ExecEnv, GuestCpu, MIN_CODE_BUF_REMAINING};
use tcg_backend::translate::translate;
use tcg_backend::HostCodeGen;
use tcg_core::tb::TB_EXIT_NOCHAIN;

/// Reason the execution loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// TB returned a non-zero exit value.
    Exit(usize),
    /// Code buffer is full; caller should flush and retry.
    BufferFull,
}

/// Main CPU execution loop.
///
/// Repeatedly looks up or translates TBs and executes them
/// until a TB returns a non-zero exit value or the code buffer
/// is exhausted.
///
/// # Safety
/// The caller must ensure `cpu.env_ptr()` points to a valid
/// CPU state struct matching the globals in `env.ir_ctx`.
pub unsafe fn cpu_exec_loop<B, C>(
    env: &mut ExecEnv<B>,
    cpu: &mut C,
) -> ExitReason
where
    B: HostCodeGen,
    C: GuestCpu,
{
    let mut next_tb_hint: Option<usize> = None;

    loop {
        env.stats.loop_iters += 1;

        let tb_idx = match next_tb_hint.take() {
            Some(idx) => {
                env.stats.hint_used += 1;
                idx
            }
            None => {
                let pc = cpu.get_pc();
                let flags = cpu.get_flags();
                match tb_find(env, cpu, pc, flags) {
                    Some(idx) => idx,
                    None => return ExitReason::BufferFull,
                }
            }
        };

        let exit_val = cpu_tb_exec(env, cpu, tb_idx);
        match exit_val {
            v @ 0..=1 => {
                // goto_tb slot 0 or 1 — chainable direct branch.
                let slot = v;
                env.stats.chain_exit[slot] += 1;
                let pc = cpu.get_pc();
                let flags = cpu.get_flags();
                if let Some(dst) = env.tb_store.get(tb_idx).jmp_dest[slot] {
                    if env.tb_store.get(dst).matches(pc, 0, flags) {
                        env.stats.chain_already += 1;
                        next_tb_hint = Some(dst);
                        continue;
                    }
                }
                let gen = env.tb_store.generation();
                let dst = match tb_find(env, cpu, pc, flags) {
                    Some(idx) => idx,
                    None => return ExitReason::BufferFull,
                };
                // tb_find may have had to reclaim the arena (full
                // tb_flush) to make room, in which case tb_idx no
                // longer names a live TB — chaining from it would be
                // a stale write into a cleared store.
                if env.config.chaining_enabled
                    && env.tb_store.generation() == gen
                {
                    env.tb_store.add_jump(
                        tb_idx,
                        slot,
                        dst,
                        &env.code_buf,
                        &env.backend,
                    );
                    env.stats.chain_patched += 1;
                }
                next_tb_hint = Some(dst);
            }
            v if v == TB_EXIT_NOCHAIN as usize => {
                // Indirect jump (JALR etc.) — simplified
                // lookup_and_goto_ptr: single-entry cache per TB.
                env.stats.nochain_exit += 1;
                let pc = cpu.get_pc();
                let flags = cpu.get_flags();
                if let Some(dst) = env.tb_store.get(tb_idx).exit_target {
                    if env.tb_store.get(dst).matches(pc, 0, flags) {
                        next_tb_hint = Some(dst);
                        continue;
                    }
                }
                let gen = env.tb_store.generation();
                let dst = match tb_find(env, cpu, pc, flags) {
                    Some(idx) => idx,
                    None => return ExitReason::BufferFull,
                };
                if env.tb_store.generation() == gen {
                    env.tb_store.get_mut(tb_idx).exit_target = Some(dst);
                }
                next_tb_hint = Some(dst);
            }
            _ => {
                env.stats.real_exit += 1;
                return ExitReason::Exit(exit_val);
            }
        }
    }
}

/// Find a TB for the given (pc, flags), translating if needed.
///
/// Returns `None` if the code buffer is too full to translate.
fn tb_find<B, C>(
    env: &mut ExecEnv<B>,
    cpu: &mut C,
    pc: u64,
    flags: u32,
) -> Option<usize>
where
    B: HostCodeGen,
    C: GuestCpu,
{
    if env.config.tb_cache_enabled {
        // Fast path: jump cache
        if let Some(idx) = env.jump_cache.lookup(pc) {
            if env.tb_store.get(idx).matches(pc, 0, flags) {
                env.stats.jc_hit += 1;
                return Some(idx);
            }
        }

        // Slow path: hash table
        if let Some(idx) = env.tb_store.lookup(pc, flags) {
            env.stats.ht_hit += 1;
            env.jump_cache.insert(pc, idx);
            return Some(idx);
        }
    }

    // Miss: translate a new TB
    env.stats.translate += 1;
    tb_gen_code(env, cpu, pc, flags)
}

/// Translate guest code at `pc` into a new TB.
///
/// Returns `None` if the code buffer has insufficient space.
fn tb_gen_code<B, C>(
    env: &mut ExecEnv<B>,
    cpu: &mut C,
    pc: u64,
    flags: u32,
) -> Option<usize>
where
    B: HostCodeGen,
    C: GuestCpu,
{
    if env.code_buf.remaining() < MIN_CODE_BUF_REMAINING && !env.reclaim() {
        return None;
    }

    // Allocate TB
    let cflags = env.config.max_block_size
        & tcg_core::tb::cflags::CF_COUNT_MASK;
    let tb_idx = env.tb_store.alloc(pc, flags, cflags);

    // Generate IR
    env.ir_ctx.reset();
    let guest_size = cpu.gen_code(
        &mut env.ir_ctx,
        pc,
        tcg_core::tb::TranslationBlock::max_insns(cflags),
        &env.breakpoints,
    );
    env.tb_store.get_mut(tb_idx).size = guest_size;

    // Clear goto_tb tracking
    env.backend.clear_goto_tb_offsets();

    // Generate host code
    env.code_buf.set_writable().expect("set_writable failed");
    let (host_offset, insns) =
        translate(&mut env.ir_ctx, &env.backend, &mut env.code_buf);
    let host_size = env.code_buf.offset() - host_offset;
    env.code_buf
        .set_executable()
        .expect("set_executable failed");

    // Record host code location in TB
    let tb = env.tb_store.get_mut(tb_idx);
    tb.host_offset = host_offset;
    tb.host_size = host_size;
    tb.icount = insns.len() as u16;
    tb.search = tcg_core::search::encode_search(pc, &insns);

    // Record goto_tb offsets for future TB chaining
    let offsets = env.backend.goto_tb_offsets();
    for (i, &(jmp, reset)) in offsets.iter().enumerate().take(2) {
        tb.set_jmp_insn_offset(i, jmp as u32);
        tb.set_jmp_reset_offset(i, reset as u32);
    }

    // Track which physical page(s) this TB's code came from, so a later
    // store to one of them can find and invalidate it (§4.1 SMC path).
    let phys_pc = tb.phys_pc;
    tb.page_addr = pages::page_addrs(phys_pc, guest_size);
    pages::link_tb_page(&mut env.page_table, &mut env.tb_store, tb_idx);

    // Insert into caches
    if env.config.tb_cache_enabled {
        env.tb_store.insert(tb_idx);
        env.jump_cache.insert(pc, tb_idx);
    }

    Some(tb_idx)
}

/// Execute a single TB and return the exit value.
///
/// # Safety
/// Called from the unsafe `cpu_exec_loop`.
unsafe fn cpu_tb_exec<B, C>(
    env: &mut ExecEnv<B>,
    cpu: &mut C,
    tb_idx: usize,
) -> usize
where
    B: HostCodeGen,
    C: GuestCpu,
{
    let tb = env.tb_store.get(tb_idx);
    let tb_ptr = env.code_buf.ptr_at(tb.host_offset);
    let env_ptr = cpu.env_ptr();

    // Prologue signature:
    //   fn(env: *mut u8, tb_ptr: *const u8) -> usize
    let prologue_fn: unsafe extern "C" fn(*mut u8, *const u8) -> usize =
        core::mem::transmute(env.code_buf.base_ptr());
    prologue_fn(env_ptr, tb_ptr)
}
