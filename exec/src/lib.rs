//! TCG Execution Engine — TB cache and CPU execution loop.
//!
//! Provides the execution loop that drives the
//! lookup → translate → execute cycle, with TB caching via
//! a global hash table and per-CPU jump cache.
//!
//! One `ExecEnv` drives exactly one guest CPU at a time: the code
//! buffer, TB store and jump cache here are plain, non-atomic
//! structures, not shared across threads. Running more than one
//! guest CPU means running more than one `ExecEnv`, each with its
//! own code buffer and TB store — see DESIGN.md.
//!
//! Reference: `~/qemu/accel/tcg/cpu-exec.c`,
//! `~/qemu/accel/tcg/translate-all.c`.

pub mod exec_loop;
pub mod pages;
pub mod tb_store;

pub use exec_loop::{cpu_exec_loop, ExitReason};
pub use tb_store::TbStore;

use std::fmt;

use tcg_backend::code_buffer::CodeBuffer;
use tcg_backend::HostCodeGen;
use tcg_core::breakpoint::BreakpointList;
use tcg_core::page::{PageDesc, PageTable};
use tcg_core::tb::JumpCache;
use tcg_core::tlb::CpuTlb;
use tcg_core::Context;

/// Execution statistics for profiling the TB lookup/chain
/// pipeline.
#[derive(Default)]
pub struct ExecStats {
    pub loop_iters: u64,
    // TB lookup
    pub jc_hit: u64,
    pub ht_hit: u64,
    pub translate: u64,
    // Exit types
    pub chain_exit: [u64; 2],
    pub nochain_exit: u64,
    pub real_exit: u64,
    // Chaining
    pub chain_patched: u64,
    pub chain_already: u64,
    // Hint
    pub hint_used: u64,
}

impl fmt::Display for ExecStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_lookup = self.jc_hit + self.ht_hit + self.translate;
        writeln!(f, "=== TCG Execution Stats ===")?;
        writeln!(f, "loop iters:    {}", self.loop_iters)?;
        writeln!(f, "--- TB lookup ---")?;
        writeln!(
            f,
            "  jc hit:      {} ({:.1}%)",
            self.jc_hit,
            pct(self.jc_hit, total_lookup)
        )?;
        writeln!(
            f,
            "  ht hit:      {} ({:.1}%)",
            self.ht_hit,
            pct(self.ht_hit, total_lookup)
        )?;
        writeln!(
            f,
            "  translate:   {} ({:.1}%)",
            self.translate,
            pct(self.translate, total_lookup)
        )?;
        writeln!(f, "--- Exit types ---")?;
        writeln!(f, "  chain[0]:    {}", self.chain_exit[0])?;
        writeln!(f, "  chain[1]:    {}", self.chain_exit[1])?;
        writeln!(f, "  nochain:     {}", self.nochain_exit)?;
        writeln!(f, "  real exit:   {}", self.real_exit)?;
        writeln!(f, "--- Chaining ---")?;
        writeln!(f, "  patched:     {}", self.chain_patched)?;
        writeln!(f, "  already:     {}", self.chain_already)?;
        writeln!(f, "--- Hint ---")?;
        writeln!(f, "  hint used:   {}", self.hint_used)?;
        Ok(())
    }
}

fn pct(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64 * 100.0
    }
}

/// Trait for guest CPU state used by the execution loop.
pub trait GuestCpu {
    fn get_pc(&self) -> u64;
    fn get_flags(&self) -> u32;
    /// Translate up to `max_insns` guest instructions starting at `pc`
    /// into `ir`, stopping early at the first PC in `breakpoints` (per
    /// scenario E6). Returns the guest byte size covered.
    fn gen_code(
        &mut self,
        ir: &mut Context,
        pc: u64,
        max_insns: u32,
        breakpoints: &BreakpointList,
    ) -> u32;
    fn env_ptr(&mut self) -> *mut u8;
}

/// Minimum remaining bytes in code buffer before refusing
/// to translate a new TB.
const MIN_CODE_BUF_REMAINING: usize = 4096;

/// Default initial code buffer size (16 MiB, matching the teacher's
/// hardcoded arena size).
const DEFAULT_INITIAL_CODE_BUF_SIZE: usize = 16 * 1024 * 1024;

/// Translator-wide tunables, settable via the `tlib_set_*` family
/// below — the external-ABI surface named in spec.md §6. Not a
/// file-based config: overridden from the CLI/environment by whatever
/// embeds `tcg-exec` (see `tcg-linux-user`'s `main`).
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Code buffer size to allocate in `ExecEnv::new`.
    pub initial_code_buf_size: usize,
    /// Upper bound the arena is allowed to grow to across flush
    /// cycles. Not yet enforced by a growth path (see DESIGN.md); kept
    /// so the ABI surface is complete even though `tb_gen_code`
    /// currently treats a full buffer as a hard `BufferFull`.
    pub max_code_buf_size: usize,
    /// Maximum guest instructions per TB (0 = tcg-core's built-in
    /// default of 512, via `TranslationBlock::max_insns`).
    pub max_block_size: u32,
    /// Whether translated TBs are cached in the physical hash table
    /// and jump cache. Disabling forces every lookup to retranslate —
    /// useful for isolating a miscompile to the dispatcher vs. the
    /// code generator.
    pub tb_cache_enabled: bool,
    /// Whether `goto_tb` exits get chained into direct host jumps.
    /// Disabling forces every chainable exit back through the full
    /// TB-lookup path, trading throughput for simpler single-stepping.
    pub chaining_enabled: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            initial_code_buf_size: DEFAULT_INITIAL_CODE_BUF_SIZE,
            max_code_buf_size: DEFAULT_INITIAL_CODE_BUF_SIZE,
            max_block_size: 0,
            tb_cache_enabled: true,
            chaining_enabled: true,
        }
    }
}

impl TranslatorConfig {
    /// `tlib_set_maximum_block_size` — cap guest instructions per TB.
    /// `0` restores the default (512).
    pub fn tlib_set_maximum_block_size(&mut self, n: u32) {
        self.max_block_size = n;
    }

    /// `tlib_set_chaining_enabled` — toggle direct TB-to-TB jump
    /// patching.
    pub fn tlib_set_chaining_enabled(&mut self, enabled: bool) {
        self.chaining_enabled = enabled;
    }

    /// `tlib_set_tb_cache_enabled` — toggle the physical hash table
    /// and jump cache.
    pub fn tlib_set_tb_cache_enabled(&mut self, enabled: bool) {
        self.tb_cache_enabled = enabled;
    }
}

/// Breakpoint or SMC-fault state-restoration lookup failed because
/// `host_pc` does not fall inside any live TB's generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreContextError;

/// Everything one guest CPU needs to translate and run code: the
/// TB cache, the generated-code buffer, the host backend, the IR
/// scratch context and the per-CPU jump cache.
///
/// Deliberately plain fields, no `Arc`/`Mutex`/atomics: a single
/// `ExecEnv` is driven by a single caller at a time, the way tlib
/// drives one vCPU per native thread with its own private state.
/// Multi-vCPU setups run one `ExecEnv` per vCPU.
pub struct ExecEnv<B: HostCodeGen> {
    pub tb_store: TbStore,
    pub code_buf: CodeBuffer,
    pub backend: B,
    pub code_gen_start: usize,
    pub ir_ctx: Context,
    pub jump_cache: JumpCache,
    pub stats: ExecStats,
    pub config: TranslatorConfig,
    /// Per-(guest)-page TB lists and SMC code bitmaps, consulted when
    /// linking a freshly translated TB (`exec_loop::tb_gen_code`) and
    /// when a store falls through the NOTDIRTY slow path
    /// (`notdirty_store`). See `pages`.
    pub page_table: PageTable<PageDesc>,
    /// Software TLB for this guest CPU. The bundled linux-user frontend
    /// bypasses it (flat `guest_base` mapping), but it's wired here so a
    /// system-mode-shaped embedder can drive `notdirty_store` through
    /// the same path tlib does.
    pub tlb: CpuTlb,
    /// Active breakpoints, consulted by the frontend's `insn_start` hook
    /// via the PCs handed to it at translation time (§3, scenario E6).
    pub breakpoints: BreakpointList,
}

impl<B: HostCodeGen> ExecEnv<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, TranslatorConfig::default())
    }

    pub fn with_config(mut backend: B, config: TranslatorConfig) -> Self {
        let mut code_buf = CodeBuffer::new(config.initial_code_buf_size)
            .expect("mmap failed");
        backend.emit_prologue(&mut code_buf);
        backend.emit_epilogue(&mut code_buf);
        let code_gen_start = code_buf.offset();

        let mut ir_ctx = Context::new();
        backend.init_context(&mut ir_ctx);

        log::debug!(
            "ExecEnv: code buffer {} bytes, max_block_size={}, \
             tb_cache={}, chaining={}",
            config.initial_code_buf_size,
            config.max_block_size,
            config.tb_cache_enabled,
            config.chaining_enabled,
        );

        Self {
            tb_store: TbStore::new(),
            code_buf,
            backend,
            code_gen_start,
            ir_ctx,
            jump_cache: JumpCache::new(),
            stats: ExecStats::default(),
            config,
            page_table: PageTable::new(),
            tlb: CpuTlb::new(),
            breakpoints: BreakpointList::new(),
        }
    }

    /// Discard all generated code and cached TBs, resetting the
    /// code buffer back to just past the prologue/epilogue.
    ///
    /// Mirrors tlib's full `tb_flush`: every TB becomes invalid, so
    /// callers must also invalidate any cached PC (jump hints held
    /// outside this `ExecEnv`).
    pub fn flush(&mut self) {
        log::debug!("tb_flush: {} TB(s) dropped", self.tb_store.len());
        self.tb_store.flush();
        self.jump_cache.invalidate();
        self.code_buf.set_offset(self.code_gen_start);
        // Every page's TB list references tb_store indices that no
        // longer exist; drop them along with the bitmaps built from
        // them rather than leaving dangling links for the next lookup.
        self.page_table.clear_tb_fields(|desc| {
            desc.first_tb = None;
            desc.invalidate_code_bitmap();
        });
        self.tlb.flush_all();
    }

    /// `tlib_invalidate_translation_cache` — full TB cache teardown, the
    /// ABI name spec.md §6 gives to what `flush` already does.
    pub fn tlib_invalidate_translation_cache(&mut self) {
        self.flush();
    }

    /// `tlib_invalidate_translation_blocks` — invalidate every TB whose
    /// code overlaps guest-physical `[start, end)`, walking the affected
    /// pages' TB lists (rather than scanning every live TB) and dropping
    /// the soft-TLB entries that page's NOTDIRTY tag depended on.
    /// `broadcast`/`other_cpus` mirror `tlib_invalidate_tb_in_other_cpus`
    /// (spec.md §5): set when a peer CPU sharing this memory must also
    /// drop any TB it cached over the same range.
    pub fn tlib_invalidate_translation_blocks(
        &mut self,
        start: u64,
        end: u64,
        broadcast: bool,
        other_cpus: Option<&mut dyn tb_store::CrossCpuInvalidate>,
    ) {
        let mut page_start = tcg_core::page::page_start(start);
        while page_start < end {
            let page_idx = tcg_core::page::page_index(page_start);
            pages::invalidate_page(
                &mut self.page_table,
                &mut self.tb_store,
                page_idx,
                &self.code_buf,
                &self.backend,
            );
            self.tlb.flush_page(page_start);
            page_start += tcg_core::page::TARGET_PAGE_SIZE;
        }

        if broadcast {
            if let Some(peers) = other_cpus {
                peers.invalidate_tb_in_other_cpus(start, end);
            }
        }
    }

    /// `tlib_restore_context` (spec.md §4.1's public contract): given a
    /// host PC where execution faulted mid-TB, find the owning TB and
    /// walk its search table back to the guest instruction boundary that
    /// was executing, so the caller can restore CPU state there before
    /// raising the guest exception.
    ///
    /// Returns the decoded boundary (guest PC plus the `INSN_START_WORDS`
    /// auxiliary data) and the 1-based count of instructions executed
    /// within the TB, or `RestoreContextError` if `host_pc` isn't inside
    /// any live TB's code.
    pub fn tlib_restore_context(
        &self,
        host_pc: usize,
        skip_current_instruction: bool,
    ) -> Result<(tcg_core::search::InsnBoundary, u32), RestoreContextError> {
        let tb_idx = self
            .tb_store
            .find_pc(host_pc)
            .ok_or(RestoreContextError)?;
        let tb = self.tb_store.get(tb_idx);
        let searched_off = (host_pc - tb.host_offset) as u64;
        tcg_core::search::restore_state(
            tb.pc,
            &tb.search,
            tb.icount as u32,
            searched_off,
            skip_current_instruction,
        )
        .ok_or(RestoreContextError)
    }

    /// Perform a tagged NOTDIRTY store: the generic soft-TLB path for a
    /// write that lands on a page holding translated code. Drives
    /// `tcg_core::tlb::notdirty_store` with a handler borrowing the page
    /// table and TB store, so a page whose code bitmap proves no overlap
    /// is left untouched and any clean page has its NOTDIRTY tag cleared.
    pub fn notdirty_store(&mut self, addr: u64, size: u32) {
        let mut handler = pages::PageNotdirtyHandler {
            page_table: &mut self.page_table,
            tb_store: &mut self.tb_store,
            code_buf: &self.code_buf,
            backend: &self.backend,
        };
        tcg_core::tlb::notdirty_store(&mut self.tlb, &mut handler, addr, size);
    }

    /// `tlib_add_breakpoint`.
    pub fn tlib_add_breakpoint(&mut self, pc: u64, flags: u32) {
        self.breakpoints.insert(pc, flags);
    }

    /// `tlib_remove_breakpoint`.
    pub fn tlib_remove_breakpoint(&mut self, pc: u64) {
        self.breakpoints.remove(pc);
    }

    /// Reclaim code buffer space when a translation can't fit: flush
    /// every cached TB, and — since the arena has just been reset by
    /// that flush — attempt a single doubling (capped at
    /// `config.max_code_buf_size`). Returns whether the buffer now has
    /// room; `false` means the arena is exhausted even empty and at
    /// its cap, which the caller must treat as fatal.
    ///
    /// Grounds spec.md §4.2's growth policy: "a single doubling
    /// attempt is permitted" per flush cycle, no further reclamation
    /// pass beyond that (Open Question, resolved in SPEC_FULL.md §D).
    pub fn reclaim(&mut self) -> bool {
        self.flush();

        let cur_cap = self.code_buf.capacity();
        if cur_cap < self.config.max_code_buf_size {
            let new_cap = (cur_cap * 2).min(self.config.max_code_buf_size);
            match CodeBuffer::new(new_cap) {
                Ok(mut new_buf) => {
                    self.backend.emit_prologue(&mut new_buf);
                    self.backend.emit_epilogue(&mut new_buf);
                    self.code_gen_start = new_buf.offset();
                    self.code_buf = new_buf;
                    log::warn!(
                        "code arena exhausted; flushed and grown {} -> {} bytes",
                        cur_cap,
                        new_cap
                    );
                }
                Err(e) => {
                    log::error!("code arena growth failed: {e}");
                }
            }
        } else {
            log::warn!(
                "code arena exhausted at cap ({} bytes); flushed, no growth",
                cur_cap
            );
        }

        self.code_buf.remaining() >= MIN_CODE_BUF_REMAINING
    }
}
