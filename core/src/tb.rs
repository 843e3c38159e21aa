use crate::page::PageTbRef;

/// A cached translated code block.
///
/// Maps to QEMU/tlib's `TranslationBlock`. Represents the mapping from a
/// guest code region, translated in a specific architectural context, to
/// a range of generated host machine code.
///
/// Pointer-graph fields tlib encodes as bit-tagged raw pointers
/// (`phys_hash_next`, `page_next[2]`, the `jmp_first`/`jmp_next[2]`
/// circular list) are rewritten here as explicit `(tb_index, slot)` pairs
/// into the dense `tbs[]` array owned by `TbStore` — see DESIGN.md.
#[derive(Debug)]
pub struct TranslationBlock {
    /// Guest virtual PC where this TB starts.
    pub pc: u64,
    /// CS base (x86) or 0 for other architectures. Part of the
    /// translation-context identity: two TBs at the same `pc` with
    /// different `cs_base` are distinct.
    pub cs_base: u64,
    /// CPU state flags that affect translation (e.g. privilege level,
    /// ISA mode). Part of the translation-context identity.
    pub flags: u32,
    /// Compile flags (instruction count limit, single-step, etc.).
    pub cflags: u32,
    /// Architecture-specific disassembly flags, opaque to the core.
    pub disas_flags: u32,
    /// Size of guest code covered by this TB, in bytes.
    pub size: u32,
    /// Number of guest instructions in this TB.
    pub icount: u16,

    /// Offset into the global code buffer where host code starts
    /// (`tc_ptr`, as an offset rather than a raw pointer).
    pub host_offset: usize,
    /// Size of generated host code in bytes.
    pub host_size: usize,
    /// LEB128-encoded search table for state restoration (`tc_search`).
    /// See `crate::search`.
    pub search: Vec<u8>,

    /// The one or two guest physical pages this TB's code was translated
    /// from. `page_addr[1] == u64::MAX` is the sentinel meaning the TB
    /// does not span a page boundary.
    pub page_addr: [u64; 2],
    /// This TB's link to the next TB in each spanned page's TB list.
    pub page_next: [Option<PageTbRef>; 2],

    /// Physical address this TB was hashed under (`phys_pc`): the
    /// guest-physical start address used as input to the hash in
    /// `TranslationBlock::hash`.
    pub phys_pc: u64,
    /// Index of the next TB in the same physical-hash bucket, or `None`.
    pub phys_hash_next: Option<usize>,

    /// Offset of the `goto_tb` jump instruction for each exit (up to 2).
    /// Used by TB chaining to atomically patch the jump target
    /// (`tb_jmp_offset` in spec terms).
    pub jmp_insn_offset: [Option<u32>; 2],
    /// Offset right after the `goto_tb` instruction for each exit. Used
    /// to reset the jump when unlinking (`tb_next_offset`).
    pub jmp_reset_offset: [Option<u32>; 2],
    /// Outbound chain target for each exit slot, once chained by
    /// `tb_add_jump`.
    pub jmp_dest: [Option<usize>; 2],
    /// Inbound chain: every `(src_tb_index, slot)` that has patched a
    /// direct jump into this TB. Stands in for the circular
    /// `jmp_first`/`jmp_next[2]` list — a self-loop sentinel is simply an
    /// empty `Vec` here.
    pub jmp_list: Vec<(usize, u8)>,

    /// Single-entry cache for the indirect-jump exit path
    /// (`lookup_and_goto_ptr`), populated the first time an indirect
    /// jump from this TB resolves to a destination.
    pub exit_target: Option<usize>,

    /// Set when this TB was invalidated while it was the CPU's
    /// currently-executing block; the dispatcher must regenerate it
    /// around the write that caused the invalidation rather than simply
    /// refetching at the post-write PC (see §4.1 SMC handling).
    pub dirty_flag: bool,
    /// True if this TB's generated code was cut short by a breakpoint or
    /// SMC write mid-translation rather than ending at a natural
    /// control-flow boundary.
    pub was_cut: bool,
    /// Guest byte size before a `was_cut` truncation, kept for
    /// diagnostics / re-translation bookkeeping.
    pub prev_size: u32,

    /// Whether this TB has been invalidated (removed from the phys hash,
    /// but the slot in `tbs[]` is reused only after the next `tb_flush`).
    pub invalid: bool,
}

/// Compile flags for TranslationBlock.cflags.
pub mod cflags {
    /// Mask for the instruction count limit (0 = no limit).
    pub const CF_COUNT_MASK: u32 = 0x0000_FFFF;
    /// Last I/O instruction in the TB.
    pub const CF_LAST_IO: u32 = 0x0001_0000;
    /// TB is being single-stepped.
    pub const CF_SINGLE_STEP: u32 = 0x0002_0000;
    /// Use icount (deterministic execution).
    pub const CF_USE_ICOUNT: u32 = 0x0004_0000;
}

/// Exit codes a TB's generated code can return to the epilogue with.
/// The low bits of a real tlib return value are the exit reason; the
/// high bits name the originating TB. This Rust rewrite keeps exit
/// reasons and TB identity in separate channels (see `tcg-exec`), so only
/// the reason constants are carried here.
///
/// Values 0 and 1 are the two chainable `goto_tb` slots and 2 is the
/// indirect-jump ("nochain") exit; `cpu_exec_loop` intercepts all three
/// before a TB's generated code is ever reported up as a real exit, so
/// guest exception indices must start at 3 to stay distinguishable.
pub const TB_EXIT_IDX0: usize = 0;
pub const TB_EXIT_IDX1: usize = 1;
pub const TB_EXIT_NOCHAIN: u32 = 2;

/// Guest exception indices used by the bundled RISC-V frontend to signal
/// why a TB exited without a chainable jump. Start at 3 — see the exit
/// code layout note above.
pub const EXCP_UNDEF: u32 = 3;
pub const EXCP_ECALL: u32 = 4;
pub const EXCP_EBREAK: u32 = 5;
/// Guest PC hit a debugger breakpoint (`CPUBreakpoint`, spec.md §3).
pub const EXCP_DEBUG: u32 = 6;

/// Bits of `encode_tb_exit`'s return value given to the exit reason;
/// the remaining high bits carry the exiting TB's dense-array index.
/// Three bits rather than two so the exception indices above have room
/// alongside the reserved 0/1/2 chaining codes.
const TB_EXIT_VAL_BITS: u32 = 3;
const TB_EXIT_VAL_MASK: u64 = (1 << TB_EXIT_VAL_BITS) - 1;

/// Pack a TB's index and its exit reason into the single word the
/// generated code's exit path hands back to the dispatcher. Keeps both
/// "which TB just ran" and "why it stopped" in the one value returned
/// from executing generated code, mirroring how tlib overloads the low
/// bits of the epilogue's return register.
pub fn encode_tb_exit(tb_idx: usize, val: u64) -> usize {
    (((tb_idx as u64) << TB_EXIT_VAL_BITS) | (val & TB_EXIT_VAL_MASK)) as usize
}

/// Inverse of `encode_tb_exit`: returns `(tb_idx, exit_val)`.
pub fn decode_tb_exit(raw: usize) -> (usize, usize) {
    let raw = raw as u64;
    (
        (raw >> TB_EXIT_VAL_BITS) as usize,
        (raw & TB_EXIT_VAL_MASK) as usize,
    )
}

impl TranslationBlock {
    pub fn new(pc: u64, flags: u32, cflags: u32) -> Self {
        Self {
            pc,
            cs_base: 0,
            flags,
            cflags,
            disas_flags: 0,
            size: 0,
            icount: 0,
            host_offset: 0,
            host_size: 0,
            search: Vec::new(),
            page_addr: [0, u64::MAX],
            page_next: [None, None],
            phys_pc: 0,
            phys_hash_next: None,
            jmp_insn_offset: [None; 2],
            jmp_reset_offset: [None; 2],
            jmp_dest: [None; 2],
            jmp_list: Vec::new(),
            exit_target: None,
            dirty_flag: false,
            was_cut: false,
            prev_size: 0,
            invalid: false,
        }
    }

    /// Whether this TB's code spans a second guest page.
    pub fn spans_two_pages(&self) -> bool {
        self.page_addr[1] != u64::MAX
    }

    /// Compute the physical-hash bucket for a guest-physical address.
    /// Reference: `(phys_pc >> 2) & (CODE_GEN_PHYS_HASH_SIZE - 1)`.
    pub fn phys_hash(phys_pc: u64) -> usize {
        ((phys_pc >> 2) as usize) & (TB_HASH_SIZE - 1)
    }

    /// Whether `(pc, cs_base, flags)` identifies this exact TB.
    pub fn matches(&self, pc: u64, cs_base: u64, flags: u32) -> bool {
        !self.invalid
            && self.pc == pc
            && self.cs_base == cs_base
            && self.flags == flags
    }

    /// Record the offset of a `goto_tb` jump instruction for exit slot `n`.
    pub fn set_jmp_insn_offset(&mut self, n: usize, offset: u32) {
        assert!(n < 2);
        self.jmp_insn_offset[n] = Some(offset);
    }

    /// Record the reset offset for exit slot `n`.
    pub fn set_jmp_reset_offset(&mut self, n: usize, offset: u32) {
        assert!(n < 2);
        self.jmp_reset_offset[n] = Some(offset);
    }

    /// Maximum number of guest instructions per TB.
    pub fn max_insns(cflags: u32) -> u32 {
        let count = cflags & cflags::CF_COUNT_MASK;
        if count == 0 {
            512
        } else {
            count
        }
    }
}

/// Number of buckets in the global physical-page hash table
/// (`CODE_GEN_PHYS_HASH_SIZE`).
pub const TB_HASH_SIZE: usize = 1 << 15; // 32768

/// Number of entries in the per-CPU jump cache.
pub const TB_JMP_CACHE_SIZE: usize = 1 << 12; // 4096

/// Per-CPU direct-mapped TB jump cache.
///
/// Indexed by a hash of the guest PC. Provides O(1) lookup for the
/// common case of re-executing the same PC, at the cost of needing a
/// full validity check (`TranslationBlock::matches`) on every hit since
/// collisions and stale entries are possible.
pub struct JumpCache {
    entries: Box<[Option<usize>; TB_JMP_CACHE_SIZE]>,
}

impl JumpCache {
    pub fn new() -> Self {
        Self {
            entries: Box::new([None; TB_JMP_CACHE_SIZE]),
        }
    }

    fn index(pc: u64) -> usize {
        (pc as usize >> 2) & (TB_JMP_CACHE_SIZE - 1)
    }

    pub fn lookup(&self, pc: u64) -> Option<usize> {
        self.entries[Self::index(pc)]
    }

    pub fn insert(&mut self, pc: u64, tb_idx: usize) {
        self.entries[Self::index(pc)] = Some(tb_idx);
    }

    pub fn remove(&mut self, pc: u64) {
        self.entries[Self::index(pc)] = None;
    }

    pub fn invalidate(&mut self) {
        self.entries.fill(None);
    }
}

impl Default for JumpCache {
    fn default() -> Self {
        Self::new()
    }
}
