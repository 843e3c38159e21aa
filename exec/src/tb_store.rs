use tcg_backend::code_buffer::CodeBuffer;
use tcg_backend::HostCodeGen;
use tcg_core::tb::{TranslationBlock, TB_HASH_SIZE};

const MAX_TBS: usize = 65536;

/// Embedder hook for broadcasting a physical-page invalidation to every
/// other guest CPU sharing this translator's memory, per spec.md §5's
/// "cross-CPU invalidation only while peers are quiescent" model.
/// Mirrors `tlib_invalidate_tb_in_other_cpus`.
pub trait CrossCpuInvalidate {
    fn invalidate_tb_in_other_cpus(&mut self, start: u64, end: u64);
}

/// Owns every translated TB for one guest CPU, plus the physical-hash
/// table used to look one up by `(pc, flags)`.
///
/// Plain `Vec` + `Vec<Option<usize>>`, no interior mutability: exactly
/// one `ExecEnv` (and so one `TbStore`) drives one guest CPU, so there
/// is never a concurrent reader or writer to guard against. Compare to
/// tlib's `tb_ctx`, which QEMU's MTTCG build protects with
/// `tb_lock`/RCU; this rewrite's concurrency model replaces that lock
/// with ownership — see DESIGN.md.
pub struct TbStore {
    tbs: Vec<TranslationBlock>,
    hash: Vec<Option<usize>>,
    /// Bumped on every `flush`. Lets callers holding a `tb_idx` from
    /// before a call that may have triggered reclamation (see
    /// `ExecEnv::reclaim`) detect that their index no longer names the
    /// TB they think it does.
    generation: u64,
}

impl TbStore {
    pub fn new() -> Self {
        Self {
            tbs: Vec::with_capacity(MAX_TBS),
            hash: vec![None; TB_HASH_SIZE],
            generation: 0,
        }
    }

    /// Current flush generation. See the `generation` field doc.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Allocate a new TB, identity-mapping `pc` as its physical
    /// address (the bundled `tcg-linux-user` frontend runs with a flat
    /// guest_base mapping, so guest virtual and "physical" addresses
    /// coincide).
    pub fn alloc(&mut self, pc: u64, flags: u32, cflags: u32) -> usize {
        assert!(self.tbs.len() < MAX_TBS, "TB store full");
        let mut tb = TranslationBlock::new(pc, flags, cflags);
        tb.phys_pc = pc;
        let idx = self.tbs.len();
        self.tbs.push(tb);
        idx
    }

    pub fn get(&self, idx: usize) -> &TranslationBlock {
        &self.tbs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut TranslationBlock {
        &mut self.tbs[idx]
    }

    pub fn len(&self) -> usize {
        self.tbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tbs.is_empty()
    }

    /// Look up a non-invalidated TB by exact `(pc, flags)` identity
    /// (`cs_base` is always 0 in this workspace's single bundled
    /// frontend).
    pub fn lookup(&self, pc: u64, flags: u32) -> Option<usize> {
        let bucket = TranslationBlock::phys_hash(pc);
        let mut cur = self.hash[bucket];
        while let Some(idx) = cur {
            let tb = &self.tbs[idx];
            if tb.matches(pc, 0, flags) {
                return Some(idx);
            }
            cur = tb.phys_hash_next;
        }
        None
    }

    /// Insert a freshly-translated TB into the physical hash table
    /// (prepend to its bucket's chain).
    pub fn insert(&mut self, tb_idx: usize) {
        let pc = self.tbs[tb_idx].phys_pc;
        let bucket = TranslationBlock::phys_hash(pc);
        self.tbs[tb_idx].phys_hash_next = self.hash[bucket];
        self.hash[bucket] = Some(tb_idx);
    }

    /// Patch `src`'s exit-slot `slot` to jump directly to `dst`'s
    /// generated code, and record the edge on both ends so a later
    /// invalidation of either TB can unlink it.
    ///
    /// Mirrors tlib's `tb_add_jump`: chaining turns a `goto_tb` exit
    /// that would otherwise fall back to the dispatcher into a direct
    /// host jump between two translated blocks.
    pub fn add_jump<B: HostCodeGen>(
        &mut self,
        src: usize,
        slot: usize,
        dst: usize,
        code_buf: &CodeBuffer,
        backend: &B,
    ) {
        assert!(slot < 2);
        if self.tbs[src].jmp_dest[slot] == Some(dst) {
            return;
        }
        // A previously-chained slot must be unlinked before re-chaining.
        self.unlink_outgoing(src, slot, code_buf, backend);

        if let Some(jmp_off) = self.tbs[src].jmp_insn_offset[slot] {
            let target = self.tbs[dst].host_offset;
            backend.patch_jump(code_buf, jmp_off as usize, target);
        }

        self.tbs[src].jmp_dest[slot] = Some(dst);
        self.tbs[dst].jmp_list.push((src, slot as u8));
    }

    /// Unlink `src`'s outgoing jump at `slot`, resetting the patched
    /// host jump back to its original (dispatcher-returning) target
    /// and removing the edge from the destination's inbound list.
    fn unlink_outgoing<B: HostCodeGen>(
        &mut self,
        src: usize,
        slot: usize,
        code_buf: &CodeBuffer,
        backend: &B,
    ) {
        let dst = match self.tbs[src].jmp_dest[slot].take() {
            Some(dst) => dst,
            None => return,
        };
        Self::reset_jump(&self.tbs[src], code_buf, backend, slot);
        self.tbs[dst]
            .jmp_list
            .retain(|&(s, n)| !(s == src && n as usize == slot));
    }

    /// Mark a TB invalid, unlink every chained jump that touches it
    /// (both directions) and drop it from the physical hash chain.
    /// The slot in `tbs[]` is not reused until the next `flush`.
    ///
    /// Grounds spec §4.1's code-invalidation requirement: a
    /// self-modifying write must stop outstanding direct jumps from
    /// re-entering the stale TB.
    pub fn invalidate<B: HostCodeGen>(
        &mut self,
        tb_idx: usize,
        code_buf: &CodeBuffer,
        backend: &B,
    ) {
        if self.tbs[tb_idx].invalid {
            return;
        }
        self.tbs[tb_idx].invalid = true;

        // 1. Unlink incoming edges: every (src, slot) that jumps here.
        let jmp_list = std::mem::take(&mut self.tbs[tb_idx].jmp_list);
        for (src, slot) in jmp_list {
            Self::reset_jump(&self.tbs[src], code_buf, backend, slot as usize);
            self.tbs[src].jmp_dest[slot as usize] = None;
        }

        // 2. Unlink outgoing edges: slots this TB had chained out.
        for slot in 0..2 {
            if let Some(dst) = self.tbs[tb_idx].jmp_dest[slot].take() {
                self.tbs[dst]
                    .jmp_list
                    .retain(|&(s, n)| !(s == tb_idx && n as usize == slot));
            }
        }

        // 3. Remove from the physical hash chain.
        let pc = self.tbs[tb_idx].phys_pc;
        let bucket = TranslationBlock::phys_hash(pc);
        let mut prev: Option<usize> = None;
        let mut cur = self.hash[bucket];
        while let Some(idx) = cur {
            let next = self.tbs[idx].phys_hash_next;
            if idx == tb_idx {
                match prev {
                    Some(p) => self.tbs[p].phys_hash_next = next,
                    None => self.hash[bucket] = next,
                }
                self.tbs[tb_idx].phys_hash_next = None;
                return;
            }
            prev = cur;
            cur = next;
        }
    }

    /// Invalidate every TB whose code overlaps `[start, end)` in guest
    /// physical address space. Walks the dense TB array rather than
    /// the page descriptor's per-page TB list (`PageDesc` tracks pages
    /// the frontend has marked; this is the store-side half the
    /// invalidation path needs once a page lookup names a candidate).
    pub fn invalidate_phys_range<B: HostCodeGen>(
        &mut self,
        start: u64,
        end: u64,
        code_buf: &CodeBuffer,
        backend: &B,
    ) {
        let victims: Vec<usize> = self
            .tbs
            .iter()
            .enumerate()
            .filter(|(_, tb)| {
                !tb.invalid
                    && tb.phys_pc < end
                    && tb.phys_pc + tb.size as u64 > start
            })
            .map(|(idx, _)| idx)
            .collect();
        for idx in victims {
            self.invalidate(idx, code_buf, backend);
        }
    }

    /// `tb_invalidate_phys_page_range_checked`: invalidate every TB
    /// overlapping `[start, end)`, splitting the walk at page boundaries
    /// like the original's `tb_invalidate_phys_page_range_inner`, and —
    /// when `broadcast` is set — tell `other_cpus` to do the same so a
    /// write by this CPU can't leave a stale TB live on a peer that
    /// shares the same physical page. Reference: spec.md §5,
    /// `tlib_invalidate_tb_in_other_cpus`.
    pub fn invalidate_phys_range_checked<B: HostCodeGen>(
        &mut self,
        start: u64,
        end: u64,
        broadcast: bool,
        code_buf: &CodeBuffer,
        backend: &B,
        other_cpus: Option<&mut dyn CrossCpuInvalidate>,
    ) {
        let mut page_start = tcg_core::page::page_start(start);
        while page_start < end {
            let page_end =
                (page_start + tcg_core::page::TARGET_PAGE_SIZE).min(end);
            self.invalidate_phys_range(
                page_start.max(start),
                page_end,
                code_buf,
                backend,
            );
            page_start += tcg_core::page::TARGET_PAGE_SIZE;
        }

        if broadcast {
            if let Some(peers) = other_cpus {
                peers.invalidate_tb_in_other_cpus(start, end);
            }
        }
    }

    /// `tb_find_pc`: locate the TB whose generated code contains
    /// `host_off`, a byte offset into the shared code buffer. Tlib keeps
    /// `tbs[]` sorted by `tc_ptr` (allocation order under a bump
    /// allocator is also host-code order) and binary searches it; this
    /// rewrite's `tbs[]` has the same ordering property, since TBs are
    /// only ever appended and `host_offset` only ever grows.
    ///
    /// Used by the state-restoration path (§4.1) to map a faulting host
    /// PC back to the TB it belongs to before walking its search table.
    pub fn find_pc(&self, host_off: usize) -> Option<usize> {
        if self.tbs.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.tbs.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.tbs[mid].host_offset <= host_off {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            return None;
        }
        let idx = lo - 1;
        let tb = &self.tbs[idx];
        if host_off < tb.host_offset + tb.host_size {
            Some(idx)
        } else {
            None
        }
    }

    /// Reset a goto_tb jump back to the offset that falls through to
    /// the epilogue / dispatcher instead of jumping directly to a
    /// (possibly now-invalid) chained TB.
    fn reset_jump<B: HostCodeGen>(
        tb: &TranslationBlock,
        code_buf: &CodeBuffer,
        backend: &B,
        slot: usize,
    ) {
        if let (Some(jmp_off), Some(reset_off)) =
            (tb.jmp_insn_offset[slot], tb.jmp_reset_offset[slot])
        {
            backend.patch_jump(code_buf, jmp_off as usize, reset_off as usize);
        }
    }

    /// Drop every TB and reset the hash table (tlib's `tb_flush`).
    pub fn flush(&mut self) {
        self.tbs.clear();
        self.hash.fill(None);
        self.generation = self.generation.wrapping_add(1);
    }
}

impl Default for TbStore {
    fn default() -> Self {
        Self::new()
    }
}
