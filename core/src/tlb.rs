//! Software TLB: the per-CPU, per-MMU-index direct-mapped cache of
//! guest-to-host address translations used by the fast path of generated
//! `qemu_ld`/`qemu_st` accesses.
//!
//! Reference: `exec.c` (`CPUTLBEntry`, `tlb_set_page`, `tlb_flush*`,
//! `notdirty_mem_write*`), `include/softmmu_defs.h`. §3 and §4.6 of
//! spec.md.
//!
//! The bundled `tcg-linux-user` frontend does not go through this path:
//! user-mode RISC-V translation addresses guest memory directly via a
//! fixed `guest_base` offset (see `tcg-linux-user::guest_space`), exactly
//! as tlib/QEMU's own linux-user targets do (there is no guest MMU to
//! simulate). This module exists for system-mode-shaped frontends that
//! are not part of this workspace but are part of the core's contract.

use crate::page::{PhysPageDesc, TARGET_PAGE_MASK, TARGET_PAGE_SIZE};

/// Entries per MMU index, per CPU (`CPU_TLB_SIZE`).
pub const CPU_TLB_SIZE: usize = 1 << 8;
/// Guest MMU modes tracked in parallel (user/supervisor/hypervisor, or
/// an architecture-specific split). tlib calls this `NB_MMU_MODES`.
pub const NB_MMU_MODES: usize = 4;

/// Low-bit flags packed into a TLB entry's tag alongside the page-aligned
/// guest address. A tag whose low bits are all zero is a "fast path" hit;
/// any of these set routes the access to the slow path.
pub mod tlb_flags {
    /// Access must go through an MMIO callback rather than a host pointer.
    pub const MMIO: u64 = 1 << 0;
    /// Page contains translated code; writes must run through the
    /// NOTDIRTY slow path so code gets invalidated.
    pub const NOTDIRTY: u64 = 1 << 1;
    /// Sub-page region: re-validate permissions on every access.
    pub const ONE_SHOT: u64 = 1 << 2;
    /// No valid translation — always takes the slow path / faults.
    pub const INVALID: u64 = 1 << 3;
    /// Code fetches from this page must go through MMIO (executable I/O
    /// memory) instead of a host pointer.
    pub const EXEC_IO: u64 = 1 << 4;

    pub const ALL: u64 = MMIO | NOTDIRTY | ONE_SHOT | INVALID | EXEC_IO;
}

/// One soft-TLB entry. `addend` is such that, on a tag hit,
/// `host_ptr = guest_addr.wrapping_add(addend)`.
#[derive(Debug, Clone, Copy)]
pub struct CpuTlbEntry {
    pub addr_read: u64,
    pub addr_write: u64,
    pub addr_code: u64,
    pub addend: u64,
}

impl CpuTlbEntry {
    /// An entry that never hits: every tag bit set makes the page-aligned
    /// comparison fail for any real address while also carrying the
    /// INVALID flag, matching tlib's `memset(.., 0xff, ..)` reset.
    const EMPTY: CpuTlbEntry = CpuTlbEntry {
        addr_read: u64::MAX,
        addr_write: u64::MAX,
        addr_code: u64::MAX,
        addend: 0,
    };
}

/// Which of the three tagged addresses an access checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
    Code,
}

fn index_of(addr: u64) -> usize {
    ((addr >> crate::page::TARGET_PAGE_BITS) as usize)
        & (CPU_TLB_SIZE - 1)
}

/// The full per-CPU soft TLB: `NB_MMU_MODES` independent tables of
/// `CPU_TLB_SIZE` entries each.
pub struct CpuTlb {
    tables: [[CpuTlbEntry; CPU_TLB_SIZE]; NB_MMU_MODES],
}

impl CpuTlb {
    pub fn new() -> Self {
        Self {
            tables: [[CpuTlbEntry::EMPTY; CPU_TLB_SIZE]; NB_MMU_MODES],
        }
    }

    /// Fast-path lookup: on a tag hit with no special flags, returns the
    /// host address to access directly. Returns `None` on a miss or any
    /// flagged entry, meaning the caller must fall back to the slow path.
    pub fn fast_path(
        &self,
        mmu_idx: usize,
        addr: u64,
        kind: AccessType,
    ) -> Option<u64> {
        let entry = &self.tables[mmu_idx][index_of(addr)];
        let tag = match kind {
            AccessType::Read => entry.addr_read,
            AccessType::Write => entry.addr_write,
            AccessType::Code => entry.addr_code,
        };
        let page = addr & TARGET_PAGE_MASK;
        if (tag & TARGET_PAGE_MASK) != page || (tag & tlb_flags::ALL) != 0 {
            return None;
        }
        Some(addr.wrapping_add(entry.addend))
    }

    /// Populate (or replace) the TLB entry for the page containing
    /// `vaddr`, given the resolved physical-page descriptor and whether
    /// the mapped region is smaller than a full page (forces `ONE_SHOT`).
    ///
    /// Reference: `tlb_set_page` in `exec.c`.
    pub fn set_page(
        &mut self,
        mmu_idx: usize,
        vaddr: u64,
        paddr: u64,
        phys: &PhysPageDesc,
        region_size: u64,
        writable: bool,
        executable: bool,
        is_mmio: bool,
        has_code: bool,
    ) {
        let page = vaddr & TARGET_PAGE_MASK;
        let addend = phys
            .phys_offset
            .wrapping_add(paddr & TARGET_PAGE_MASK)
            .wrapping_sub(page);

        let mut read_flags = 0u64;
        let mut write_flags = 0u64;
        let mut code_flags = 0u64;

        if is_mmio {
            read_flags |= tlb_flags::MMIO;
            write_flags |= tlb_flags::MMIO;
            code_flags |= tlb_flags::EXEC_IO;
        }
        if region_size < TARGET_PAGE_SIZE {
            read_flags |= tlb_flags::ONE_SHOT;
            write_flags |= tlb_flags::ONE_SHOT;
            code_flags |= tlb_flags::ONE_SHOT;
        }
        if has_code && writable {
            write_flags |= tlb_flags::NOTDIRTY;
        }
        if !writable {
            write_flags |= tlb_flags::INVALID;
        }
        if !executable {
            code_flags |= tlb_flags::INVALID;
        }

        let entry = &mut self.tables[mmu_idx][index_of(vaddr)];
        entry.addr_read = page | read_flags;
        entry.addr_write = page | write_flags;
        entry.addr_code = page | code_flags;
        entry.addend = addend;
    }

    /// Clear the NOTDIRTY flag on every entry whose tag matches `vaddr`'s
    /// page in every MMU index — called once a page has no remaining
    /// translated code. Reference: `tlb_set_dirty1` is the single-entry
    /// primitive; this is `tlb_reset_dirty_range`'s page-granular sibling.
    pub fn clear_notdirty_page(&mut self, vaddr: u64) {
        let page = vaddr & TARGET_PAGE_MASK;
        for table in &mut self.tables {
            let e = &mut table[index_of(vaddr)];
            if (e.addr_write & TARGET_PAGE_MASK) == page {
                e.addr_write &= !tlb_flags::NOTDIRTY;
            }
        }
    }

    /// Flush every entry in every MMU index.
    pub fn flush_all(&mut self) {
        for table in &mut self.tables {
            table.fill(CpuTlbEntry::EMPTY);
        }
    }

    /// Flush only the entries whose mmu index is set in `mmu_idx_mask`.
    pub fn flush_by_mmuidx(&mut self, mmu_idx_mask: u32) {
        for (idx, table) in self.tables.iter_mut().enumerate() {
            if mmu_idx_mask & (1 << idx) != 0 {
                table.fill(CpuTlbEntry::EMPTY);
            }
        }
    }

    /// Flush only the one entry whose tag matches `vaddr`'s page, in
    /// every MMU index (a single-page invalidation, e.g. on `munmap`).
    pub fn flush_page(&mut self, vaddr: u64) {
        let page = vaddr & TARGET_PAGE_MASK;
        let idx = index_of(vaddr);
        for table in &mut self.tables {
            let e = &mut table[idx];
            if (e.addr_read & TARGET_PAGE_MASK) == page
                || (e.addr_write & TARGET_PAGE_MASK) == page
                || (e.addr_code & TARGET_PAGE_MASK) == page
            {
                table[idx] = CpuTlbEntry::EMPTY;
            }
        }
    }

    /// Flush only the entries whose mmu index is set in `mmu_idx_mask`
    /// and whose tag matches `vaddr`'s page.
    pub fn flush_page_by_mmuidx(&mut self, vaddr: u64, mmu_idx_mask: u32) {
        let page = vaddr & TARGET_PAGE_MASK;
        let idx = index_of(vaddr);
        for (i, table) in self.tables.iter_mut().enumerate() {
            if mmu_idx_mask & (1 << i) == 0 {
                continue;
            }
            let e = &mut table[idx];
            if (e.addr_read & TARGET_PAGE_MASK) == page
                || (e.addr_write & TARGET_PAGE_MASK) == page
                || (e.addr_code & TARGET_PAGE_MASK) == page
            {
                table[idx] = CpuTlbEntry::EMPTY;
            }
        }
    }
}

impl Default for CpuTlb {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a slow-path memory-fault resolution, mirroring
/// `cpu_handle_mmu_fault`'s return contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuFaultOutcome {
    /// The fault was resolved (e.g. by mapping a page); the access
    /// should be retried.
    Retry,
    /// The fault is architectural and fatal to this access; the caller
    /// must raise the guest exception and perform `cpu_loop_exit`.
    Fatal { exception_index: u32 },
}

/// Embedder hook for resolving a soft-TLB miss. Mirrors
/// `cpu_handle_mmu_fault` plus `tlib_read_*`/`tlib_write_*` for MMIO.
pub trait SlowPathHandler {
    /// Walk guest page tables (or consult a flat mapping) to resolve
    /// `addr` for `kind` under `mmu_idx`, and populate the TLB via
    /// [`CpuTlb::set_page`] on success.
    fn handle_mmu_fault(
        &mut self,
        tlb: &mut CpuTlb,
        addr: u64,
        mmu_idx: usize,
        kind: AccessType,
    ) -> MmuFaultOutcome;

    /// Dispatch an MMIO access (tag had `MMIO`/`EXEC_IO` set).
    fn mmio_read(&mut self, phys_addr: u64, size: u32) -> u64;
    fn mmio_write(&mut self, phys_addr: u64, size: u32, val: u64);
}

/// Hook invoked when a store's TLB entry carries `NOTDIRTY`: the page
/// contains translated code and must be checked/invalidated before the
/// write is allowed to retire. Implemented by the TB manager (`tcg-exec`),
/// which owns the page-to-TB mapping this module doesn't.
pub trait NotdirtyHandler {
    /// Invalidate any TB overlapping `[addr, addr+size)`, returning
    /// whether the page still contains any translated code afterwards.
    fn notdirty_write(&mut self, addr: u64, size: u32) -> bool;
}

/// Perform a tagged store whose TLB entry has `NOTDIRTY` set: invalidate
/// overlapping code via `handler`, then clear the flag once the page is
/// clean. Reference: `notdirty_mem_write{b,w,l,q}` in `exec.c`.
pub fn notdirty_store(
    tlb: &mut CpuTlb,
    handler: &mut impl NotdirtyHandler,
    vaddr: u64,
    size: u32,
) {
    let still_has_code = handler.notdirty_write(vaddr, size);
    if !still_has_code {
        tlb.clear_notdirty_page(vaddr);
    }
}
