//! Wires the guest-page radix tries (`tcg_core::page`) and the soft TLB
//! (`tcg_core::tlb`) into the live TB-management path: linking a freshly
//! translated TB into the page(s) its code came from, and consulting the
//! per-page code bitmap on a store instead of always falling back to a
//! full invalidation.
//!
//! Reference: `exec.c` (`tb_alloc_page`, `tb_invalidate_phys_page_range`,
//! `build_page_bitmap`). §4.1/§4.6 of spec.md, items 1/2/6/7 of
//! `SPEC_FULL.md` §C.

use crate::tb_store::TbStore;
use tcg_backend::code_buffer::CodeBuffer;
use tcg_backend::HostCodeGen;
use tcg_core::page::{
    page_index, page_offset, PageDesc, PageTable, TARGET_PAGE_BITS,
    TARGET_PAGE_SIZE,
};

fn bitmap_len() -> usize {
    (TARGET_PAGE_SIZE as usize) / 8
}

/// The one or two page-aligned guest-physical addresses a TB of `size`
/// bytes starting at `phys_pc` was translated from. `page_addr[1]` is
/// `u64::MAX` when the TB doesn't cross a page boundary.
pub fn page_addrs(phys_pc: u64, size: u32) -> [u64; 2] {
    let last_byte = phys_pc + (size.max(1) as u64) - 1;
    let p0 = tcg_core::page::page_start(phys_pc);
    let p1 = tcg_core::page::page_start(last_byte);
    if p0 == p1 {
        [p0, u64::MAX]
    } else {
        [p0, p1]
    }
}

/// Link a freshly translated TB into the per-page TB list of every page
/// named in its `page_addr`. Must be called once, right after `page_addr`
/// is set and before the TB can be looked up again.
pub fn link_tb_page(
    page_table: &mut PageTable<PageDesc>,
    tb_store: &mut TbStore,
    tb_idx: usize,
) {
    let page_addr = tb_store.get(tb_idx).page_addr;
    for (slot, &addr) in page_addr.iter().enumerate() {
        if addr == u64::MAX {
            continue;
        }
        let index = page_index(addr);
        let desc = page_table.find_alloc(index);
        let old_head = desc.first_tb;
        desc.first_tb = Some(tcg_core::page::PageTbRef {
            tb_index: tb_idx,
            slot: slot as u8,
        });
        tb_store.get_mut(tb_idx).page_next[slot] = old_head;
    }
}

/// Remove `tb_idx`'s single `slot`-th page link from its page's list,
/// walking the intrusive list to find and splice out the matching node.
/// Clears the page's code bitmap if the list becomes empty.
fn unlink_tb_from_page(
    page_table: &mut PageTable<PageDesc>,
    tb_store: &mut TbStore,
    tb_idx: usize,
    slot: usize,
) {
    let addr = tb_store.get(tb_idx).page_addr[slot];
    if addr == u64::MAX {
        return;
    }
    let index = page_index(addr);
    let desc = match page_table.find_mut(index) {
        Some(d) => d,
        None => return,
    };

    match desc.first_tb {
        Some(r) if r.tb_index == tb_idx && r.slot as usize == slot => {
            desc.first_tb = tb_store.get(tb_idx).page_next[slot];
        }
        _ => {
            let mut cur = desc.first_tb;
            while let Some(r) = cur {
                let next = tb_store.get(r.tb_index).page_next[r.slot as usize];
                if let Some(n) = next {
                    if n.tb_index == tb_idx && n.slot as usize == slot {
                        let after = tb_store.get(tb_idx).page_next[slot];
                        tb_store.get_mut(r.tb_index).page_next
                            [r.slot as usize] = after;
                        break;
                    }
                }
                cur = next;
            }
        }
    }

    if desc.first_tb.is_none() {
        desc.invalidate_code_bitmap();
    }
}

/// Remove a TB from every page it was linked into (both slots).
pub fn unlink_tb_pages(
    page_table: &mut PageTable<PageDesc>,
    tb_store: &mut TbStore,
    tb_idx: usize,
) {
    for slot in 0..2 {
        unlink_tb_from_page(page_table, tb_store, tb_idx, slot);
    }
}

/// Invalidate every TB linked to guest page `page_idx`, via the page's own
/// TB list rather than a scan of the whole TB array, and reset the page's
/// write-count/bitmap state now that it holds no code.
///
/// Does not touch the TLB: callers driving this from the NOTDIRTY store
/// path (see [`handle_notdirty_write`]) go through
/// `tcg_core::tlb::notdirty_store`, which clears the page's NOTDIRTY tag
/// itself once this returns; other callers own the TLB directly and can
/// flush it as they see fit.
pub fn invalidate_page<B: HostCodeGen>(
    page_table: &mut PageTable<PageDesc>,
    tb_store: &mut TbStore,
    page_idx: u64,
    code_buf: &CodeBuffer,
    backend: &B,
) {
    let first = page_table.find(page_idx).and_then(|d| d.first_tb);
    let mut victims: Vec<(usize, usize)> = Vec::new();
    let mut cur = first;
    while let Some(r) = cur {
        victims.push((r.tb_index, r.slot as usize));
        cur = tb_store.get(r.tb_index).page_next[r.slot as usize];
    }

    for (idx, slot) in victims {
        tb_store.invalidate(idx, code_buf, backend);
        unlink_tb_from_page(page_table, tb_store, idx, 1 - slot);
    }

    if let Some(desc) = page_table.find_mut(page_idx) {
        desc.first_tb = None;
        desc.invalidate_code_bitmap();
    }
}

fn build_code_bitmap(
    page_table: &mut PageTable<PageDesc>,
    tb_store: &TbStore,
    page_idx: u64,
) {
    let mut bits = vec![0u8; bitmap_len()].into_boxed_slice();
    let first = page_table.find(page_idx).and_then(|d| d.first_tb);
    let page_byte_start = page_idx << TARGET_PAGE_BITS;
    let mut cur = first;
    while let Some(r) = cur {
        let tb = tb_store.get(r.tb_index);
        let start_off = tb
            .phys_pc
            .saturating_sub(page_byte_start)
            .min(TARGET_PAGE_SIZE) as u32;
        let end_off = (tb.phys_pc + tb.size as u64)
            .saturating_sub(page_byte_start)
            .min(TARGET_PAGE_SIZE) as u32;
        PageDesc::mark_code_range(&mut bits, start_off, end_off);
        cur = tb.page_next[r.slot as usize];
    }
    if let Some(desc) = page_table.find_mut(page_idx) {
        desc.set_code_bitmap(bits);
    }
}

/// `notdirty_mem_write{b,w,l,q}`: the embedder's `NotdirtyHandler` calls
/// this from a tagged store. Consults the page's code bitmap (once built)
/// to skip invalidation entirely when the write provably misses every
/// translated instruction on the page; otherwise invalidates the whole
/// page via its TB list. Returns whether the page still contains code.
pub fn handle_notdirty_write<B: HostCodeGen>(
    page_table: &mut PageTable<PageDesc>,
    tb_store: &mut TbStore,
    addr: u64,
    size: u32,
    code_buf: &CodeBuffer,
    backend: &B,
) -> bool {
    let page_idx = page_index(addr);
    let off = page_offset(addr);
    let end_off = ((off as u64 + size as u64).min(TARGET_PAGE_SIZE)) as u32;

    let has_code = page_table
        .find(page_idx)
        .map(|d| d.first_tb.is_some())
        .unwrap_or(false);
    if !has_code {
        return false;
    }

    let skip_invalidate = match page_table.find(page_idx) {
        Some(desc) => match &desc.code_bitmap {
            Some(bitmap) => {
                !PageDesc::bitmap_range_is_code(bitmap, off, end_off)
            }
            None => false,
        },
        None => true,
    };

    if skip_invalidate {
        let mut need_build = false;
        if let Some(desc) = page_table.find_mut(page_idx) {
            desc.code_write_count += 1;
            need_build = desc.should_build_bitmap();
        }
        if need_build {
            build_code_bitmap(page_table, tb_store, page_idx);
        }
        return true;
    }

    invalidate_page(page_table, tb_store, page_idx, code_buf, backend);
    false
}

/// Adapts [`handle_notdirty_write`] to `tcg_core::tlb::NotdirtyHandler` so
/// it can be driven through the generic `notdirty_store` entry point
/// alongside the rest of the soft-TLB machinery, exactly as an embedder
/// with a real guest MMU would. Borrowed fields rather than an owned
/// `ExecEnv` so the TLB itself (passed separately to `notdirty_store`)
/// isn't also borrowed here.
pub struct PageNotdirtyHandler<'a, B: HostCodeGen> {
    pub page_table: &'a mut PageTable<PageDesc>,
    pub tb_store: &'a mut TbStore,
    pub code_buf: &'a CodeBuffer,
    pub backend: &'a B,
}

impl<'a, B: HostCodeGen> tcg_core::tlb::NotdirtyHandler
    for PageNotdirtyHandler<'a, B>
{
    fn notdirty_write(&mut self, addr: u64, size: u32) -> bool {
        handle_notdirty_write(
            self.page_table,
            self.tb_store,
            addr,
            size,
            self.code_buf,
            self.backend,
        )
    }
}
