//! Guest-PC breakpoints that force a TB to end (or never start) at a given
//! address, so the dispatcher regains control exactly there instead of
//! running translated code straight through it.
//!
//! Maps to QEMU/tlib's `CPUBreakpoint` and the `cpu_breakpoint_insert`/
//! `cpu_breakpoint_remove` pair. §3 of spec.md; scenario E6.

/// A single breakpoint on a guest virtual address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CPUBreakpoint {
    pub pc: u64,
    /// Opaque flags the frontend may use to distinguish breakpoint
    /// kinds (hardware vs. software, etc.); unused by the core itself.
    pub flags: u32,
}

/// The set of active breakpoints for one guest CPU, consulted by the
/// frontend's `insn_start` hook before translating each instruction.
///
/// A plain sorted `Vec` rather than a hash set: insertion/removal are rare
/// (debugger commands), lookups happen once per translated instruction,
/// and the list is typically tiny.
#[derive(Debug, Default)]
pub struct BreakpointList {
    points: Vec<CPUBreakpoint>,
}

impl BreakpointList {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// `tlib_add_breakpoint` / `cpu_breakpoint_insert`. Idempotent: adding
    /// the same `pc` twice just updates its flags.
    pub fn insert(&mut self, pc: u64, flags: u32) {
        match self.points.iter_mut().find(|bp| bp.pc == pc) {
            Some(bp) => bp.flags = flags,
            None => self.points.push(CPUBreakpoint { pc, flags }),
        }
    }

    /// `tlib_remove_breakpoint` / `cpu_breakpoint_remove`. No-op if `pc`
    /// has no breakpoint.
    pub fn remove(&mut self, pc: u64) {
        self.points.retain(|bp| bp.pc != pc);
    }

    pub fn remove_all(&mut self) {
        self.points.clear();
    }

    pub fn contains(&self, pc: u64) -> bool {
        self.points.iter().any(|bp| bp.pc == pc)
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Snapshot of every active breakpoint PC, for handing to a frontend's
    /// disassembly context at translation time.
    pub fn active_pcs(&self) -> Vec<u64> {
        self.points.iter().map(|bp| bp.pc).collect()
    }
}
