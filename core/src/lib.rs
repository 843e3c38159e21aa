pub mod breakpoint;
pub mod context;
pub mod dump;
pub mod ir_builder;
pub mod label;
pub mod op;
pub mod opcode;
pub mod page;
pub mod search;
pub mod serialize;
pub mod tb;
pub mod tlb;
pub mod temp;
pub mod types;

pub use breakpoint::{BreakpointList, CPUBreakpoint};
pub use context::Context;
pub use label::{Label, LabelUse, RelocKind};
pub use op::{LifeData, Op, OpIdx, MAX_OP_ARGS};
pub use opcode::{OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use page::{PageDesc, PageTable, PhysPageDesc};
pub use tb::{JumpCache, TranslationBlock, TB_HASH_SIZE, TB_JMP_CACHE_SIZE};
pub use temp::{Temp, TempIdx, TempKind};
pub use types::{Cond, MemOp, RegSet, TempVal, Type};
