use crate::code_buffer::CodeBuffer;
use crate::liveness::liveness_analysis;
use crate::regalloc::regalloc_and_codegen;
use crate::HostCodeGen;
use tcg_core::search::InsnRecord;
use tcg_core::Context;

/// Full translation pipeline: liveness → regalloc+codegen.
///
/// Returns the offset where TB code starts in the buffer, plus one
/// [`InsnRecord`] per guest instruction with `host_end_off` rebased to be
/// relative to that TB-start offset — ready to hand to
/// `tcg_core::search::encode_search`.
pub fn translate(
    ctx: &mut Context,
    backend: &impl HostCodeGen,
    buf: &mut CodeBuffer,
) -> (usize, Vec<InsnRecord>) {
    liveness_analysis(ctx);
    let tb_start = buf.offset();
    let insns = regalloc_and_codegen(ctx, backend, buf)
        .into_iter()
        .map(|r| InsnRecord {
            data: r.data,
            host_end_off: r.host_end_off - tb_start as u64,
        })
        .collect();
    (tb_start, insns)
}

/// Translate and execute a TB.
///
/// # Safety
/// `env` must point to a valid CPUState-like struct that
/// matches the globals registered in `ctx`.
pub unsafe fn translate_and_execute(
    ctx: &mut Context,
    backend: &impl HostCodeGen,
    buf: &mut CodeBuffer,
    env: *mut u8,
) -> usize {
    // Buffer is RWX, no permission switch needed.
    let (tb_start, _insns) = translate(ctx, backend, buf);

    // Prologue signature:
    //   fn(env: *mut u8, tb_ptr: *const u8) -> usize
    // RDI = env, RSI = TB code pointer, returns RAX
    let prologue_fn: unsafe extern "C" fn(*mut u8, *const u8) -> usize =
        core::mem::transmute(buf.base_ptr());
    let tb_ptr = buf.ptr_at(tb_start);
    let raw = prologue_fn(env, tb_ptr);
    // Decode: strip the encoded TB index, return only the
    // exit code (slot number or exception code).
    let (_, exit_code) = tcg_core::tb::decode_tb_exit(raw);
    exit_code
}
