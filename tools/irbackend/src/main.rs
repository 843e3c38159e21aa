//! tcg-irbackend — IR → x86-64 backend code generation tool.
//!
//! Reads a .tcgir binary IR file, runs the backend pipeline
//! (optimize → liveness → regalloc → codegen), and outputs
//! the generated x86-64 machine code.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context as _, Result};
use clap::Parser;

use tcg_backend::code_buffer::CodeBuffer;
use tcg_backend::translate::translate;
use tcg_backend::{HostCodeGen, X86_64CodeGen};
use tcg_core::serialize;

/// Run the backend pipeline over a serialized `.tcgir` file.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the serialized IR file.
    ir_path: PathBuf,

    /// Output to file (default: stdout).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output raw machine code bytes instead of a hex dump.
    #[arg(long)]
    raw: bool,

    /// Disassemble the generated code via objdump.
    #[arg(long)]
    disas: bool,
}

fn hex_dump(data: &[u8], w: &mut impl Write) -> io::Result<()> {
    for (i, chunk) in data.chunks(16).enumerate() {
        write!(w, "{:04x}: ", i * 16)?;
        for (j, byte) in chunk.iter().enumerate() {
            if j > 0 && j % 4 == 0 {
                write!(w, " ")?;
            }
            write!(w, " {byte:02x}")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn disassemble(code: &[u8]) {
    let tmp = "/tmp/tcg-irbackend-tmp.bin";
    if let Err(e) = fs::write(tmp, code) {
        eprintln!("write tmp failed: {e}");
        return;
    }
    let status = process::Command::new("objdump")
        .args(["-b", "binary", "-m", "i386:x86-64", "-D", tmp])
        .status();
    match status {
        Ok(s) if s.success() => {}
        Ok(s) => {
            eprintln!("objdump exited with {s}");
        }
        Err(e) => {
            eprintln!("failed to run objdump: {e}");
        }
    }
    let _ = fs::remove_file(tmp);
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let data = fs::read(&args.ir_path)
        .with_context(|| format!("failed to read {}", args.ir_path.display()))?;

    let mut cursor = io::Cursor::new(&data);
    let contexts =
        serialize::deserialize(&mut cursor).context("deserialize error")?;

    log::info!("loaded {} TB(s)", contexts.len());

    let mut backend = X86_64CodeGen::new();
    let mut buf =
        CodeBuffer::new(64 * 1024).context("code buffer allocation failed")?;

    // Emit prologue + epilogue first (ExitTb needs
    // tb_ret_offset).
    backend.emit_prologue(&mut buf);
    backend.emit_epilogue(&mut buf);
    let prologue_size = buf.offset();

    for (i, mut ctx) in contexts.into_iter().enumerate() {
        backend.init_context(&mut ctx);
        backend.clear_goto_tb_offsets();
        let (tb_start, _insns) = translate(&mut ctx, &backend, &mut buf);
        let tb_end = buf.offset();
        let tb_size = tb_end - tb_start;
        log::debug!("TB #{i}: {tb_size} bytes @ offset 0x{tb_start:x}");
    }

    let code = &buf.as_slice()[prologue_size..];
    let total = buf.offset();
    log::info!(
        "total: {total} bytes ({prologue_size} prologue + {} TB code)",
        total - prologue_size
    );

    if args.disas {
        disassemble(buf.as_slice());
    } else if args.raw {
        let mut out: Box<dyn Write> = match &args.output {
            Some(path) => {
                let f = fs::File::create(path).with_context(|| {
                    format!("cannot create {}", path.display())
                })?;
                Box::new(BufWriter::new(f))
            }
            None => Box::new(io::stdout().lock()),
        };
        out.write_all(code)?;
    } else {
        let mut out: Box<dyn Write> = match &args.output {
            Some(path) => {
                let f = fs::File::create(path).with_context(|| {
                    format!("cannot create {}", path.display())
                })?;
                Box::new(BufWriter::new(f))
            }
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };
        hex_dump(code, &mut out)?;
    }

    Ok(())
}
