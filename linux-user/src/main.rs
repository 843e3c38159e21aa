use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;

use tcg_backend::X86_64CodeGen;
use tcg_core::context::Context;
use tcg_core::tb::{EXCP_EBREAK, EXCP_ECALL, EXCP_UNDEF};
use tcg_core::TempIdx;
use tcg_core::BreakpointList;
use tcg_exec::exec_loop::{cpu_exec_loop, ExitReason};
use tcg_exec::{ExecEnv, GuestCpu, TranslatorConfig};
use tcg_frontend::riscv::cpu::{RiscvCpu, NUM_GPRS};
use tcg_frontend::riscv::{RiscvDisasContext, RiscvTranslator};
use tcg_frontend::{translator_loop, DisasJumpType, TranslatorOps};
use tcg_linux_user::guest_space::GuestSpace;
use tcg_linux_user::loader::{load_elf, ElfInfo};
use tcg_linux_user::syscall::{handle_syscall, SyscallResult};

/// Run a statically-linked RISC-V64 Linux binary under dynamic binary
/// translation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the guest ELF binary.
    elf_path: PathBuf,

    /// Arguments passed through to the guest program.
    guest_args: Vec<String>,

    /// Print TB lookup/chaining statistics on exit.
    #[arg(long)]
    stats: bool,

    /// Cap guest instructions per translated block (0 = default, 512).
    #[arg(long, default_value_t = 0)]
    max_block_size: u32,

    /// Disable direct TB-to-TB jump chaining.
    #[arg(long)]
    no_chaining: bool,

    /// Disable the TB cache (retranslate every lookup).
    #[arg(long)]
    no_tb_cache: bool,
}

/// Wrapper: RiscvCpu + guest_base for GuestCpu trait.
struct LinuxCpu {
    cpu: RiscvCpu,
}

impl GuestCpu for LinuxCpu {
    fn get_pc(&self) -> u64 {
        self.cpu.pc
    }

    fn get_flags(&self) -> u32 {
        0
    }

    fn gen_code(
        &mut self,
        ir: &mut Context,
        pc: u64,
        max_insns: u32,
        breakpoints: &BreakpointList,
    ) -> u32 {
        let base = self.cpu.guest_base as *const u8;
        if ir.nb_globals() == 0 {
            let mut d = RiscvDisasContext::with_breakpoints(pc, base, breakpoints);
            d.base.max_insns = max_insns;
            translator_loop::<RiscvTranslator>(&mut d, ir);
            d.base.num_insns * 4
        } else {
            let mut d = RiscvDisasContext::with_breakpoints(pc, base, breakpoints);
            d.base.max_insns = max_insns;
            d.env = TempIdx(0);
            for i in 0..NUM_GPRS {
                d.gpr[i] = TempIdx(1 + i as u32);
            }
            d.pc = TempIdx(1 + NUM_GPRS as u32);
            d.load_res = TempIdx(1 + NUM_GPRS as u32 + 1);
            d.load_val = TempIdx(1 + NUM_GPRS as u32 + 2);
            RiscvTranslator::tb_start(&mut d, ir);
            loop {
                RiscvTranslator::insn_start(&mut d, ir);
                if d.base.is_jmp != DisasJumpType::Next {
                    break;
                }
                RiscvTranslator::translate_insn(&mut d, ir);
                if d.base.is_jmp != DisasJumpType::Next {
                    break;
                }
                if d.base.num_insns >= d.base.max_insns {
                    d.base.is_jmp = DisasJumpType::TooMany;
                    break;
                }
            }
            RiscvTranslator::tb_stop(&mut d, ir);
            d.base.num_insns * 4
        }
    }

    fn env_ptr(&mut self) -> *mut u8 {
        &mut self.cpu as *mut RiscvCpu as *mut u8
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let elf_path = std::fs::canonicalize(&args.elf_path).with_context(
        || format!("failed to resolve elf path {}", args.elf_path.display()),
    )?;
    let elf_path = elf_path.to_str().context("elf path is not valid UTF-8")?;
    let mut guest_argv: Vec<&str> = vec![elf_path];
    guest_argv.extend(args.guest_args.iter().map(|s| s.as_str()));

    // Load ELF
    let mut space =
        GuestSpace::new().context("failed to create guest address space")?;
    let info: ElfInfo =
        load_elf(std::path::Path::new(elf_path), &mut space, &guest_argv, &[])
            .with_context(|| format!("failed to load ELF {elf_path}"))?;
    log::debug!("entry={:#x} sp={:#x} brk={:#x}", info.entry, info.sp, info.brk);

    // Set up CPU
    let mut lcpu = LinuxCpu {
        cpu: RiscvCpu::new(),
    };
    lcpu.cpu.pc = info.entry;
    lcpu.cpu.gpr[2] = info.sp; // SP = x2
    lcpu.cpu.guest_base = space.guest_base() as u64;

    // mmap_next starts after brk
    let mut mmap_next =
        tcg_linux_user::guest_space::page_align_up(info.brk) + 0x1000_0000; // 256 MB gap

    // Run
    let mut config = TranslatorConfig::default();
    config.tlib_set_maximum_block_size(args.max_block_size);
    config.tlib_set_chaining_enabled(!args.no_chaining);
    config.tlib_set_tb_cache_enabled(!args.no_tb_cache);
    let mut env = ExecEnv::with_config(X86_64CodeGen::new(), config);

    loop {
        let reason = unsafe { cpu_exec_loop(&mut env, &mut lcpu) };
        match reason {
            ExitReason::Exit(v) if v == EXCP_ECALL as usize => {
                // ECALL
                match handle_syscall(
                    &mut space,
                    &mut lcpu.cpu.gpr,
                    &mut mmap_next,
                    elf_path,
                ) {
                    SyscallResult::Continue(ret) => {
                        lcpu.cpu.gpr[10] = ret;
                        lcpu.cpu.pc += 4; // skip past ECALL
                    }
                    SyscallResult::Exit(code) => {
                        if args.stats {
                            eprint!("{}", env.stats);
                        }
                        std::process::exit(code);
                    }
                }
            }
            ExitReason::Exit(v) if v == EXCP_EBREAK as usize => {
                if args.stats {
                    eprint!("{}", env.stats);
                }
                log::error!("ebreak at pc={:#x}", lcpu.cpu.pc);
                std::process::exit(1);
            }
            ExitReason::Exit(v) if v == EXCP_UNDEF as usize => {
                if args.stats {
                    eprint!("{}", env.stats);
                }
                log::error!("illegal instruction at pc={:#x}", lcpu.cpu.pc);
                std::process::exit(1);
            }
            ExitReason::Exit(v) => {
                if args.stats {
                    eprint!("{}", env.stats);
                }
                log::error!("unexpected exit {v}");
                std::process::exit(1);
            }
            ExitReason::BufferFull => {
                // tb_gen_code already flushed and attempted to grow
                // the arena once; reaching here means the arena is
                // exhausted even empty and at its configured cap.
                if args.stats {
                    eprint!("{}", env.stats);
                }
                log::error!("code arena exhausted at its configured cap");
                std::process::exit(1);
            }
        }
    }
}
