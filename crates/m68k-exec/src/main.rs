//! `m68k-exec`: run a user-mode 68000 program image to completion.
//!
//! The image is loaded raw into the guest code segment and entered
//! C-style with argc/argv. The guest's exit value becomes the process
//! exit code; abnormal terminations re-raise the host signal a native
//! process would have died from: SIGSEGV for a halted machine, SIGILL
//! for an unresolved fault, SIGXCPU for a blown instruction quota.

mod host;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use host::HostDispatch;
use m68k_core::{build_boot_image, run, Cpu, MemoryLayout, RunOutcome, RunPolicy};

/// Instruction quota; unset, zero, or unparsable values disable it.
const INSTRUCTION_LIMIT_VAR: &str = "M68K_INSTRUCTION_LIMIT";

#[cfg(unix)]
use libc::{SIGILL, SIGSEGV, SIGXCPU};
#[cfg(not(unix))]
const SIGILL: i32 = 4;
#[cfg(not(unix))]
const SIGSEGV: i32 = 11;
#[cfg(not(unix))]
const SIGXCPU: i32 = 24;

#[derive(Debug, Parser)]
#[command(name = "m68k-exec", version, about = "Runs a user-mode 68000 program image")]
struct Args {
    /// Raw 68000 program image, loaded at the code address.
    image: PathBuf,

    /// Arguments passed through to the guest program.
    #[arg(trailing_var_arg = true)]
    guest_args: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(Level::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let layout = MemoryLayout::default();

    let code = load_code(&args.image)?;
    info!(image = %args.image.display(), bytes = code.len(), "loaded program");

    let mut guest_argv = vec![args.image.display().to_string()];
    guest_argv.extend(args.guest_args.iter().cloned());

    let mem = build_boot_image(&layout, &code, &guest_argv).context("building the boot image")?;
    let mut cpu = Cpu::new(mem);
    cpu.reset();

    let policy = RunPolicy {
        instruction_limit: instruction_limit(),
    };
    let outcome = run(&mut cpu, layout.system_pb(), &mut HostDispatch, policy);
    debug!(instructions = cpu.instruction_count(), ?outcome, "run ended");

    match outcome {
        RunOutcome::Finished { result } => std::process::exit(result as i32),
        RunOutcome::Halted => die_with_signal(SIGSEGV),
        RunOutcome::Breakpoint(family) => {
            warn!(family = family.index(), "guest faulted");
            die_with_signal(SIGILL)
        }
        RunOutcome::QuotaExceeded => die_with_signal(SIGXCPU),
    }
}

/// Reads the program image; a missing file runs with a zeroed code
/// segment rather than failing outright.
fn load_code(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            warn!(image = %path.display(), "image not found; code segment left zeroed");
            Ok(Vec::new())
        }
        Err(error) => {
            Err(error).with_context(|| format!("reading image {}", path.display()))
        }
    }
}

fn instruction_limit() -> Option<u64> {
    let raw = std::env::var(INSTRUCTION_LIMIT_VAR).ok()?;
    parse_instruction_limit(&raw)
}

/// A missing, zero, or unparsable value runs without a quota.
fn parse_instruction_limit(raw: &str) -> Option<u64> {
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(limit) => Some(limit),
        Err(_) => {
            warn!(value = raw, "ignoring unparsable {INSTRUCTION_LIMIT_VAR}");
            None
        }
    }
}

#[cfg(unix)]
fn die_with_signal(signal: i32) -> ! {
    unsafe {
        libc::raise(signal);
    }
    // Reached only if the signal is blocked or ignored.
    std::process::exit(128 + signal)
}

#[cfg(not(unix))]
fn die_with_signal(signal: i32) -> ! {
    std::process::exit(128 + signal)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{load_code, parse_instruction_limit};

    #[test]
    fn a_present_image_is_read_whole() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x70, 0x2A, 0x4E, 0x75]).unwrap();
        let code = load_code(file.path()).unwrap();
        assert_eq!(code, vec![0x70, 0x2A, 0x4E, 0x75]);
    }

    #[test]
    fn a_missing_image_yields_an_empty_code_segment() {
        let dir = tempfile::tempdir().unwrap();
        let code = load_code(&dir.path().join("no-such-image")).unwrap();
        assert!(code.is_empty());
    }

    #[test]
    fn a_positive_quota_is_honored() {
        assert_eq!(parse_instruction_limit("500"), Some(500));
    }

    #[test]
    fn a_zero_quota_disables_the_limit() {
        assert_eq!(parse_instruction_limit("0"), None);
    }

    #[test]
    fn an_unparsable_quota_disables_the_limit() {
        assert_eq!(parse_instruction_limit("banana"), None);
        assert_eq!(parse_instruction_limit("-1"), None);
        assert_eq!(parse_instruction_limit(""), None);
    }
}
