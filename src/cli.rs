// Idiomatic Rust CLI for Oxibps.
//
// `apply SOURCE PATCH OUTPUT` is the main entry; `info` and `delta`
// inspect a patch without a source; `config` prints build settings.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::warn;

use crate::bps::decoder::{ApplyOptions, DEFAULT_MAX_TARGET_SIZE, PatchDecoder, Verify};
use crate::bps::header::FOOTER_LEN;
use crate::bps::instruction::Opcode;
use crate::io::{ApplyStats, apply_file, apply_to_sink, read_input};

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// BPS binary patch applier.
#[derive(Parser, Debug)]
#[command(
    name = "oxibps",
    version,
    about = "Apply BPS patches",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a patch to a source file.
    Apply(ApplyArgs),
    /// Print the header and footer of a patch.
    Info(PrintArgs),
    /// Print the header and every instruction of a patch.
    Delta(PrintArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VerifyArg {
    /// Source checksum only (always checked).
    Source,
    /// Also check the reconstructed target checksum.
    Target,
    /// Also check the patch checksum.
    Patch,
    /// Check every footer checksum.
    All,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Original file the patch was made against.
    #[arg(value_hint = ValueHint::FilePath)]
    source: PathBuf,

    /// BPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Where to write the patched file.
    #[arg(value_hint = ValueHint::FilePath, required_unless_present = "no_output")]
    output: Option<PathBuf>,

    /// Checksums to verify (repeatable).
    #[arg(long, value_enum, action = ArgAction::Append)]
    verify: Vec<VerifyArg>,

    /// Check/compute only (do not write output).
    #[arg(long = "check-only")]
    no_output: bool,

    /// Refuse patches whose target is larger than this (supports K/M/G suffix).
    #[arg(long = "max-target-size", value_parser = parse_byte_size, default_value_t = DEFAULT_MAX_TARGET_SIZE)]
    max_target_size: u64,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// BPS patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Apply,
    Info,
    Delta,
    Config,
}

struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    no_output: bool,
    verify: Verify,
    max_target_size: u64,
    source_file: Option<PathBuf>,
    patch_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn verify_flags(args: &[VerifyArg]) -> Verify {
    args.iter().fold(Verify::empty(), |acc, v| {
        acc | match v {
            VerifyArg::Source => Verify::empty(),
            VerifyArg::Target => Verify::TARGET,
            VerifyArg::Patch => Verify::PATCH,
            VerifyArg::All => Verify::ALL,
        }
    })
}

fn resolve_options(cli: Cli) -> Options {
    let base = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        no_output: false,
        verify: Verify::empty(),
        max_target_size: DEFAULT_MAX_TARGET_SIZE,
        source_file: None,
        patch_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Apply(args) => Options {
            command: Command::Apply,
            no_output: args.no_output,
            verify: verify_flags(&args.verify),
            max_target_size: args.max_target_size,
            source_file: Some(args.source),
            patch_file: Some(args.patch),
            output_file: args.output,
            ..base
        },
        Cmd::Info(args) => Options {
            command: Command::Info,
            patch_file: Some(args.input),
            ..base
        },
        Cmd::Delta(args) => Options {
            command: Command::Delta,
            patch_file: Some(args.input),
            ..base
        },
        Cmd::Config => base,
    }
}

const SUBCOMMANDS: &[&str] = &["apply", "info", "delta", "config", "help"];

/// `oxibps SOURCE PATCH OUTPUT` is shorthand for `oxibps apply SOURCE PATCH OUTPUT`.
fn with_default_command(mut argv: Vec<OsString>) -> Vec<OsString> {
    let needs_apply = argv
        .iter()
        .skip(1)
        .map(|a| a.to_string_lossy())
        .find(|a| !a.starts_with('-'))
        .is_some_and(|a| !SUBCOMMANDS.contains(&&*a));
    if needs_apply {
        argv.insert(1, OsString::from("apply"));
    }
    argv
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<OsString> = std::iter::once(OsString::from("oxibps"))
        .chain(args.iter().map(OsString::from))
        .collect();
    if let Ok(cli) = Cli::try_parse_from(with_default_command(argv)) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxibps version {version} (Rust), Copyright (C) oxibps contributors");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("BPS_FOOTER_LEN={FOOTER_LEN}");
    eprintln!("DEFAULT_MAX_TARGET_SIZE={DEFAULT_MAX_TARGET_SIZE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Apply command
// ---------------------------------------------------------------------------

fn build_apply_options(opts: &Options) -> ApplyOptions {
    ApplyOptions {
        verify: opts.verify,
        max_target_size: opts.max_target_size,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn report_apply(opts: &Options, stats: &ApplyStats) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxibps: applied: output size: {}, instructions: {}",
            stats.output_size, stats.instructions
        );
    }
    if opts.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "source_size": stats.source_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "instructions": stats.instructions,
            "source_crc32": format!("{:08x}", stats.source_crc),
            "target_crc32": format!("{:08x}", stats.target_crc),
            "output_sha256": stats.output_sha256.map(|h| hex(&h)),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => eprintln!("oxibps: json: {e}"),
        }
    }
}

fn cmd_apply(opts: &Options) -> i32 {
    let (Some(source), Some(patch)) = (&opts.source_file, &opts.patch_file) else {
        eprintln!("oxibps: apply requires a source and a patch file");
        return 1;
    };
    let apply_opts = build_apply_options(opts);

    let result = if opts.no_output {
        apply_to_sink(source, patch, &mut io::sink(), &apply_opts)
    } else {
        let Some(output) = &opts.output_file else {
            eprintln!("oxibps: apply requires an output file (or --check-only)");
            return 1;
        };
        if output.exists() {
            if !opts.force {
                eprintln!(
                    "oxibps: output file exists, use -f to overwrite: {}",
                    output.display()
                );
                return 1;
            }
            warn!("overwriting {}", output.display());
        }
        apply_file(source, patch, output, &apply_opts)
    };

    match result {
        Ok(stats) => {
            report_apply(opts, &stats);
            0
        }
        Err(e) => {
            eprintln!("oxibps: {} error: {e}", e.category());
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Print commands (info, delta)
// ---------------------------------------------------------------------------

fn cmd_print(opts: &Options) -> i32 {
    let Some(path) = &opts.patch_file else {
        eprintln!("oxibps: print commands require an input file");
        return 1;
    };
    let patch = match read_input(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("oxibps: {e}");
            return 1;
        }
    };
    let decoder = match PatchDecoder::new(&patch) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("oxibps: invalid BPS patch: {e}");
            return 1;
        }
    };
    let header = decoder.header();
    let footer = decoder.footer();
    let patch_ok = decoder.verify_patch_checksum().is_ok();

    println!("BPS patch size:               {}", patch.len());
    println!("BPS source size:              {}", header.source_size);
    println!("BPS target size:              {}", header.target_size);
    println!("BPS metadata size:            {}", header.metadata.len());
    if !header.metadata.is_empty() {
        let s = String::from_utf8_lossy(&header.metadata);
        println!("BPS metadata:                 {s}");
    }
    println!("BPS source checksum:          {:08X}", footer.source_crc);
    println!("BPS target checksum:          {:08X}", footer.target_crc);
    println!(
        "BPS patch checksum:           {:08X} ({})",
        footer.patch_crc,
        if patch_ok { "ok" } else { "MISMATCH" }
    );

    let mut counts = [0u64; 4];
    let mut bytes = [0u64; 4];
    if opts.command == Command::Delta {
        println!();
        println!("  Offset Instruction      Length Delta");
    }
    for item in decoder.instructions() {
        let (at, inst) = match item {
            Ok(v) => v,
            Err(e) => {
                eprintln!("oxibps: instruction stream: {e}");
                return 1;
            }
        };
        let slot = inst.opcode() as usize;
        counts[slot] += 1;
        bytes[slot] += inst.len() as u64;
        if opts.command == Command::Delta {
            println!("{at:08} {inst}");
        }
    }

    println!();
    for op in [
        Opcode::SourceRead,
        Opcode::TargetRead,
        Opcode::SourceCopy,
        Opcode::TargetCopy,
    ] {
        let i = op as usize;
        println!("{:<12} count {:>10}  bytes {:>12}", op.name(), counts[i], bytes[i]);
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": if opts.command == Command::Delta { "delta" } else { "info" },
            "patch_size": patch.len(),
            "source_size": header.source_size,
            "target_size": header.target_size,
            "metadata_size": header.metadata.len(),
            "source_crc32": format!("{:08x}", footer.source_crc),
            "target_crc32": format!("{:08x}", footer.target_crc),
            "patch_crc32": format!("{:08x}", footer.patch_crc),
            "patch_crc32_ok": patch_ok,
            "instructions": counts.iter().sum::<u64>(),
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => eprintln!("{s}"),
            Err(e) => eprintln!("oxibps: json: {e}"),
        }
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse_from(with_default_command(std::env::args_os().collect()));
    let opts = resolve_options(cli);

    let level = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Apply => cmd_apply(&opts),
        Command::Info | Command::Delta => cmd_print(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
