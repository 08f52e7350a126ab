mod config;
mod describe;
mod diff;
mod editor;
mod error;
mod filter;
mod hunk;
mod iter;
mod line;
mod parse;
mod patch;
mod repl;
mod selftest;
mod stack;

use std::io::IsTerminal;
use std::path::Path;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use error::{exit_code, PatError, Result};
use stack::Stack;

#[derive(Parser, Debug)]
#[command(
    name = "patstack",
    version,
    about = "Algebra lab for stacks of unified-diff patches",
    long_about = None
)]
struct Args {
    /// Patch files to load; the first listed lands at the bottom of the
    /// stack and applies first.
    #[arg(value_name = "PATCH_FILE")]
    files: Vec<String>,

    /// Run the self-test suite on the loaded stack and exit.
    #[arg(short = 't', long)]
    test: bool,

    /// Leading path components stripped when deriving file names.
    #[arg(long, value_name = "N")]
    strip_level: Option<usize>,

    /// Path to config file. Defaults to ./patstack.toml if present.
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// Colorize output. Auto-detects TTY when set to 'auto'.
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorArg,
}

#[derive(ValueEnum, Debug, Clone, PartialEq)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PATSTACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(exit_code::TEST_FAILURES),
        Err(e) => {
            eprintln!("patstack: {e}");
            let code = match &e {
                PatError::FileRead { .. }
                | PatError::FileWrite { .. }
                | PatError::Prompt { .. } => exit_code::IO_ERROR,
                _ => exit_code::USAGE_ERROR,
            };
            process::exit(code);
        }
    }
}

fn load_config(args: &Args) -> Result<config::Config> {
    let mut config = match &args.config {
        Some(path) => config::Config::load(Path::new(path))?,
        None => config::Config::load_from_cwd()?.unwrap_or_default(),
    };
    if let Some(strip_level) = args.strip_level {
        config.strip_level = strip_level;
    }
    Ok(config)
}

fn run(args: Args) -> Result<bool> {
    let config = load_config(&args)?;

    let mut stack = Stack::new("patches");
    for file in &args.files {
        stack.push(parse::load_patch(Path::new(file), &config)?);
    }

    let use_color = match args.color {
        ColorArg::Always => true,
        ColorArg::Never => false,
        ColorArg::Auto => std::io::stdout().is_terminal(),
    };

    if args.test {
        let report = selftest::run(&stack, use_color);
        for failure in &report.failures {
            eprintln!("FAILED: {failure}");
        }
        return Ok(report.ok());
    }

    repl::run(&mut stack, &config, use_color)?;
    Ok(true)
}
