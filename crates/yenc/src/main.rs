mod diagnostics;
mod interpreter;
mod parser;
mod pipeline;
mod reader;
mod tokenizer;

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::diagnostics::Diagnostic;
use crate::reader::SourceFile;

fn main() -> anyhow::Result<ExitCode> {
    initialize_logging();

    let yenc = Yenc::parse();
    let current_dir = env::current_dir()?;

    let outcome = match yenc.subcmd {
        YencSubcommand::Run(opts) => run(&current_dir, opts),
        YencSubcommand::Check(opts) => check(&current_dir, opts),
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(diagnostic) => {
            eprintln!("{}", diagnostic.render_terminal_auto());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn load(opts: &SourceOpts) -> Result<SourceFile, Diagnostic> {
    reader::read_source(&opts.source).map_err(|err| diagnostics::from_read_error(&err))
}

fn emit_dir(current_dir: &Path, opts: &SourceOpts) -> Option<PathBuf> {
    opts.emit
        .then(|| current_dir.join("target").join("yenc"))
}

fn run(current_dir: &Path, opts: SourceOpts) -> Result<(), Diagnostic> {
    let source = load(&opts)?;
    let emit_dir = emit_dir(current_dir, &opts);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    pipeline::run(&source, emit_dir.as_deref(), stdin.lock(), stdout.lock())
        .map_err(|err| err.to_diagnostic(&source))?;

    println!("Build completed successfully!");
    Ok(())
}

fn check(current_dir: &Path, opts: SourceOpts) -> Result<(), Diagnostic> {
    let source = load(&opts)?;
    let emit_dir = emit_dir(current_dir, &opts);

    let ast = pipeline::front_end(&source, emit_dir.as_deref())
        .map_err(|err| err.to_diagnostic(&source))?;
    debug!(nodes = ast.size(), "Checked source file");
    info!(path = %source.path().display(), "Syntax OK");

    println!("Syntax OK: {} statement(s)", ast.children.len());
    Ok(())
}

fn initialize_logging() {
    let env_filter = env::var("RUST_LOG").unwrap_or_default();
    let filter = EnvFilter::from_str(&env_filter).unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}

#[derive(clap::Parser)]
#[clap(name = "yenc", about = "Run Yen scripts.")]
struct Yenc {
    #[clap(subcommand)]
    subcmd: YencSubcommand,
}

#[derive(clap::Subcommand)]
enum YencSubcommand {
    /// Tokenize, parse and execute a source file
    Run(SourceOpts),
    /// Tokenize and parse a source file without executing it
    Check(SourceOpts),
}

#[derive(clap::Parser, Debug)]
struct SourceOpts {
    /// Path to the source file
    source: PathBuf,

    /// Write tokens.json and ast.json to target/yenc
    #[clap(long)]
    emit: bool,
}
