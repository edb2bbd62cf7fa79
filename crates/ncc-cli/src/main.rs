//! `ncc`: compile a source file with the NCC compiler module and run it.
//!
//! ```text
//! ncc hello.cpp                        # compile and run start()/main()
//! ncc game.cpp --frames 120 --fps 60   # also drive update()/loop()
//! ncc hello.cpp -o user.wasm --no-run  # only write the module
//! ncc hello.cpp --json                 # print the CompileResult
//! ```
//!
//! Guest output goes to stdout; logs go to stderr (`RUST_LOG`).

mod clock;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ncc_host::{BridgeConfig, Canvas, Compiler, DrawCall, Loader, Program, StdoutSink};
use tracing_subscriber::EnvFilter;

use crate::clock::FixedStepClock;

#[derive(Debug, Parser)]
#[command(name = "ncc", version, about = "Compile and run programs with the NCC compiler module")]
struct Cli {
    /// Source file to compile.
    source: PathBuf,

    /// Compiler module.
    #[arg(short, long, env = "NCC_COMPILER", default_value = "cpp.wasm")]
    compiler: PathBuf,

    /// Write the produced module to this path.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Do not run the produced module.
    #[arg(long)]
    no_run: bool,

    /// Frames to drive through `update`/`loop` after start.
    #[arg(long, default_value_t = 0)]
    frames: u32,

    /// Frame rate used to compute elapsed and delta seconds.
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Bridge configuration file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pass the source to the compiler untouched.
    #[arg(long)]
    no_preprocess: bool,

    /// Print the compile result as JSON and exit.
    #[arg(long)]
    json: bool,

    /// Seed for the guest's `random` import.
    #[arg(long)]
    seed: Option<u64>,
}

/// Logs draw calls; the CLI has nowhere to render them.
struct TracingCanvas;

impl Canvas for TracingCanvas {
    fn draw(&mut self, call: DrawCall) {
        tracing::info!(?call, "draw");
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            BridgeConfig::from_json(&json)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => BridgeConfig::default(),
    };
    if cli.no_preprocess {
        config.preprocess = false;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let loader = Loader::with_config(load_config(&cli)?)?;
    let mut compiler = Compiler::load_file(&loader, &cli.compiler, loader.import_table(StdoutSink))
        .with_context(|| format!("loading compiler {}", cli.compiler.display()))?;
    let source = std::fs::read_to_string(&cli.source)
        .with_context(|| format!("reading {}", cli.source.display()))?;

    if cli.json {
        let result = compiler.compile_to_result(&source);
        compiler.flush_output();
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let bytes = compiler
        .compile_to_vec(&source)
        .with_context(|| format!("compiling {}", cli.source.display()))?;
    compiler.flush_output();
    tracing::info!(len = bytes.len(), "compiled {}", cli.source.display());

    if let Some(out) = &cli.out {
        std::fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    }
    if cli.no_run {
        return Ok(ExitCode::SUCCESS);
    }

    let mut imports = loader.import_table(StdoutSink).with_canvas(TracingCanvas);
    if let Some(seed) = cli.seed {
        imports = imports.with_seed(seed);
    }
    let mut program = Program::load(&loader, &bytes, imports).context("loading compiled program")?;
    let status = program.start().context("running start")?;

    if program.has_frame_callback() {
        let mut clock = FixedStepClock::new(cli.fps);
        for _ in 0..cli.frames {
            let (elapsed, delta) = clock.tick();
            program.frame(elapsed, delta).context("running frame")?;
        }
    }
    program.flush_output();

    Ok(match status {
        Some(code) if code != 0 => ExitCode::from(code.clamp(1, 255) as u8),
        _ => ExitCode::SUCCESS,
    })
}
