//! CONTEXT: Scatter-load file generator tool
//! INTENT: Turn a linker map report plus a region topology into an armlink scatter file
//! IDL (target): generate(config), dumpObjects(path)
//! DEPS: nexus_scatter (placement + rendering), clap (arguments), env_logger (diagnostics)
//! READINESS: Command-line tool; no service dependencies
//! TESTS: Generate from config; output override; strict mode; missing inputs
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use log::warn;
use nexus_scatter::{emit, load_objects, write_script, Config};

#[derive(Debug, Parser)]
#[command(name = "sctgen", version, about = "Generate a scatter-load file from a linker map report")]
struct Cli {
    /// Generator configuration (TOML).
    config: PathBuf,
    /// Write the scatter file here instead of `file.out_sct_file`.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Also write the parsed object table (tab separated) to PATH.
    #[arg(long, value_name = "PATH")]
    dump_objects: Option<PathBuf>,
    /// Fail on oversubscribed load regions and unplaced objects.
    #[arg(long)]
    strict: bool,
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sctgen: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load(&cli.config)?;
    if let Some(output) = &cli.output {
        config.output = output.clone();
    }

    let violations = config.topology.capacity_violations();
    if cli.strict {
        if let Some(first) = violations.first() {
            return Err(format!(
                "{}: execution regions declare {} bytes but the load region holds {}",
                emit::load_region_label(first.load_index),
                first.exec_total,
                first.load_size
            )
            .into());
        }
    }

    let objects = load_objects(&config)?;
    if let Some(path) = &cli.dump_objects {
        let mut out = BufWriter::new(File::create(path)?);
        objects.write_dump(&mut out)?;
        out.flush()?;
    }

    let report = write_script(&config, objects)?;
    println!(
        "sctgen: {} placed, {} unplaced, {} diagnostic(s) -> {}",
        report.placed,
        report.unplaced.len(),
        report.diagnostics.len(),
        config.output.display()
    );

    if !report.unplaced.is_empty() {
        if cli.strict {
            return Err(format!("unplaced objects: {}", report.unplaced.join(", ")).into());
        }
        warn!("scatter file written with {} unplaced object(s)", report.unplaced.len());
    }
    Ok(())
}
