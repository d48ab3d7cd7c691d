#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use procbench_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "procbench")]
#[command(author, version, about = "Benchmark external programs across configurations", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Benchmark programs across configurations and repetitions
    Sweep(commands::sweep::SweepArgs),

    /// Run a single program once and print its measurements
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Sweep(args)) => {
            let span = tracing::info_span!("sweep", cmd = "sweep", cwd = %cwd.display());
            let _guard = span.enter();
            commands::sweep::run(&config, &args, cli.json)
        }
        Some(Commands::Run(args)) => {
            let span = tracing::info_span!("run", cmd = "run", cwd = %cwd.display());
            let _guard = span.enter();
            commands::run::run(&config, &args, cli.json)
        }
    }
}
