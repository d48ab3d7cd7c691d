use super::{RunnerArgs, ToolchainArgs};
use miette::{IntoDiagnostic, Result};
use procbench_core::bench::scenario::parse_values;
use procbench_core::bench::{program_name, MachineInfo, REPORT_SCHEMA_VERSION};
use procbench_core::{
    compile, BenchmarkRunner, CompiledProgram, Config, RunConfiguration, RunResult, SweepPlan,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

/// Arguments of `procbench run`.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Source file (or executable with --prebuilt)
    pub source: PathBuf,

    /// Treat SOURCE as an already built executable
    #[arg(long)]
    pub prebuilt: bool,

    /// Configuration values, e.g. `10,3,6`
    #[arg(short = 'c', long = "config", value_name = "VALUES", default_value = "10,3,6")]
    pub config: String,

    /// Names of the configuration values, comma separated
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub param_names: Vec<String>,

    #[command(flatten)]
    pub runner: RunnerArgs,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    schema_version: u32,
    program: String,
    configuration: &'a RunConfiguration,
    machine: MachineInfo,
    result: &'a RunResult,
}

/// Compile (unless prebuilt) and run one program once.
pub fn run(config: &Config, args: &RunArgs, json: bool) -> Result<()> {
    let source = config.resolve(&args.source);
    let mut plan = SweepPlan {
        programs: vec![source.clone()],
        configurations: vec![parse_values(&args.config).into_diagnostic()?],
        parameter_names: args.param_names.clone(),
        ..SweepPlan::default()
    };
    args.runner.apply(&mut plan, config);
    args.toolchain.apply(&mut plan);
    let params = plan.into_params(&config.cwd).into_diagnostic()?;

    let Some(configuration) = params.configurations.first() else {
        return Err(miette::miette!("no configuration given"));
    };

    let program = if args.prebuilt {
        CompiledProgram::prebuilt(&source)
    } else {
        compile(&params.toolchain, &source).into_diagnostic()?
    };

    info!(program = %source.display(), %configuration, "single run");
    let runner = BenchmarkRunner::new(params.runner.clone()).into_diagnostic()?;
    let result = runner.run(&program, configuration).into_diagnostic()?;

    let report = RunReport {
        schema_version: REPORT_SCHEMA_VERSION,
        program: program_name(&source),
        configuration,
        machine: MachineInfo::detect(),
        result: &result,
    };

    if json {
        let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{json}");
    } else {
        print_human(&report)?;
    }
    Ok(())
}

fn print_human(report: &RunReport<'_>) -> Result<()> {
    let mut out = io::stdout().lock();
    let r = report.result;

    writeln!(
        out,
        "\x1b[1m{}\x1b[0m  {}",
        report.program, report.configuration
    )
    .into_diagnostic()?;
    writeln!(out).into_diagnostic()?;

    let rows: [(&str, String); 12] = [
        ("Latency", format!("{:.3} s", r.latency_seconds)),
        ("Lines", r.lines_processed.to_string()),
        ("Throughput", format!("{:.1} lines/s", r.throughput_lines_per_second)),
        ("User CPU", format!("{:.3} s", r.user_time_seconds)),
        ("System CPU", format!("{:.3} s", r.system_time_seconds)),
        ("CPU (raw)", format!("{:.1} %", r.cpu_utilization_raw)),
        (
            "CPU (per core)",
            format!(
                "{:.1} % of {} cores",
                r.cpu_utilization_normalized, report.machine.cores
            ),
        ),
        ("Sampled CPU", format!("{:.1} %", r.avg_cpu_percent)),
        ("Memory (avg)", format!("{:.2} MB", r.avg_memory_mb)),
        ("Memory (peak)", format!("{:.2} MB", r.max_memory_mb)),
        (
            "Threads",
            format!("{:.1} ({} samples)", r.avg_thread_count, r.sample_count),
        ),
        (
            "Exit",
            r.exit_code
                .map_or_else(|| "killed by signal".to_string(), |c| c.to_string()),
        ),
    ];
    for (name, value) in rows {
        writeln!(out, "  {name:<16} {value}").into_diagnostic()?;
    }

    out.flush().into_diagnostic()?;
    Ok(())
}
