use super::{format_stat, RunnerArgs, ToolchainArgs};
use miette::{miette, IntoDiagnostic, Result};
use procbench_core::bench::scenario::parse_values;
use procbench_core::bench::{BenchmarkReport, ConfigurationStats, Severity};
use procbench_core::{run_sweep, CompilePolicy, Config, SweepParams, SweepPlan};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

/// Arguments of `procbench sweep`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SweepArgs {
    /// Source files to benchmark (default: discover in --dir)
    pub programs: Vec<PathBuf>,

    /// JSON sweep plan; flags override its values
    #[arg(long, value_name = "PATH")]
    pub plan: Option<PathBuf>,

    /// Directory searched for sources when none are given
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Source extension used for discovery
    #[arg(long, value_name = "EXT")]
    pub ext: Option<String>,

    /// Configuration values, e.g. `10,3,6` (repeatable)
    #[arg(short = 'c', long = "config", value_name = "VALUES")]
    pub configs: Vec<String>,

    /// Names of the configuration values, comma separated
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub param_names: Vec<String>,

    /// Repetitions per configuration
    #[arg(short = 'n', long, value_name = "N")]
    pub repetitions: Option<u32>,

    /// When to compile: `per-program` or `per-run`
    #[arg(long, value_name = "POLICY")]
    pub compile_policy: Option<CompilePolicy>,

    #[command(flatten)]
    pub runner: RunnerArgs,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

/// Run the sweep command.
///
/// The report is always printed; the command fails afterwards if a program
/// did not compile or nothing was measured.
pub fn run(config: &Config, args: &SweepArgs, json: bool) -> Result<()> {
    let params = build_params(config, args)?;
    info!(
        programs = params.programs.len(),
        configurations = params.configurations.len(),
        repetitions = params.repetitions,
        "starting sweep"
    );

    let report = run_sweep(&params).into_diagnostic()?;

    if json {
        print_json(&report)?;
    } else {
        print_human(&report)?;
    }

    if !report.failures.is_empty() {
        return Err(miette!(
            "{} program(s) failed to compile",
            report.failures.len()
        ));
    }
    if report.is_empty() {
        return Err(miette!("the sweep produced no results"));
    }
    Ok(())
}

fn build_params(config: &Config, args: &SweepArgs) -> Result<SweepParams> {
    let (mut plan, base_dir) = match &args.plan {
        Some(path) => {
            let path = config.resolve(path);
            let plan = SweepPlan::load(&path).into_diagnostic()?;
            let base = path
                .parent()
                .map_or_else(|| config.cwd.clone(), std::path::Path::to_path_buf);
            (plan, base)
        }
        None => (SweepPlan::default(), config.cwd.clone()),
    };

    if !args.programs.is_empty() {
        plan.programs = args.programs.iter().map(|p| config.resolve(p)).collect();
    }
    if let Some(dir) = &args.dir {
        plan.source_dir = Some(config.resolve(dir));
    }
    if let Some(ext) = &args.ext {
        plan.extension = Some(ext.clone());
    }
    if !args.configs.is_empty() {
        plan.configurations = args
            .configs
            .iter()
            .map(|c| parse_values(c))
            .collect::<procbench_core::Result<_>>()
            .into_diagnostic()?;
    }
    if !args.param_names.is_empty() {
        plan.parameter_names.clone_from(&args.param_names);
    }
    if let Some(n) = args.repetitions {
        plan.repetitions = Some(n);
    }
    if let Some(policy) = args.compile_policy {
        plan.compile_policy = Some(policy);
    }
    args.runner.apply(&mut plan, config);
    args.toolchain.apply(&mut plan);

    plan.into_params(&base_dir).into_diagnostic()
}

fn print_json(report: &BenchmarkReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn print_human(report: &BenchmarkReport) -> Result<()> {
    let mut out = io::stdout().lock();

    writeln!(out, "\x1b[1mprocbench sweep\x1b[0m").into_diagnostic()?;
    writeln!(out).into_diagnostic()?;
    writeln!(
        out,
        "Machine: {} ({} cores, {} {})",
        report.machine.cpu, report.machine.cores, report.machine.os, report.machine.arch
    )
    .into_diagnostic()?;
    writeln!(
        out,
        "Toolchain: {} ({})",
        report.params.toolchain, report.params.compile_policy
    )
    .into_diagnostic()?;
    writeln!(
        out,
        "Runs: {} repetition(s) x {} configuration(s), launch: {}, sampling every {}ms",
        report.params.repetitions,
        report.params.configurations.len(),
        report.params.launch_mode,
        report.params.sample_interval_ms
    )
    .into_diagnostic()?;

    for program in &report.programs {
        writeln!(out).into_diagnostic()?;
        writeln!(out, "\x1b[1m{}\x1b[0m", program.program).into_diagnostic()?;
        if program.configurations.is_empty() {
            writeln!(out, "  no successful runs").into_diagnostic()?;
            continue;
        }
        for stats in &program.configurations {
            write_details(&mut out, stats)?;
        }
        writeln!(out).into_diagnostic()?;
        write_summary(&mut out, &program.configurations)?;
    }

    if report.programs.iter().any(|p| !p.configurations.is_empty()) {
        write_comparison(&mut out, report)?;
        write_pivots(&mut out, report)?;
        write_rankings(&mut out, report)?;
    }

    if !report.failures.is_empty() {
        writeln!(out).into_diagnostic()?;
        writeln!(out, "\x1b[1;31mFailed programs\x1b[0m").into_diagnostic()?;
        for failure in &report.failures {
            writeln!(out, "  {}: {}", failure.program, failure.error).into_diagnostic()?;
        }
    }

    if !report.warnings.is_empty() {
        writeln!(out).into_diagnostic()?;
        writeln!(
            out,
            "\x1b[1mWarnings\x1b[0m ({} total)",
            report.warnings.len()
        )
        .into_diagnostic()?;
        for warning in &report.warnings {
            let prefix = match warning.severity {
                Severity::Info => "\x1b[34minfo\x1b[0m",
                Severity::Warn => "\x1b[33mwarn\x1b[0m",
            };
            writeln!(out, "  [{prefix}] {}: {}", warning.code, warning.message)
                .into_diagnostic()?;
        }
    }

    out.flush().into_diagnostic()?;
    Ok(())
}

fn write_details(out: &mut impl Write, stats: &ConfigurationStats) -> Result<()> {
    writeln!(out, "  {}", stats.configuration).into_diagnostic()?;
    writeln!(
        out,
        "    {:>3} {:>10} {:>12} {:>9} {:>9} {:>9} {:>9} {:>8} {:>5}",
        "#", "Latency", "Lines/s", "CPU %", "CPU/core", "Mem MB", "Peak MB", "Threads", "Exit"
    )
    .into_diagnostic()?;
    for (i, run) in stats.runs.iter().enumerate() {
        let exit = run
            .exit_code
            .map_or_else(|| "sig".to_string(), |c| c.to_string());
        writeln!(
            out,
            "    {:>3} {:>9.3}s {:>12.1} {:>9.1} {:>9.1} {:>9.2} {:>9.2} {:>8.1} {:>5}",
            i + 1,
            run.latency_seconds,
            run.throughput_lines_per_second,
            run.cpu_utilization_raw,
            run.cpu_utilization_normalized,
            run.avg_memory_mb,
            run.max_memory_mb,
            run.avg_thread_count,
            exit
        )
        .into_diagnostic()?;
    }
    if stats.failed_repetitions > 0 {
        writeln!(out, "    ({} failed)", stats.failed_repetitions).into_diagnostic()?;
    }
    Ok(())
}

fn write_summary(out: &mut impl Write, configurations: &[ConfigurationStats]) -> Result<()> {
    writeln!(
        out,
        "  {:<14} {:>4} {:>18} {:>20} {:>16} {:>14} {:>9} {:>8}",
        "Config", "Runs", "Latency (s)", "Throughput", "CPU %", "Mem MB", "Peak MB", "Threads"
    )
    .into_diagnostic()?;
    writeln!(out, "  {}", "-".repeat(110)).into_diagnostic()?;
    for stats in configurations {
        let m = &stats.metrics;
        writeln!(
            out,
            "  {:<14} {:>4} {:>18} {:>20} {:>16} {:>14} {:>9.2} {:>8.1}",
            stats.label,
            stats.successful_repetitions,
            format_stat(m.latency_seconds.mean, m.latency_seconds.stddev, 3),
            format_stat(
                m.throughput_lines_per_second.mean,
                m.throughput_lines_per_second.stddev,
                1
            ),
            format_stat(m.cpu_utilization_raw.mean, m.cpu_utilization_raw.stddev, 1),
            format_stat(m.avg_memory_mb.mean, m.avg_memory_mb.stddev, 2),
            m.max_memory_mb.max,
            m.avg_thread_count.mean,
        )
        .into_diagnostic()?;
    }
    Ok(())
}

fn write_comparison(out: &mut impl Write, report: &BenchmarkReport) -> Result<()> {
    writeln!(out).into_diagnostic()?;
    writeln!(out, "\x1b[1mComparison\x1b[0m").into_diagnostic()?;
    writeln!(
        out,
        "  {:<20} {:<14} {:>12} {:>14} {:>10} {:>10} {:>8}",
        "Program", "Config", "Latency (s)", "Lines/s", "CPU %", "Mem MB", "Threads"
    )
    .into_diagnostic()?;
    writeln!(out, "  {}", "-".repeat(94)).into_diagnostic()?;
    for program in &report.programs {
        for stats in &program.configurations {
            let m = &stats.metrics;
            writeln!(
                out,
                "  {:<20} {:<14} {:>12.3} {:>14.1} {:>10.1} {:>10.2} {:>8.1}",
                program.program,
                stats.label,
                m.latency_seconds.mean,
                m.throughput_lines_per_second.mean,
                m.cpu_utilization_raw.mean,
                m.avg_memory_mb.mean,
                m.avg_thread_count.mean,
            )
            .into_diagnostic()?;
        }
    }
    Ok(())
}

fn write_pivots(out: &mut impl Write, report: &BenchmarkReport) -> Result<()> {
    let programs: Vec<&str> = report
        .programs
        .iter()
        .filter(|p| !p.configurations.is_empty())
        .map(|p| p.program.as_str())
        .collect();

    for comparison in &report.comparisons {
        writeln!(out).into_diagnostic()?;
        writeln!(
            out,
            "\x1b[1m{} ({})\x1b[0m",
            comparison.metric.title(),
            comparison.metric.unit()
        )
        .into_diagnostic()?;

        write!(out, "  {:<14}", "Config").into_diagnostic()?;
        for name in &programs {
            write!(out, " {name:>16}").into_diagnostic()?;
        }
        writeln!(out).into_diagnostic()?;

        for row in &comparison.rows {
            write!(out, "  {:<14}", row.configuration).into_diagnostic()?;
            for name in &programs {
                let cell = row
                    .values
                    .iter()
                    .find(|v| v.program == *name)
                    .map_or_else(|| "-".to_string(), |v| format!("{:.3}", v.mean));
                write!(out, " {cell:>16}").into_diagnostic()?;
            }
            writeln!(out).into_diagnostic()?;
        }
    }
    Ok(())
}

fn write_rankings(out: &mut impl Write, report: &BenchmarkReport) -> Result<()> {
    writeln!(out).into_diagnostic()?;
    writeln!(out, "\x1b[1mRankings\x1b[0m").into_diagnostic()?;
    for label in report.configuration_labels() {
        writeln!(out, "  {label}").into_diagnostic()?;
        for ranking in report.rankings.iter().filter(|r| r.configuration == label) {
            let order: Vec<String> = ranking
                .order
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{}. {} ({:.3})", i + 1, v.program, v.mean))
                .collect();
            writeln!(
                out,
                "    {:<16} {}",
                ranking.metric.title(),
                order.join("  ")
            )
            .into_diagnostic()?;
        }
    }

    for best in &report.best {
        writeln!(
            out,
            "\x1b[1;32mBest {}: {} [{}] {:.3} {}\x1b[0m",
            best.metric,
            best.program,
            best.configuration,
            best.mean,
            best.metric.unit()
        )
        .into_diagnostic()?;
    }
    Ok(())
}
