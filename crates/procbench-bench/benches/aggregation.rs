use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use procbench_core::bench::report::{BenchmarkReport, ConfigurationStats, ProgramReport};
use procbench_core::bench::runner::{RunMeasurements, RunResult};
use procbench_core::bench::rusage::CpuTimes;
use procbench_core::bench::sampler::{ResourceSample, SampleSummary};
use procbench_core::{compute_stats, RunConfiguration, SweepParams};
use std::path::PathBuf;
use std::time::Duration;

fn samples(n: usize) -> Vec<ResourceSample> {
    (0..n)
        .map(|i| ResourceSample {
            elapsed: Duration::from_millis(100 * i as u64),
            cpu_percent: (i % 400) as f64,
            resident_memory_bytes: 1024 * 1024 * (1 + i as u64 % 64),
            thread_count: 1 + (i % 16) as u32,
        })
        .collect()
}

fn bench_compute_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_stats");

    for size in [5, 100, 10_000] {
        let series: Vec<f64> = (0..size).map(|i| f64::from(i) * 0.37).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &series, |b, series| {
            b.iter(|| compute_stats(black_box(series)));
        });
    }

    group.finish();
}

fn bench_sample_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_summary");

    // 100ms cadence: 10s, 100s and ~17min runs.
    for size in [100, 1_000, 10_000] {
        let data = samples(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| SampleSummary::from_samples(black_box(data)));
        });
    }

    group.finish();
}

fn run_result(sample_count: usize) -> RunResult {
    let data = samples(sample_count);
    RunResult::from_measurements(&RunMeasurements {
        wall: Duration::from_millis(1_500),
        cpu: CpuTimes {
            user: Duration::from_millis(2_400),
            system: Duration::from_millis(300),
        },
        lines: 10_000,
        samples: &data,
        cores: 8,
        exit_code: Some(0),
    })
}

fn bench_report_finalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_finalize");
    let configurations: Vec<RunConfiguration> = [[10, 3, 6], [100, 6, 3], [1000, 10, 8]]
        .iter()
        .map(|v| RunConfiguration::from_values(v))
        .collect();

    for programs in [2, 8, 32] {
        let mut base = BenchmarkReport::new(
            SweepParams {
                programs: Vec::new(),
                configurations: configurations.clone(),
                ..SweepParams::default()
            }
            .summary(),
        );
        for p in 0..programs {
            base.add_program(ProgramReport {
                program: format!("program_{p}.c"),
                source: PathBuf::from(format!("program_{p}.c")),
                configurations: configurations
                    .iter()
                    .map(|config| {
                        ConfigurationStats::from_runs(
                            config.clone(),
                            (0..5).map(|_| run_result(20)).collect(),
                            0,
                        )
                    })
                    .collect(),
            });
        }

        group.bench_with_input(BenchmarkId::from_parameter(programs), &base, |b, base| {
            b.iter(|| {
                let mut report = base.clone();
                report.finalize();
                black_box(report.rankings.len())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compute_stats,
    bench_sample_summary,
    bench_report_finalize
);
criterion_main!(benches);
