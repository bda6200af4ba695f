use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use jobbench::config::BatchConfig;
use jobbench::describe;
use jobbench::display;
use jobbench::enumerate::{self, Selection};
use jobbench::persist;
use jobbench::timing;
use jobbench::types::{BatchSummary, FailurePolicy, JobStatus, RunResult};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a corpus directory with `size` input files. Idempotent: reuses the
/// directory if it was already populated.
fn setup_corpus(size: usize) -> PathBuf {
    let root = std::env::temp_dir().join(format!("jobbench_criterion_{}", size));
    let marker = root.join(".bench_ready");

    if marker.exists() {
        return root;
    }

    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&root).unwrap();

    for i in 0..size {
        fs::write(root.join(format!("q_{}_{}.tt", 6 + i % 5, i)), "0 1 1 0\n").unwrap();
    }
    // Noise the enumerator has to skip.
    fs::create_dir_all(root.join("classic")).unwrap();
    fs::write(root.join("notes.md"), "corpus notes").unwrap();

    fs::write(&marker, "ok").unwrap();
    root
}

fn make_runs(count: u32) -> Vec<RunResult> {
    (0..count)
        .map(|i| RunResult {
            job_name: "q_6_1.tt".to_string(),
            run_index: i,
            duration: Duration::from_micros(1000 + u64::from(i) * 37),
            exit_status: Some(0),
            succeeded: i % 7 != 3,
            error: None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks: enumerate + describe
// ---------------------------------------------------------------------------

fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");

    for &size in &[10, 100, 1000, 5000] {
        let dir = setup_corpus(size);
        let selection = Selection {
            extension: Some("tt"),
            ..Selection::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| enumerate::enumerate_items(&dir, &selection).unwrap());
        });
    }

    group.finish();
}

fn bench_build_jobs(c: &mut Criterion) {
    let dir = setup_corpus(1000);
    let items = enumerate::enumerate_items(&dir, &Selection::default()).unwrap();
    let mut config = BatchConfig::new(&dir, "/tmp/jobbench_results", "./affine");
    config.output_flag = Some("-w".to_string());
    config.repeat_count = 10;

    c.bench_function("build_jobs_1000", |b| {
        b.iter(|| describe::build_jobs(&items, &config).unwrap());
    });
}

// ---------------------------------------------------------------------------
// Benchmarks: naming + aggregation
// ---------------------------------------------------------------------------

fn bench_result_path(c: &mut Criterion) {
    let known = vec!["tt".to_string()];
    c.bench_function("result_path", |b| {
        b.iter(|| persist::result_path(Path::new("results"), "dim6", "q_6_1.tt", &known));
    });
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize");
    for &count in &[1u32, 10, 100] {
        let runs = make_runs(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &runs, |b, runs| {
            b.iter(|| timing::summarize("q_6_1.tt", runs.clone(), FailurePolicy::AnyRun));
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Benchmarks: display
// ---------------------------------------------------------------------------

fn bench_display(c: &mut Criterion) {
    let now = Local::now();
    let job_results = (0..50)
        .map(|i| {
            let mut result =
                timing::summarize(&format!("q_6_{i}.tt"), make_runs(10), FailurePolicy::LastRun);
            if i % 9 == 0 {
                result.status = JobStatus::Failed;
            }
            (result.job_name.clone(), result)
        })
        .collect::<BTreeMap<_, _>>();
    let summary = BatchSummary {
        job_results,
        total_wall_time: Duration::from_secs(42),
        started_at: now,
        finished_at: now,
    };

    let mut group = c.benchmark_group("display");
    group.bench_function("format_text_50", |b| {
        b.iter(|| display::format_text(&summary));
    });
    group.bench_function("format_json_50", |b| {
        b.iter(|| display::format_json(&summary));
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Criterion groups
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_enumerate,
    bench_build_jobs,
    bench_result_path,
    bench_summarize,
    bench_display,
);
criterion_main!(benches);
