use std::time::Duration;

use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::types::{BatchSummary, JobResult, JobStatus};

/// Compact human duration: "850µs", "12.3ms", "1.234s", "2m 05.0s".
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.001 {
        format!("{}µs", d.as_micros())
    } else if secs < 1.0 {
        format!("{:.1}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.3}s")
    } else {
        let mins = d.as_secs() / 60;
        format!("{}m {:04.1}s", mins, secs - (mins * 60) as f64)
    }
}

fn style_fail() -> Style {
    Style::new().red().bold()
}

fn status_label(result: &JobResult) -> &'static str {
    if result.persistence_error.is_some() {
        return "UNSAVED";
    }
    match result.status {
        JobStatus::Succeeded => "ok",
        JobStatus::Failed => "FAILED",
        JobStatus::Pending | JobStatus::Running => "?",
    }
}

/// First problem worth showing for a job, if any.
fn first_problem(result: &JobResult) -> Option<String> {
    if let Some(err) = &result.persistence_error {
        return Some(err.clone());
    }
    result
        .run_results
        .iter()
        .find_map(|r| r.error.as_ref().map(|e| format!("run {}: {}", r.run_index, e)))
}

/// Text report: header with timestamps, one aligned line per job, footer.
pub fn format_text(summary: &BatchSummary) -> String {
    let mut out = String::new();

    let header = format!(
        "Batch {} \u{2192} {} ({} total)",
        summary.started_at.format("%Y-%m-%d %H:%M:%S"),
        summary.finished_at.format("%H:%M:%S"),
        format_duration(summary.total_wall_time)
    );
    out.push_str(
        &header
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push_str("\n\n");

    if !summary.job_results.is_empty() {
        let name_width = summary
            .job_results
            .keys()
            .map(|k| k.chars().count())
            .max()
            .unwrap_or(0);
        let fail = style_fail();

        for result in summary.job_results.values() {
            let label = format!("{:<7}", status_label(result));
            let label_colored = if result.is_failure() {
                label
                    .if_supports_color(Stream::Stdout, |s| s.style(fail))
                    .to_string()
            } else {
                label
                    .if_supports_color(Stream::Stdout, |s| s.green())
                    .to_string()
            };

            let name = format!("{:<width$}", result.job_name, width = name_width);
            let mean = format!("{:>10}", format_duration(result.mean_duration));
            let mean_colored = mean
                .if_supports_color(Stream::Stdout, |s| s.yellow())
                .to_string();

            let ok_runs = result.run_results.iter().filter(|r| r.succeeded).count();
            let runs = format!("{}/{} runs", ok_runs, result.run_results.len());

            out.push_str(&format!(
                "  {}  {}  {}  {}",
                label_colored, name, mean_colored, runs
            ));
            if let Some(problem) = first_problem(result) {
                out.push_str("  ");
                out.push_str(
                    &problem
                        .if_supports_color(Stream::Stdout, |s| s.dimmed())
                        .to_string(),
                );
            }
            out.push('\n');
        }

        out.push('\n');
    }

    let failed = summary.failed_jobs().count();
    let footer = format!("{} jobs, {} failed", summary.job_results.len(), failed);
    out.push_str(
        &footer
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push('\n');

    out
}

#[derive(Serialize)]
struct JsonBatch<'a> {
    started_at: String,
    finished_at: String,
    total_wall_time: f64,
    jobs: usize,
    failed: usize,
    job_results: Vec<&'a JobResult>,
}

pub fn format_json(summary: &BatchSummary) -> String {
    let batch = JsonBatch {
        started_at: summary.started_at.to_rfc3339(),
        finished_at: summary.finished_at.to_rfc3339(),
        total_wall_time: summary.total_wall_time.as_secs_f64(),
        jobs: summary.job_results.len(),
        failed: summary.failed_jobs().count(),
        job_results: summary.job_results.values().collect(),
    };

    serde_json::to_string_pretty(&batch).unwrap_or_else(|_| "{}".to_string())
}
