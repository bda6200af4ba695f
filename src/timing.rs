use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::HarnessError;
use crate::invoke::{InvokeOptions, invoke};
use crate::types::{FailurePolicy, JobResult, JobSpec, RunError, RunResult};

/// Run a job `repeat_count` times, one after another, and aggregate.
///
/// Every run occupies a slot in `run_results`, including runs whose program
/// could not be started. Failed runs still count towards the mean.
pub fn collect(spec: &JobSpec, options: InvokeOptions, policy: FailurePolicy) -> JobResult {
    let mut runs = Vec::with_capacity(spec.repeat_count as usize);

    for run_index in 0..spec.repeat_count {
        let attempt = Instant::now();
        let outcome = match prepare_output(spec, run_index) {
            Ok(()) => invoke(&spec.name, run_index, &spec.command_line(run_index), options)
                .map_err(|err| RunError::Spawn {
                    message: err.to_string(),
                }),
            Err(err) => Err(RunError::Output {
                message: err.to_string(),
            }),
        };

        let run = match outcome {
            Ok(run) => run,
            Err(error) => RunResult {
                job_name: spec.name.clone(),
                run_index,
                duration: attempt.elapsed(),
                exit_status: None,
                succeeded: false,
                error: Some(error),
            },
        };

        match &run.error {
            None => debug!(
                job = %spec.name,
                run = run_index,
                secs = run.duration.as_secs_f64(),
                "run finished"
            ),
            Some(error) => warn!(job = %spec.name, run = run_index, %error, "run failed"),
        }

        runs.push(run);
    }

    summarize(&spec.name, runs, policy)
}

/// Aggregate runs into a [`JobResult`]. The mean divides by the number of
/// runs regardless of their success.
pub fn summarize(job_name: &str, runs: Vec<RunResult>, policy: FailurePolicy) -> JobResult {
    JobResult {
        job_name: job_name.to_string(),
        mean_duration: mean(&runs),
        all_succeeded: runs.iter().all(|r| r.succeeded),
        status: policy.judge(&runs),
        run_results: runs,
        result_path: None,
        persistence_error: None,
    }
}

pub fn mean(runs: &[RunResult]) -> Duration {
    if runs.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = runs.iter().map(|r| r.duration).sum();
    // Run counts come from a u32 repeat_count.
    total / runs.len() as u32
}

fn prepare_output(spec: &JobSpec, run_index: u32) -> Result<(), HarnessError> {
    let Some(parent) = spec
        .output_path_for(run_index)
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
    else {
        return Ok(());
    };
    std::fs::create_dir_all(&parent).map_err(|source| HarnessError::Persistence {
        path: parent,
        source,
    })
}
