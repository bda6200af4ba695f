//! Batch orchestration.
//!
//! The [`Orchestrator`] owns a validated [`BatchConfig`], turns the corpus into
//! [`JobSpec`]s and fans them out over scoped worker threads. Each worker owns
//! the [`JobResult`] it produces; results come back over a channel and the
//! scope's join is the only synchronization point.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Instant;

use chrono::Local;
use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::describe::build_jobs;
use crate::enumerate::{Selection, enumerate_items};
use crate::errors::HarnessError;
use crate::invoke::InvokeOptions;
use crate::persist::{result_path, write_result};
use crate::timing::collect;
use crate::types::{BatchSummary, ConcurrencyPolicy, JobResult, JobSpec, JobStatus};

/// Receives job state transitions. Called from worker threads.
pub trait JobObserver: Sync {
    fn on_transition(&self, _job_name: &str, _status: JobStatus) {}
}

/// Observer that ignores everything.
pub struct Silent;

impl JobObserver for Silent {}

pub struct Orchestrator {
    config: BatchConfig,
}

impl Orchestrator {
    /// Validates `config`; an invalid configuration never reaches dispatch.
    pub fn new(config: BatchConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Enumerate the corpus and describe one job per item, in dispatch order.
    pub fn plan(&self) -> Result<Vec<JobSpec>, HarnessError> {
        let items = enumerate_items(&self.config.scan_dir(), &Selection::from_config(&self.config))?;
        build_jobs(&items, &self.config)
    }

    pub fn run(&self) -> Result<BatchSummary, HarnessError> {
        self.run_with(&Silent)
    }

    /// Run the whole batch. Only enumeration and configuration problems are
    /// errors; everything that goes wrong inside a job is recorded on its
    /// [`JobResult`].
    pub fn run_with(&self, observer: &dyn JobObserver) -> Result<BatchSummary, HarnessError> {
        let started_at = Local::now();
        let start = Instant::now();

        let jobs = self.plan()?;
        self.prepare_result_root()?;

        info!(
            started_at = %started_at.format("%H:%M:%S"),
            jobs = jobs.len(),
            concurrency = %self.config.concurrency,
            "batch started"
        );

        let expected = jobs.len();
        let results = self.dispatch(jobs, observer);
        debug_assert_eq!(results.len(), expected);

        let total_wall_time = start.elapsed();
        let finished_at = Local::now();

        let job_results: BTreeMap<String, JobResult> = results
            .into_iter()
            .map(|r| (r.job_name.clone(), r))
            .collect();
        let failed = job_results.values().filter(|r| r.is_failure()).count();

        info!(
            finished_at = %finished_at.format("%H:%M:%S"),
            total_secs = total_wall_time.as_secs_f64(),
            jobs = job_results.len(),
            failed,
            "batch finished"
        );

        Ok(BatchSummary {
            job_results,
            total_wall_time,
            started_at,
            finished_at,
        })
    }

    fn invoke_options(&self) -> InvokeOptions {
        InvokeOptions {
            timeout: self.config.per_run_timeout(),
            quiet: self.config.quiet,
        }
    }

    /// Make sure every directory jobs write into exists and accepts files.
    fn prepare_result_root(&self) -> Result<(), HarnessError> {
        ensure_writable_dir(&self.config.result_root)?;
        if self.config.output_flag.is_some() {
            ensure_writable_dir(&self.config.raw_output_dir())?;
        }
        Ok(())
    }

    fn dispatch(&self, jobs: Vec<JobSpec>, observer: &dyn JobObserver) -> Vec<JobResult> {
        for job in &jobs {
            observer.on_transition(&job.name, JobStatus::Pending);
        }

        match self.config.concurrency {
            ConcurrencyPolicy::Unbounded => self.dispatch_each(&jobs, observer),
            ConcurrencyPolicy::Bounded(max_workers) => {
                self.dispatch_pool(jobs, max_workers.get(), observer)
            }
        }
    }

    /// One scoped thread per job, all started before any is joined.
    fn dispatch_each(&self, jobs: &[JobSpec], observer: &dyn JobObserver) -> Vec<JobResult> {
        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();

            for (id, job) in jobs.iter().enumerate() {
                let worker_tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("job-{id}"))
                    .spawn_scoped(scope, move || {
                        let _ = worker_tx.send(self.run_job(job, observer));
                    });
                if let Err(err) = spawned {
                    warn!(job = %job.name, %err, "could not start job thread, running inline");
                    let _ = tx.send(self.run_job(job, observer));
                }
            }

            drop(tx);
            rx.into_iter().collect()
        })
    }

    /// `workers` threads draining one FIFO queue in enumeration order.
    fn dispatch_pool(
        &self,
        jobs: Vec<JobSpec>,
        workers: usize,
        observer: &dyn JobObserver,
    ) -> Vec<JobResult> {
        let workers = workers.min(jobs.len());
        let queue = Mutex::new(VecDeque::from(jobs));

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();
            let queue = &queue;

            let mut started = 0;
            for id in 0..workers {
                let tx = tx.clone();
                let worker = move || {
                    while let Some(job) = next_job(queue) {
                        let _ = tx.send(self.run_job(&job, observer));
                    }
                };
                match thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn_scoped(scope, worker)
                {
                    Ok(_) => started += 1,
                    Err(err) => warn!(worker = id, %err, "could not start worker thread"),
                }
            }

            // Started workers drain the queue between them; only fall back to
            // this thread when none could be started.
            if started == 0 {
                while let Some(job) = next_job(queue) {
                    let _ = tx.send(self.run_job(&job, observer));
                }
            }

            drop(tx);
            rx.into_iter().collect()
        })
    }

    fn run_job(&self, spec: &JobSpec, observer: &dyn JobObserver) -> JobResult {
        observer.on_transition(&spec.name, JobStatus::Running);

        let mut result = collect(spec, self.invoke_options(), self.config.failure_policy);

        let path = result_path(
            &self.config.result_root,
            &self.config.category,
            &spec.name,
            &self.config.known_extensions,
        );
        match write_result(&path, &result) {
            Ok(()) => result.result_path = Some(path),
            Err(err) => {
                warn!(job = %spec.name, %err, "could not persist result");
                result.persistence_error = Some(err.to_string());
            }
        }

        info!(
            job = %spec.name,
            mean_secs = result.mean_duration.as_secs_f64(),
            status = ?result.status,
            "job finished"
        );

        observer.on_transition(&spec.name, result.status);
        result
    }
}

fn next_job(queue: &Mutex<VecDeque<JobSpec>>) -> Option<JobSpec> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

fn ensure_writable_dir(dir: &std::path::Path) -> Result<(), HarnessError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        HarnessError::config(format!("result directory {} is unusable: {e}", dir.display()))
    })?;

    let probe = dir.join(format!(".jobbench-probe-{}", std::process::id()));
    std::fs::write(&probe, b"").map_err(|e| {
        HarnessError::config(format!("result directory {} is not writable: {e}", dir.display()))
    })?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}
