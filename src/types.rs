use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

/// One fully described unit of work. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Item name as enumerated; unique within a batch.
    pub name: String,
    pub input_path: PathBuf,
    /// Base path (no extension) for the program's raw output, when the
    /// program is told where to write. See [`JobSpec::output_path_for`].
    pub output_path: Option<PathBuf>,
    pub repeat_count: u32,
    pub program_path: PathBuf,
    /// Flags placed between the program path and the input/output arguments.
    pub program_args: Vec<String>,
    pub output_flag: Option<String>,
}

impl JobSpec {
    /// Raw output destination for one run. Repeated jobs get an `_<i>` suffix
    /// so runs never overwrite each other.
    pub fn output_path_for(&self, run_index: u32) -> Option<PathBuf> {
        let base = self.output_path.as_ref()?;
        let mut file = base.as_os_str().to_owned();
        if self.repeat_count > 1 {
            file.push(format!("_{run_index}"));
        }
        file.push(".txt");
        Some(PathBuf::from(file))
    }

    /// Full argv for one run, program path first.
    pub fn command_line(&self, run_index: u32) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::with_capacity(self.program_args.len() + 4);
        argv.push(self.program_path.clone().into_os_string());
        argv.extend(self.program_args.iter().map(OsString::from));
        if let (Some(flag), Some(output)) = (&self.output_flag, self.output_path_for(run_index)) {
            argv.push(flag.into());
            argv.push(output.into_os_string());
        }
        argv.push(self.input_path.clone().into_os_string());
        argv
    }
}

/// Why a run did not succeed. Recorded as data, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    Spawn { message: String },
    /// The program's output location could not be prepared; it was not run.
    Output { message: String },
    NonZeroExit { code: i32 },
    Signalled,
    TimedOut {
        #[serde(serialize_with = "as_secs")]
        after: Duration,
    },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Spawn { message } => write!(f, "spawn failed: {message}"),
            RunError::Output { message } => write!(f, "output not prepared: {message}"),
            RunError::NonZeroExit { code } => write!(f, "exited with status {code}"),
            RunError::Signalled => write!(f, "terminated by signal"),
            RunError::TimedOut { after } => {
                write!(f, "killed after {:.3}s timeout", after.as_secs_f64())
            }
        }
    }
}

/// Outcome of one program invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub job_name: String,
    pub run_index: u32,
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
    pub exit_status: Option<i32>,
    pub succeeded: bool,
    pub error: Option<RunError>,
}

/// Per-job worker state. `Succeeded` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Aggregated outcome of all runs of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_name: String,
    pub run_results: Vec<RunResult>,
    #[serde(serialize_with = "as_secs")]
    pub mean_duration: Duration,
    pub all_succeeded: bool,
    pub status: JobStatus,
    pub result_path: Option<PathBuf>,
    pub persistence_error: Option<String>,
}

impl JobResult {
    /// A job counts against the batch if its runs failed or its result file
    /// could not be written.
    pub fn is_failure(&self) -> bool {
        self.status == JobStatus::Failed || self.persistence_error.is_some()
    }
}

/// Everything a batch produced, keyed by job name.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub job_results: BTreeMap<String, JobResult>,
    #[serde(serialize_with = "as_secs")]
    pub total_wall_time: Duration,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl BatchSummary {
    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobResult> {
        self.job_results.values().filter(|r| r.is_failure())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_jobs().next().is_none()
    }
}

/// How many jobs may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PolicyRepr")]
pub enum ConcurrencyPolicy {
    /// One worker per job, all started immediately.
    Unbounded,
    /// At most `n` jobs running; the rest wait in dispatch order.
    Bounded(NonZeroUsize),
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        let n = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        ConcurrencyPolicy::Bounded(n)
    }
}

impl fmt::Display for ConcurrencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyPolicy::Unbounded => write!(f, "unbounded"),
            ConcurrencyPolicy::Bounded(n) => write!(f, "bounded:{n}"),
        }
    }
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    /// Accepts `unbounded`, `bounded:N` or a bare worker count `N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(ConcurrencyPolicy::Unbounded);
        }
        let count = s.strip_prefix("bounded:").unwrap_or(s);
        let n: usize = count
            .parse()
            .map_err(|_| format!("expected 'unbounded', 'bounded:N' or N, got '{s}'"))?;
        NonZeroUsize::new(n)
            .map(ConcurrencyPolicy::Bounded)
            .ok_or_else(|| "worker count must be at least 1".to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyRepr {
    Workers(usize),
    Named(String),
}

impl TryFrom<PolicyRepr> for ConcurrencyPolicy {
    type Error = String;

    fn try_from(repr: PolicyRepr) -> Result<Self, Self::Error> {
        match repr {
            PolicyRepr::Workers(n) => NonZeroUsize::new(n)
                .map(ConcurrencyPolicy::Bounded)
                .ok_or_else(|| "worker count must be at least 1".to_string()),
            PolicyRepr::Named(s) => s.parse(),
        }
    }
}

/// Which runs decide whether a job is reported as failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any failed run fails the job.
    #[default]
    AnyRun,
    /// Only the last run counts.
    LastRun,
}

impl FailurePolicy {
    pub fn judge(self, runs: &[RunResult]) -> JobStatus {
        let ok = match self {
            FailurePolicy::AnyRun => runs.iter().all(|r| r.succeeded),
            FailurePolicy::LastRun => runs.last().is_some_and(|r| r.succeeded),
        };
        if ok {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        }
    }
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
