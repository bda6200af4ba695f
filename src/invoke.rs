use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::errors::HarnessError;
use crate::types::{RunError, RunResult};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Per-run process settings shared by every job in a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeOptions {
    /// Kill the program once a run exceeds this.
    pub timeout: Option<Duration>,
    /// Discard the program's stdout/stderr instead of inheriting them.
    pub quiet: bool,
}

/// Run `argv` to completion and time it.
///
/// The clock starts right before spawn and stops right after the child is
/// reaped. A non-zero exit is reported through `succeeded`/`error`; only a
/// failure to start the program at all is an `Err`.
pub fn invoke(
    job_name: &str,
    run_index: u32,
    argv: &[OsString],
    options: InvokeOptions,
) -> Result<RunResult, HarnessError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(HarnessError::config("empty command line"));
    };

    let mut cmd = Command::new(program);
    cmd.args(args).stdin(Stdio::null());
    if options.quiet {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }

    let start = Instant::now();
    let child = cmd.spawn().map_err(|source| HarnessError::Spawn {
        program: PathBuf::from(program),
        source,
    })?;

    let (status, timed_out) = match options.timeout {
        None => (wait(child, program)?, false),
        Some(limit) => wait_with_deadline(child, program, start, limit)?,
    };
    let duration = start.elapsed();

    let exit_status = status.code();
    let error = if timed_out {
        options.timeout.map(|after| RunError::TimedOut { after })
    } else {
        match exit_status {
            Some(0) => None,
            Some(code) => Some(RunError::NonZeroExit { code }),
            None => Some(RunError::Signalled),
        }
    };

    Ok(RunResult {
        job_name: job_name.to_string(),
        run_index,
        duration,
        exit_status: if timed_out { None } else { exit_status },
        succeeded: error.is_none(),
        error,
    })
}

fn wait(mut child: Child, program: &OsString) -> Result<ExitStatus, HarnessError> {
    child.wait().map_err(|source| HarnessError::Spawn {
        program: PathBuf::from(program),
        source,
    })
}

fn wait_with_deadline(
    mut child: Child,
    program: &OsString,
    start: Instant,
    limit: Duration,
) -> Result<(ExitStatus, bool), HarnessError> {
    let to_err = |source| HarnessError::Spawn {
        program: PathBuf::from(program),
        source,
    };

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok((status, false)),
            Ok(None) => {}
            Err(source) => {
                let _ = kill_and_reap(&mut child);
                return Err(to_err(source));
            }
        }
        if start.elapsed() >= limit {
            let status = kill_and_reap(&mut child).map_err(to_err)?;
            return Ok((status, true));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Kill `child` and wait for it so no process outlives its run.
fn kill_and_reap(child: &mut Child) -> std::io::Result<ExitStatus> {
    // The child may exit between try_wait and kill; wait() still reaps it.
    let _ = child.kill();
    child.wait()
}
