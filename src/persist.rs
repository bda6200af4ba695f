use std::path::{Path, PathBuf};

use crate::describe::strip_known_extension;
use crate::errors::HarnessError;
use crate::types::JobResult;

/// Where a job's mean timing is stored: `result_root/<category>_<stem>.txt`,
/// or `result_root/<stem>.txt` when there is no category.
///
/// Depends only on its arguments, so re-running a batch hits the same files.
pub fn result_path(result_root: &Path, category: &str, job_name: &str, known: &[String]) -> PathBuf {
    let stem = strip_known_extension(job_name, known);
    let file = if category.is_empty() {
        format!("{stem}.txt")
    } else {
        format!("{category}_{stem}.txt")
    };
    result_root.join(file)
}

/// Write the mean duration in seconds, newline-terminated, replacing any
/// previous content.
pub fn write_result(path: &Path, result: &JobResult) -> Result<(), HarnessError> {
    let to_err = |source| HarnessError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_err)?;
    }
    std::fs::write(path, format!("{}\n", result.mean_duration.as_secs_f64())).map_err(to_err)
}
