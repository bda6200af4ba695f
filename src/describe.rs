use std::collections::HashMap;
use std::path::Path;

use crate::config::BatchConfig;
use crate::errors::HarnessError;
use crate::types::JobSpec;

/// Remove the final extension of `name` if it is one of `known`.
///
/// Unknown extensions are kept so distinct inputs such as `a.tt` and `a.bin`
/// never collapse onto one result name.
pub fn strip_known_extension<'a>(name: &'a str, known: &[String]) -> &'a str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && known.iter().any(|k| k == ext) => stem,
        _ => name,
    }
}

/// Turn one enumerated item into a [`JobSpec`].
pub fn build_job(item: &str, config: &BatchConfig) -> Result<JobSpec, HarnessError> {
    build_job_in(item, &config.scan_dir(), config)
}

pub(crate) fn build_job_in(
    item: &str,
    scan_dir: &Path,
    config: &BatchConfig,
) -> Result<JobSpec, HarnessError> {
    if config.repeat_count < 1 {
        return Err(HarnessError::config("repeat_count must be at least 1"));
    }

    let output_path = config.output_flag.as_ref().map(|_| {
        config
            .raw_output_dir()
            .join(strip_known_extension(item, &config.known_extensions))
    });

    Ok(JobSpec {
        name: item.to_string(),
        input_path: scan_dir.join(item),
        output_path,
        repeat_count: config.repeat_count,
        program_path: config.program_path.clone(),
        program_args: config.program_args.clone(),
        output_flag: config.output_flag.clone(),
    })
}

/// Build specs for every item, in order.
///
/// Items whose names reduce to the same stem (`a` and `a.tt`) would share
/// result and output files, so they are rejected together.
pub fn build_jobs(items: &[String], config: &BatchConfig) -> Result<Vec<JobSpec>, HarnessError> {
    let mut stems: HashMap<&str, &str> = HashMap::with_capacity(items.len());
    for item in items {
        let stem = strip_known_extension(item, &config.known_extensions);
        if let Some(other) = stems.insert(stem, item.as_str()) {
            return Err(HarnessError::config(format!(
                "items '{other}' and '{item}' both map to result name '{stem}'"
            )));
        }
    }

    let scan_dir = config.scan_dir();
    items
        .iter()
        .map(|item| build_job_in(item, &scan_dir, config))
        .collect()
}
