//! Static batch configuration.
//!
//! A [`BatchConfig`] is read once at startup (from a TOML file, CLI flags, or
//! both) and handed to the orchestrator. Nothing here is reloaded or shared
//! mutably while a batch runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::HarnessError;
use crate::types::{ConcurrencyPolicy, FailurePolicy};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Root of the input corpus.
    pub source_root: PathBuf,
    /// Dimension/category directory under `source_root`. May be empty.
    pub category: String,
    /// Optional extra directory level below the category (e.g. `classic`).
    pub subset: Option<String>,
    /// Where timing files (and raw program output) are written.
    pub result_root: PathBuf,
    pub repeat_count: u32,
    pub concurrency: ConcurrencyPolicy,
    pub program_path: PathBuf,
    pub program_args: Vec<String>,
    /// Flag that tells the program where to write its output, e.g. `-w`.
    /// When unset the program is invoked with the input path only.
    pub output_flag: Option<String>,
    /// Extensions removed from item names when deriving result names.
    pub known_extensions: Vec<String>,
    /// Only enumerate files with this extension.
    pub extension: Option<String>,
    /// Explicit item names to run, in this order, instead of listing the directory.
    pub items: Vec<String>,
    /// Keep only the first N items.
    pub limit: Option<usize>,
    pub per_run_timeout_secs: Option<f64>,
    /// Discard the program's stdout/stderr.
    pub quiet: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::new(),
            category: String::new(),
            subset: None,
            result_root: PathBuf::new(),
            repeat_count: 1,
            concurrency: ConcurrencyPolicy::default(),
            program_path: PathBuf::new(),
            program_args: Vec::new(),
            output_flag: None,
            known_extensions: vec!["tt".to_string()],
            extension: None,
            items: Vec::new(),
            limit: None,
            per_run_timeout_secs: None,
            quiet: false,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl BatchConfig {
    pub fn new(
        source_root: impl Into<PathBuf>,
        result_root: impl Into<PathBuf>,
        program_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            result_root: result_root.into(),
            program_path: program_path.into(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let text = std::fs::read_to_string(path).map_err(|source| HarnessError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            HarnessError::Configuration { detail } => HarnessError::ConfigParse {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, HarnessError> {
        toml::from_str(text).map_err(|e| HarnessError::config(e.message().to_string()))
    }

    /// Reject configurations that cannot produce a meaningful batch.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.repeat_count < 1 {
            return Err(HarnessError::config("repeat_count must be at least 1"));
        }
        if self.source_root.as_os_str().is_empty() {
            return Err(HarnessError::config("source_root is not set"));
        }
        if self.result_root.as_os_str().is_empty() {
            return Err(HarnessError::config("result_root is not set"));
        }
        if self.program_path.as_os_str().is_empty() {
            return Err(HarnessError::config("program_path is not set"));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.items.iter().find(|item| !seen.insert(item.as_str())) {
            return Err(HarnessError::config(format!("item '{dup}' listed more than once")));
        }
        if self.output_flag.as_deref() == Some("") {
            return Err(HarnessError::config("output_flag must not be empty"));
        }
        if let Some(secs) = self.per_run_timeout_secs {
            timeout_from_secs(secs)?;
        }
        Ok(())
    }

    /// Directory whose entries become jobs.
    pub fn scan_dir(&self) -> PathBuf {
        let mut dir = self.source_root.clone();
        if !self.category.is_empty() {
            dir.push(&self.category);
        }
        if let Some(subset) = &self.subset {
            dir.push(subset);
        }
        dir
    }

    /// Directory receiving the program's own output files. Without a category
    /// this is `result_root/output` so raw files never shadow timing files.
    pub fn raw_output_dir(&self) -> PathBuf {
        if self.category.is_empty() {
            self.result_root.join("output")
        } else {
            self.result_root.join(&self.category)
        }
    }

    /// The per-run limit. Values rejected by [`BatchConfig::validate`] yield `None`.
    pub fn per_run_timeout(&self) -> Option<Duration> {
        self.per_run_timeout_secs
            .and_then(|secs| timeout_from_secs(secs).ok())
    }
}

fn timeout_from_secs(secs: f64) -> Result<Duration, HarnessError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(HarnessError::config(format!(
            "per_run_timeout_secs must be a positive number, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        HarnessError::config(format!("per_run_timeout_secs {secs} is out of range: {e}"))
    })
}
