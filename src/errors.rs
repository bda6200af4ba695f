use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("Cannot list input directory {path}: {detail}")]
    Enumeration { path: PathBuf, detail: String },

    #[error("Invalid configuration: {detail}")]
    Configuration { detail: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("Could not start {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write result file {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl HarnessError {
    pub(crate) fn config(detail: impl Into<String>) -> Self {
        HarnessError::Configuration {
            detail: detail.into(),
        }
    }

    /// True for errors that abort a batch before any job is dispatched.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HarnessError::Spawn { .. } | HarnessError::Persistence { .. }
        )
    }
}
