use std::path::Path;

use crate::config::BatchConfig;
use crate::errors::HarnessError;

/// Selection rules applied while listing a scan directory.
#[derive(Debug, Clone, Default)]
pub struct Selection<'a> {
    /// Only keep files with this extension (without the dot).
    pub extension: Option<&'a str>,
    /// Explicit names to use instead of the directory listing, in this order.
    pub items: &'a [String],
    /// Keep only the first N names.
    pub limit: Option<usize>,
}

impl<'a> Selection<'a> {
    pub fn from_config(config: &'a BatchConfig) -> Self {
        Self {
            extension: config.extension.as_deref(),
            items: &config.items,
            limit: config.limit,
        }
    }
}

/// List job item names directly under `dir`.
///
/// Only regular files (or symlinks resolving to one) are returned, sorted by
/// name so repeated batches dispatch in the same order. Hidden entries and
/// subdirectories are skipped. Nothing is written.
pub fn enumerate_items(dir: &Path, selection: &Selection<'_>) -> Result<Vec<String>, HarnessError> {
    if !dir.is_dir() {
        return Err(HarnessError::Enumeration {
            path: dir.to_path_buf(),
            detail: "not a directory".to_string(),
        });
    }

    let mut names = if selection.items.is_empty() {
        list_dir(dir, selection.extension)?
    } else {
        for item in selection.items {
            if !dir.join(item).is_file() {
                return Err(HarnessError::Enumeration {
                    path: dir.to_path_buf(),
                    detail: format!("item '{item}' not found"),
                });
            }
        }
        selection.items.to_vec()
    };

    if let Some(limit) = selection.limit {
        names.truncate(limit);
    }

    Ok(names)
}

fn list_dir(dir: &Path, extension: Option<&str>) -> Result<Vec<String>, HarnessError> {
    let entries = std::fs::read_dir(dir).map_err(|e| HarnessError::Enumeration {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut names = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        // Non-UTF-8 names cannot be turned into result file names.
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue,
        };

        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if let Some(ext) = extension {
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
        }

        names.push(name);
    }

    names.sort();
    Ok(names)
}
