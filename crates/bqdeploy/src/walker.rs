//! Directory scanning for the two-level views layout.
//!
//! The root holds one directory per dataset; each dataset directory holds
//! `.sql` files whose stem becomes the view name. The two-level shape is a
//! validated precondition: anything deeper, or a stray file at the root,
//! is rejected instead of being silently mis-read as a dataset.

use crate::error::{DeployError, Result};
use diagnostics::*;
use std::path::{Path, PathBuf};

/// One SQL template file destined to become a view
#[derive(Debug, Clone)]
pub struct ViewSource {
    /// View name (the file stem)
    pub name: String,
    pub path: PathBuf,
}

/// One dataset directory and the views inside it
#[derive(Debug, Clone)]
pub struct DatasetSource {
    /// Dataset name (the directory name)
    pub name: String,
    pub views: Vec<ViewSource>,
}

/// Scan the views root, validating the layout. Entries are sorted by name
/// so traversal order is reproducible across filesystems.
pub fn scan_views_directory(root: &Path) -> Result<Vec<DatasetSource>> {
    let mut datasets = Vec::new();

    for entry in sorted_entries(root)? {
        let dataset_name = entry_name(&entry)?;
        if !entry.is_dir() {
            return Err(DeployError::InvalidLayout {
                path: entry,
                message: "expected a dataset directory, found a file at the root level"
                    .to_string(),
            });
        }

        let mut views = Vec::new();
        for child in sorted_entries(&entry)? {
            if child.is_dir() {
                return Err(DeployError::InvalidLayout {
                    path: child,
                    message: format!(
                        "nested directory inside dataset '{dataset_name}'; only one level of nesting is supported"
                    ),
                });
            }
            if child.extension().and_then(|e| e.to_str()) != Some("sql") {
                let skipped = child.display().to_string();
                warn!("Skipping non-SQL file {skipped}");
                continue;
            }
            let view_name = stem_name(&child)?;
            views.push(ViewSource {
                name: view_name,
                path: child,
            });
        }

        datasets.push(DatasetSource {
            name: dataset_name,
            views,
        });
    }

    Ok(datasets)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| DeployError::ReadFailure {
        path: dir.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| DeployError::ReadFailure {
            path: dir.to_path_buf(),
            source: e,
        })?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| DeployError::InvalidLayout {
            path: path.to_path_buf(),
            message: "entry name is not valid UTF-8".to_string(),
        })
}

fn stem_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| DeployError::InvalidLayout {
            path: path.to_path_buf(),
            message: "file name is not valid UTF-8".to_string(),
        })
}
