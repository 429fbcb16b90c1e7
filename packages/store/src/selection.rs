//! Deterministic selection of the accumulated store file to transform.
//!
//! Candidates are `.csv` files whose name is the store prefix followed by
//! `.` or `_`, so another region sharing the prefix is never picked. The
//! newest by creation time wins; equal creation times are
//! broken by the lexicographically greatest file name.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file found in the raw-data directory along with its creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCandidate {
    pub path: PathBuf,
    /// Creation time, or modification time on platforms that do not record
    /// creation.
    pub created: SystemTime,
}

/// Selects the store file to use from a directory listing.
///
/// Returns `None` if no candidate matches `prefix`.
#[must_use]
pub fn select_latest<'a>(candidates: &'a [StoreCandidate], prefix: &str) -> Option<&'a Path> {
    candidates
        .iter()
        .filter(|c| is_store_file(&c.path, prefix))
        .max_by(|a, b| {
            a.created
                .cmp(&b.created)
                .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
        })
        .map(|c| c.path.as_path())
}

fn is_store_file(path: &Path, prefix: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with(['.', '_']))
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// Lists the regular files in `dir` with their creation times.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be read.
pub fn list_candidates(dir: &Path) -> std::io::Result<Vec<StoreCandidate>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let created = meta.created().or_else(|_| meta.modified())?;
        candidates.push(StoreCandidate {
            path: entry.path(),
            created,
        });
    }
    Ok(candidates)
}

/// Finds the newest store file for `prefix` in `dir`.
///
/// Returns `Ok(None)` if the directory does not exist or holds no match.
///
/// # Errors
///
/// Returns an I/O error if the directory exists but cannot be listed.
pub fn latest_store(dir: &Path, prefix: &str) -> std::io::Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let candidates = list_candidates(dir)?;
    Ok(select_latest(&candidates, prefix).map(Path::to_path_buf))
}
