use dashmap::DashMap;
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::error;

/// A regular file found under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Parallel directory traversal of `root`, filtering by glob ignore patterns.
/// Skips symlinks and 0-byte files. Results are ordered by path.
pub fn collect_files(root: &Path, ignore_globs: &[&str]) -> io::Result<Vec<DiscoveredFile>> {
    let found: DashMap<PathBuf, u64> = DashMap::new();

    let ignore_patterns: Vec<Pattern> = ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect();

    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }
    visit_dirs(root, &found, &ignore_patterns)?;

    let mut files: Vec<DiscoveredFile> = found
        .into_iter()
        .map(|(path, size)| DiscoveredFile { path, size })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn visit_dirs(
    dir: &Path,
    found: &DashMap<PathBuf, u64>,
    ignore_patterns: &[Pattern],
) -> io::Result<()> {
    if ignore_patterns
        .iter()
        .any(|pattern| pattern.matches_path(dir))
    {
        return Ok(());
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            if err.kind() == io::ErrorKind::PermissionDenied {
                error!(
                    "Access denied reading directory {}: {}",
                    dir.display(),
                    err
                );
                return Ok(());
            } else {
                return Err(io::Error::new(
                    err.kind(),
                    format!("Error reading directory {}: {}", dir.display(), err),
                ));
            }
        }
    };

    entries.par_bridge().try_for_each(|entry_result| {
        let entry = entry_result.map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error reading entry in directory {}: {}", dir.display(), err),
            )
        })?;

        let path = entry.path();
        let metadata = fs::symlink_metadata(&path).map_err(|err| {
            io::Error::new(
                err.kind(),
                format!("Error getting metadata for {}: {}", path.display(), err),
            )
        })?;

        let file_type = metadata.file_type();
        if file_type.is_dir() {
            visit_dirs(&path, found, ignore_patterns)?;
        } else if file_type.is_file()
            && metadata.len() > 0
            && !ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(&path))
        {
            found.insert(path, metadata.len());
        }
        Ok(())
    })
}
