#![forbid(unsafe_code)]

//! Finished downloads sitting in the download directory.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadedFile {
    pub filename: String,
    pub size: String,
}

/// Lists regular files directly inside `dir`, sorted by name.
pub fn list_downloads(dir: &Path) -> Result<Vec<DownloadedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| Error::Internal(format!("reading {}: {err}", dir.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry
            .metadata()
            .map_err(|err| Error::Internal(err.to_string()))?
            .len();
        files.push(DownloadedFile {
            filename: entry.file_name().to_string_lossy().into_owned(),
            size: format_megabytes(size),
        });
    }
    Ok(files)
}

/// Maps a user-supplied file name onto an existing file inside `dir`.
pub fn resolve_download(dir: &Path, name: &str) -> Result<PathBuf> {
    ensure_plain_file_name(name)?;
    let path = dir.join(name);
    if !path.is_file() {
        return Err(Error::not_found("File not found"));
    }
    Ok(path)
}

/// Rejects anything that could step outside the download directory.
fn ensure_plain_file_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(Error::not_found("File not found")),
    }
}

fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}
