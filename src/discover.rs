use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::{DirEntry, WalkDir};

/// Directory names whose contents are never treated as input pages.
pub const RESERVED_SEGMENTS: &[&str] = &["chunks", "vs_files"];
const EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Page files under `input`, sorted by path so every run sees the same order.
///
/// `skip` is a directory (usually the output directory) to leave out when it
/// sits inside the input tree.
pub fn discover_pages(input: &Path, skip: Option<&Path>) -> Vec<PathBuf> {
    let skip = skip.and_then(|p| p.canonicalize().ok());
    WalkDir::new(input)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e, skip.as_deref()))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && has_page_extension(e.path()))
        .map(DirEntry::into_path)
        .collect()
}

fn is_excluded(entry: &DirEntry, skip: Option<&Path>) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    if !entry.file_type().is_dir() {
        return false;
    }
    if RESERVED_SEGMENTS.iter().any(|r| name == *r) {
        return true;
    }
    match skip {
        Some(skip) => entry.path().canonicalize().is_ok_and(|p| p == skip),
        None => false,
    }
}

fn has_page_extension(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}
