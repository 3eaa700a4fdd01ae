//! Project snapshot
//!
//! An immutable, ordered file set analyzed in one run. The fingerprint is a
//! SHA-256 over the ordered paths, declared types and contents, and keys the
//! digest and hint caches.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directories never descended into during a directory walk
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".svelte-kit",
    "__pycache__",
    ".venv",
    "venv",
    "vendor",
    "coverage",
];

/// Files larger than this are recorded without content
pub const MAX_CONTENT_BYTES: u64 = 256 * 1024;

/// One file of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    /// Forward-slash relative path
    pub path: String,
    /// Type declared by the uploader (usually the extension)
    #[serde(default)]
    pub declared_type: String,
    /// File text; absent for binary, oversized or withheld files
    #[serde(default)]
    pub content: Option<String>,
}

impl SnapshotFile {
    pub fn new(path: impl Into<String>, content: Option<&str>) -> Self {
        let path = path.into();
        let declared_type = declared_type_for(&path);
        Self {
            path,
            declared_type,
            content: content.map(str::to_string),
        }
    }
}

/// Immutable ordered file collection with a stable fingerprint
#[derive(Debug, Clone)]
pub struct Snapshot {
    files: Vec<SnapshotFile>,
    fingerprint: String,
}

impl Snapshot {
    pub fn new(files: Vec<SnapshotFile>) -> Self {
        let fingerprint = compute_fingerprint(&files);
        Self { files, fingerprint }
    }

    pub fn files(&self) -> &[SnapshotFile] {
        &self.files
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Walk a local directory into a snapshot (sorted by path)
    ///
    /// Unreadable entries are skipped with a warning; non-UTF-8 and oversized
    /// files are kept without content.
    pub fn from_directory(root: &Path) -> std::io::Result<Self> {
        if !root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let content = if size > MAX_CONTENT_BYTES {
                debug!(path = %path, size, "Oversized file recorded without content");
                None
            } else {
                match std::fs::read(entry.path()) {
                    Ok(bytes) => String::from_utf8(bytes).ok(),
                    Err(e) => {
                        warn!(path = %path, "Read failed: {}", e);
                        None
                    }
                }
            };

            files.push(SnapshotFile {
                declared_type: declared_type_for(&path),
                path,
                content,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self::new(files))
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    SKIPPED_DIRS.iter().any(|skipped| *skipped == name)
}

/// Extension-derived declared type (`"file"` when there is none)
pub fn declared_type_for(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => "file".to_string(),
    }
}

fn compute_fingerprint(files: &[SnapshotFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update([0u8]);
        hasher.update(file.declared_type.as_bytes());
        hasher.update([0u8]);
        match &file.content {
            Some(content) => {
                hasher.update([1u8]);
                hasher.update(content.as_bytes());
            }
            None => hasher.update([2u8]),
        }
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}
