//! Typed offline cache manifest (`CACHE MANIFEST`) and its merge.
//!
//! The document is a list of classified lines. Only three constructs are
//! managed: the header, the unique stamp comment, and entries inserted under
//! the first `CACHE:` section. Every other line is carried through verbatim
//! and keeps its position relative to its neighbours.

use crate::{fsync_dir, StoreError};
use fs2::FileExt;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

pub const HEADER_MANIFEST: &str = "CACHE MANIFEST";
pub const STAMP_PREFIX: &str = "# unique stamp:";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppCacheError {
    #[error("content is not valid UTF-8")]
    NotUtf8,
    #[error("'CACHE MANIFEST' header found on line {line}, expected line 1")]
    MisplacedHeader { line: usize },
    #[error("duplicate 'CACHE MANIFEST' header on line {line}")]
    DuplicateHeader { line: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Section {
    Cache,
    Network,
    Fallback,
    Settings,
}

impl Section {
    pub fn header(self) -> &'static str {
        match self {
            Self::Cache => "CACHE:",
            Self::Network => "NETWORK:",
            Self::Fallback => "FALLBACK:",
            Self::Settings => "SETTINGS:",
        }
    }

    fn detect(trimmed: &str) -> Option<Self> {
        [Self::Cache, Self::Network, Self::Fallback, Self::Settings]
            .into_iter()
            .find(|s| trimmed.starts_with(s.header()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    Header(String),
    /// The volatile token after the stamp prefix.
    Stamp(String),
    SectionHeader { section: Section, raw: String },
    /// A resource line. Lines before any section header belong to `Cache`.
    Entry { section: Section, raw: String },
    /// Comments and blank lines.
    Passthrough(String),
}

impl ManifestLine {
    fn text(&self) -> String {
        match self {
            Self::Header(raw)
            | Self::SectionHeader { raw, .. }
            | Self::Entry { raw, .. }
            | Self::Passthrough(raw) => raw.clone(),
            Self::Stamp(token) => format!("{STAMP_PREFIX} {token}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeOutcome {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
    pub stamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCache {
    lines: Vec<ManifestLine>,
}

impl AppCache {
    /// A manifest with empty cache and a wildcard network section.
    pub fn empty() -> Self {
        Self {
            lines: vec![
                ManifestLine::Header(HEADER_MANIFEST.to_owned()),
                ManifestLine::Stamp(String::new()),
                ManifestLine::SectionHeader {
                    section: Section::Cache,
                    raw: Section::Cache.header().to_owned(),
                },
                ManifestLine::SectionHeader {
                    section: Section::Network,
                    raw: Section::Network.header().to_owned(),
                },
                ManifestLine::Entry {
                    section: Section::Network,
                    raw: "*".to_owned(),
                },
            ],
        }
    }

    pub fn parse(text: &str) -> Result<Self, AppCacheError> {
        let mut lines = Vec::new();
        let mut section = Section::Cache;
        let mut header_seen = false;
        let mut stamp_seen = false;

        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        for (i, raw) in text.split('\n').enumerate() {
            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            let trimmed = raw.trim();

            let line = if trimmed.starts_with(HEADER_MANIFEST) {
                if header_seen {
                    return Err(AppCacheError::DuplicateHeader { line: i + 1 });
                }
                if i != 0 {
                    return Err(AppCacheError::MisplacedHeader { line: i + 1 });
                }
                header_seen = true;
                ManifestLine::Header(raw.to_owned())
            } else if !stamp_seen && trimmed.starts_with(STAMP_PREFIX) {
                stamp_seen = true;
                ManifestLine::Stamp(trimmed[STAMP_PREFIX.len()..].trim().to_owned())
            } else if trimmed.is_empty() || trimmed.starts_with('#') {
                ManifestLine::Passthrough(raw.to_owned())
            } else if let Some(s) = Section::detect(trimmed) {
                section = s;
                ManifestLine::SectionHeader {
                    section: s,
                    raw: raw.to_owned(),
                }
            } else {
                ManifestLine::Entry {
                    section,
                    raw: raw.to_owned(),
                }
            };
            lines.push(line);
        }

        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[ManifestLine] {
        &self.lines
    }

    pub fn stamp(&self) -> Option<&str> {
        self.lines.iter().find_map(|l| match l {
            ManifestLine::Stamp(token) => Some(token.as_str()),
            _ => None,
        })
    }

    /// Trimmed entries of the cache section(s), in document order.
    pub fn cache_entries(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ManifestLine::Entry {
                    section: Section::Cache,
                    raw,
                } => Some(raw.trim()),
                _ => None,
            })
            .collect()
    }

    /// Merge `candidates` into the first cache section and refresh the stamp.
    ///
    /// A candidate is dropped when an existing line, trimmed, starts with it.
    /// Nothing but the header, the stamp, and the inserted entries changes.
    pub fn merge(&mut self, candidates: &[String], stamp: &str) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            stamp: stamp.to_owned(),
            ..MergeOutcome::default()
        };

        let existing: Vec<String> = self.lines.iter().map(ManifestLine::text).collect();
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for candidate in candidates {
            if !seen.insert(candidate.as_str()) {
                continue;
            }
            if existing.iter().any(|l| l.trim().starts_with(candidate.as_str())) {
                outcome.already_present.push(candidate.clone());
            } else {
                fresh.push(candidate.clone());
            }
        }

        let new_entries = fresh.iter().map(|path| ManifestLine::Entry {
            section: Section::Cache,
            raw: path.clone(),
        });
        let cache_header = self.lines.iter().position(|l| {
            matches!(
                l,
                ManifestLine::SectionHeader {
                    section: Section::Cache,
                    ..
                }
            )
        });
        if let Some(pos) = cache_header {
            self.lines.splice(pos + 1..pos + 1, new_entries);
        } else {
            // Keep a trailing newline (an empty last line) at the end.
            let at = match self.lines.last() {
                Some(ManifestLine::Passthrough(raw)) if raw.is_empty() => self.lines.len() - 1,
                _ => self.lines.len(),
            };
            let block = std::iter::once(ManifestLine::SectionHeader {
                section: Section::Cache,
                raw: Section::Cache.header().to_owned(),
            })
            .chain(new_entries);
            self.lines.splice(at..at, block);
        }
        outcome.added = fresh;

        if !matches!(self.lines.first(), Some(ManifestLine::Header(_))) {
            self.lines
                .insert(0, ManifestLine::Header(HEADER_MANIFEST.to_owned()));
        }

        let mut refreshed = false;
        for line in &mut self.lines {
            if let ManifestLine::Stamp(token) = line {
                stamp.clone_into(token);
                refreshed = true;
                break;
            }
        }
        if !refreshed {
            self.lines.insert(1, ManifestLine::Stamp(stamp.to_owned()));
        }

        outcome
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(ManifestLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Merge `new_files` then `aux_files` into `existing`, or into a fresh manifest.
pub fn merge(
    existing: Option<AppCache>,
    new_files: &[String],
    aux_files: &[String],
    stamp: &str,
) -> (AppCache, MergeOutcome) {
    let mut doc = existing.unwrap_or_else(AppCache::empty);
    let candidates: Vec<String> = new_files.iter().chain(aux_files).cloned().collect();
    let outcome = doc.merge(&candidates, stamp);
    (doc, outcome)
}

/// A fresh cache-busting token: a random number followed by the current time in milliseconds.
pub fn new_stamp() -> String {
    format!(
        "{}{}",
        rand::random::<f64>(),
        chrono::Utc::now().timestamp_millis()
    )
}

/// Exclusive advisory lock on a `<manifest>.lock` sidecar, released on drop.
///
/// The manifest itself is replaced by rename, so the lock cannot live on it.
struct ManifestLock {
    lock_file: File,
}

impl ManifestLock {
    fn acquire(manifest: &Path) -> Result<Self, StoreError> {
        let mut name = manifest
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        let lock_path = manifest.with_file_name(name);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(format!("{}: {e}", lock_path.display())))?;
        Ok(Self { lock_file: file })
    }
}

impl Drop for ManifestLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

/// Read-modify-write the manifest at `path` under an exclusive lock.
///
/// A missing or blank file is replaced by a fresh manifest. A malformed one
/// is left untouched and reported as [`StoreError::Format`]. The new content
/// goes to a temporary file that is renamed over the manifest, so a failed
/// write never leaves it truncated.
pub fn merge_appcache_file(
    path: &Path,
    new_files: &[String],
    aux_files: &[String],
) -> Result<MergeOutcome, StoreError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let _lock = ManifestLock::acquire(path)?;
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let format_err = |source| StoreError::Format {
        path: path.display().to_string(),
        source,
    };
    let text = String::from_utf8(bytes).map_err(|_| format_err(AppCacheError::NotUtf8))?;
    let existing = if text.trim().is_empty() {
        None
    } else {
        Some(AppCache::parse(&text).map_err(format_err)?)
    };

    let (doc, outcome) = merge(existing, new_files, aux_files, &new_stamp());

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(doc.render().as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;

    debug!(
        "merged {} new entries into {}",
        outcome.added.len(),
        path.display()
    );
    Ok(outcome)
}
