//! Durable per-page result cache.
//!
//! Extraction calls are costly and occasionally produce malformed output.
//! Caching at *page* granularity — one JSON file per
//! (exam, artifact kind, page index) — bounds the cost of any rerun to the
//! pages not yet successfully parsed. This is the pipeline's only recovery
//! mechanism; there is no separate retry or checkpoint layer.
//!
//! ## Invariants
//!
//! * An entry, once written, is authoritative for its page on all future
//!   runs. Nothing invalidates it automatically; delete the file to force
//!   reprocessing.
//! * Entries are written only after a successful parse, so the cache never
//!   records a failed page as "empty".
//! * A malformed entry on disk (truncated write, manual edit) is skipped
//!   with a warning and treated as a miss — it never blocks the rest of the
//!   exam's cache.
//!
//! ## Layout
//!
//! `{root}/{exam}_{kind}_{page:04}.json`, e.g. `P_questions_0003.json`.
//! The loader reverse-maps filenames with `rsplitn(3, '_')`, so an exam code
//! containing `_` still round-trips losslessly. The directory listing is the
//! index; swapping the backend for a key-value store only touches this module.

use crate::error::ExamError;
use crate::model::{ArtifactKind, Fragment};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-per-page store for parsed extraction results.
#[derive(Debug, Clone)]
pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    /// Create a cache rooted at `root`. The directory is created lazily on
    /// the first [`ResultCache::store`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ResultCache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, exam: &str, kind: ArtifactKind, page: usize) -> PathBuf {
        self.root.join(format!("{exam}_{kind}_{page:04}.json"))
    }

    /// Reverse-map a cache filename to its key, `None` if it is not ours.
    fn parse_file_name(name: &str) -> Option<(String, ArtifactKind, usize)> {
        let stem = name.strip_suffix(".json")?;
        let mut parts = stem.rsplitn(3, '_');
        let page: usize = parts.next()?.parse().ok()?;
        let kind = ArtifactKind::parse(parts.next()?)?;
        let exam = parts.next()?;
        if exam.is_empty() {
            return None;
        }
        Some((exam.to_string(), kind, page))
    }

    /// Load every persisted entry for (`exam`, `kind`).
    ///
    /// Entries for other exams or kinds are not read. Malformed entries are
    /// skipped with a warning. A missing cache directory is an empty map,
    /// not an error.
    pub fn lookup<T: Fragment>(
        &self,
        exam: &str,
        kind: ArtifactKind,
    ) -> Result<BTreeMap<usize, Vec<T>>, ExamError> {
        let mut entries = BTreeMap::new();
        if !self.root.exists() {
            return Ok(entries);
        }

        let listing = fs::read_dir(&self.root).map_err(|e| ExamError::CacheIo {
            path: self.root.clone(),
            source: e,
        })?;

        for dirent in listing {
            let dirent = dirent.map_err(|e| ExamError::CacheIo {
                path: self.root.clone(),
                source: e,
            })?;
            let name = dirent.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((entry_exam, entry_kind, page)) = Self::parse_file_name(name) else {
                continue;
            };
            if entry_exam != exam || entry_kind != kind {
                continue;
            }
            // read_entry warns on malformed entries; a bad entry is a miss.
            if let Some(fragments) = self.read_entry::<T>(&dirent.path()) {
                entries.insert(page, fragments);
            }
        }

        debug!(exam, %kind, cached_pages = entries.len(), "cache lookup");
        Ok(entries)
    }

    /// Read the entry for a single page, `None` on miss or malformed entry.
    pub fn get<T: Fragment>(&self, exam: &str, kind: ArtifactKind, page: usize) -> Option<Vec<T>> {
        let path = self.entry_path(exam, kind, page);
        if !path.exists() {
            return None;
        }
        self.read_entry(&path)
    }

    /// Durably persist the fragment list for one page.
    ///
    /// Creates the cache directory if absent. Overwrites any prior entry for
    /// the same key; callers only write on a miss, but last-write-wins keeps
    /// the semantics defined either way.
    pub fn store<T: Fragment>(
        &self,
        exam: &str,
        kind: ArtifactKind,
        page: usize,
        fragments: &[T],
    ) -> Result<(), ExamError> {
        fs::create_dir_all(&self.root).map_err(|e| ExamError::CacheIo {
            path: self.root.clone(),
            source: e,
        })?;

        let path = self.entry_path(exam, kind, page);
        let json = serde_json::to_string_pretty(fragments)
            .map_err(|e| ExamError::Internal(format!("cache entry serialisation: {e}")))?;

        // Entries are the durability primitive of the pipeline: write through
        // a temp file + rename so a crash mid-write cannot leave a truncated
        // entry behind. The `.tmp` suffix keeps partial files invisible to
        // the lookup's filename parser.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| ExamError::CacheIo {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| ExamError::CacheIo {
            path: path.clone(),
            source: e,
        })?;

        debug!(exam, %kind, page, count = fragments.len(), "cache entry written");
        Ok(())
    }

    fn read_entry<T: Fragment>(&self, path: &Path) -> Option<Vec<T>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable cache entry, skipping");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(fragments) => Some(fragments),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed cache entry, skipping");
                None
            }
        }
    }
}
