//! Managed storage for uploaded source PDFs.
//!
//! [`DocumentStore`] owns one flat directory of source files: save,
//! enumerate, page-level text extraction, deletion, and a self-healing
//! `clean` pass. Extraction goes through `pdf-extract`; anything it cannot
//! parse surfaces as [`Error::Load`] and is the caller's to skip or
//! propagate.
//!
//! Filenames are identity: saving under an existing name overwrites
//! (last-write-wins, no versioning).

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::models::{DocumentPage, StoreInfo};

pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    /// Open the store, creating the managed directory if needed.
    pub fn new(dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path a stored file lives at.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write `bytes` under the sanitized `name` and return the path.
    ///
    /// A name collision overwrites the previous file; a byte-identical
    /// upload skips the rewrite.
    pub fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
        let name = sanitize_filename(name);
        let path = self.dir.join(&name);

        if let Ok(existing) = fs::read(&path) {
            if digest(&existing) == digest(bytes) {
                tracing::debug!(file = %name, "identical upload, keeping existing file");
                return Ok(path);
            }
        }

        fs::write(&path, bytes)
            .map_err(|e| Error::Storage(format!("cannot write {}: {}", path.display(), e)))?;
        tracing::info!(file = %name, bytes = bytes.len(), "saved upload");
        Ok(path)
    }

    /// Extract page-level text from the PDF at `path`.
    ///
    /// Fails with [`Error::Load`] when the file is unreadable, corrupt, or
    /// yields no extractable text on any page. Pages are numbered from 1.
    pub fn load(&self, path: &Path) -> Result<Vec<DocumentPage>, Error> {
        // pdf-extract panics on some malformed inputs; a corrupt file must
        // surface as a Load error, not take the process down.
        let texts = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            pdf_extract::extract_text_by_pages(path)
        }))
        .map_err(|_| Error::Load(format!("{}: extractor panicked", path.display())))?
        .map_err(|e| Error::Load(format!("{}: {}", path.display(), e)))?;

        let pages: Vec<DocumentPage> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| DocumentPage {
                text,
                page: i as u32 + 1,
            })
            .collect();

        if pages.iter().all(|p| p.text.trim().is_empty()) {
            return Err(Error::Load(format!(
                "{}: no extractable text",
                path.display()
            )));
        }

        Ok(pages)
    }

    /// Filenames of the stored PDFs, sorted. I/O errors yield an empty list.
    pub fn list(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("cannot list {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_pdf_name(name))
            .collect();
        names.sort();
        names
    }

    /// Remove one stored file. Returns `false` when the file is absent;
    /// "not found" is never an error.
    pub fn delete(&self, name: &str) -> bool {
        let path = self.dir.join(name);
        if !path.exists() {
            tracing::warn!(file = name, "delete requested for missing file");
            return false;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(file = name, "deleted stored file");
                true
            }
            Err(e) => {
                tracing::warn!(file = name, "could not delete: {}", e);
                false
            }
        }
    }

    /// Remove several stored files; returns how many were deleted.
    pub fn delete_many(&self, names: &[String]) -> usize {
        names.iter().filter(|name| self.delete(name)).count()
    }

    /// Remove every stored PDF; returns how many were deleted.
    pub fn delete_all(&self) -> usize {
        let names = self.list();
        self.delete_many(&names)
    }

    /// Self-healing pass: remove files with the wrong extension and PDFs
    /// that fail to load. Never removes a loadable PDF; per-file failures
    /// do not abort the scan. Returns the number of files removed.
    pub fn clean(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("cannot scan {}: {}", self.dir.display(), e);
                return 0;
            }
        };

        let mut removed = 0usize;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            let reason = if !is_pdf_name(&name) {
                Some("wrong extension")
            } else if let Err(e) = self.load(&path) {
                tracing::warn!(file = %name, "unloadable during clean: {}", e);
                Some("unloadable")
            } else {
                None
            };

            if let Some(reason) = reason {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::info!(file = %name, reason, "cleaned invalid file");
                        removed += 1;
                    }
                    Err(e) => tracing::warn!(file = %name, "could not remove: {}", e),
                }
            }
        }
        removed
    }

    /// Count, filenames, and total size of the stored PDFs.
    pub fn info(&self) -> StoreInfo {
        let files = self.list();
        let total_size_bytes = files
            .iter()
            .filter_map(|name| fs::metadata(self.dir.join(name)).ok())
            .map(|m| m.len())
            .sum();

        StoreInfo {
            count: files.len(),
            files,
            total_size_bytes,
        }
    }
}

/// Whether a filename claims to be a PDF.
pub fn is_pdf_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}

/// Reduce an uploaded filename to a safe flat name: path components are
/// stripped, whitespace collapses to `_`, and anything outside
/// `[A-Za-z0-9._-]` is dropped.
pub fn sanitize_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    let mut last_was_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push('_');
            }
            last_was_space = true;
        } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            last_was_space = false;
        } else {
            last_was_space = false;
        }
    }

    if out.is_empty() {
        "unnamed.pdf".to_string()
    } else {
        out
    }
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
