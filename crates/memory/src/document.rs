//! Whole-document load/store primitives.
//!
//! Every mutation in the vault is a read-modify-write of one file.  Writes go
//! through a `.tmp` sibling and a rename, so a reader sees either the old or
//! the new document, never a half-written one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Storage faults.  These are the only failures the vault reports to callers;
/// a missing section or an empty category is not an error.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to list {path}: {source}")]
    List { path: PathBuf, source: io::Error },
    #[error("cannot derive a file name from title {0:?}")]
    EmptySlug(String),
}

pub fn read_document(path: &Path) -> Result<String, VaultError> {
    fs::read_to_string(path).map_err(|source| VaultError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`read_document`] but a missing file is `Ok(None)`.
pub fn read_optional(path: &Path) -> Result<Option<String>, VaultError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(VaultError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn write_document(path: &Path, content: &str) -> Result<(), VaultError> {
    let write_err = |source| VaultError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp_path = {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());
        path.with_file_name(format!(".{filename}.tmp"))
    };

    if let Err(err) = fs::write(&tmp_path, content) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(err));
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(err));
    }

    Ok(())
}

/// Title of a document: the first level-1 heading, else the file stem.
pub fn derive_title(content: &str, path: &Path) -> String {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default()
        })
}
