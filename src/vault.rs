//! Flat-directory note store.
//!
//! A vault is a single directory of `<title>.<ext>` files. Only regular files
//! directly inside the root count as notes; subdirectories are ignored.
//! Every call goes to the filesystem, nothing is cached.

use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::error::VaultError;
use crate::models::{Note, NoteSummary};

#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
    extension: String,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.vault.path.clone(), config.vault.extension.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name for a title, e.g. `Ideas` → `Ideas.md`.
    pub fn file_name(&self, title: &str) -> String {
        format!("{}.{}", title, self.extension)
    }

    /// Recover a title from a note path by stripping the note extension.
    ///
    /// Returns `None` for files that do not carry the note extension.
    pub fn title_from_path(&self, path: &Path) -> Option<String> {
        if path.extension() != Some(OsStr::new(&self.extension)) {
            return None;
        }
        path.file_stem().map(|s| s.to_string_lossy().to_string())
    }

    /// Resolve the path of a note inside the vault root.
    pub fn note_path(&self, title: &str) -> Result<PathBuf, VaultError> {
        validate_title(title)?;
        Ok(self.root.join(self.file_name(title)))
    }

    /// List note files in directory-listing order.
    ///
    /// The order is whatever the filesystem enumeration yields and is not
    /// stable across platforms.
    pub async fn list_entries(&self) -> Result<Vec<PathBuf>, VaultError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| VaultError::vault_access(&self.root, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| VaultError::vault_access(&self.root, e))?
        {
            let path = entry.path();
            if self.title_from_path(&path).is_none() {
                continue;
            }
            // Follows symlinks; dangling links are not notes.
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => entries.push(path),
                _ => continue,
            }
        }

        Ok(entries)
    }

    /// Summaries of every note, sorted by title.
    pub async fn list_notes(&self) -> Result<Vec<NoteSummary>, VaultError> {
        let mut notes = Vec::new();
        for path in self.list_entries().await? {
            let Some(title) = self.title_from_path(&path) else {
                continue;
            };
            let meta = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping note without metadata");
                    continue;
                }
            };
            let modified = meta
                .modified()
                .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
                .unwrap_or_default();
            notes.push(NoteSummary {
                title,
                path,
                bytes: meta.len(),
                modified,
            });
        }
        notes.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(notes)
    }

    pub async fn read_note(&self, title: &str) -> Result<Note, VaultError> {
        let path = self.note_path(title)?;
        let content = read_text(&path).await.map_err(|e| match e {
            VaultError::NoteRead { source, .. } if source.kind() == ErrorKind::NotFound => {
                VaultError::NoteNotFound(title.to_string())
            }
            other => other,
        })?;
        Ok(Note {
            title: title.to_string(),
            content,
            path,
        })
    }

    /// Write a note. Fails with [`VaultError::NoteExists`] when the note is
    /// already present and `overwrite` is false.
    pub async fn write_note(
        &self,
        title: &str,
        content: &str,
        overwrite: bool,
    ) -> Result<PathBuf, VaultError> {
        let path = self.note_path(title)?;
        self.ensure_root().await?;

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = options.open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                VaultError::NoteExists(title.to_string())
            } else {
                VaultError::NoteWrite {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        write_all(&mut file, &path, content).await?;

        tracing::info!(title, path = %path.display(), "note written");
        Ok(path)
    }

    /// Append text to an existing note file.
    pub async fn append_to_path(&self, path: &Path, text: &str) -> Result<(), VaultError> {
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    VaultError::NoteNotFound(path.display().to_string())
                } else {
                    VaultError::NoteWrite {
                        path: path.to_path_buf(),
                        source: e,
                    }
                }
            })?;
        write_all(&mut file, path, text).await
    }

    pub(crate) async fn ensure_root(&self) -> Result<(), VaultError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(VaultError::vault_access(
                &self.root,
                std::io::Error::other("not a directory"),
            )),
            Err(e) => Err(VaultError::vault_access(&self.root, e)),
        }
    }
}

pub(crate) async fn read_text(path: &Path) -> Result<String, VaultError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| VaultError::NoteRead {
            path: path.to_path_buf(),
            source: e,
        })
}

pub(crate) async fn write_all(
    file: &mut tokio::fs::File,
    path: &Path,
    text: &str,
) -> Result<(), VaultError> {
    let to_write_err = |e: std::io::Error| VaultError::NoteWrite {
        path: path.to_path_buf(),
        source: e,
    };
    file.write_all(text.as_bytes()).await.map_err(to_write_err)?;
    file.flush().await.map_err(to_write_err)
}

/// Reject titles that would escape the vault root or produce no file name.
pub fn validate_title(title: &str) -> Result<(), VaultError> {
    let trimmed = title.trim();
    let invalid = trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || title.contains(['/', '\\', '\0']);
    if invalid {
        return Err(VaultError::InvalidTitle(title.to_string()));
    }
    Ok(())
}
