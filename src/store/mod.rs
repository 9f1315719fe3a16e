//! Filesystem-facing artifact operations
//!
//! Artifacts live flat in a single updates directory. Each may have a
//! `<file>.changelog` sidecar next to it, and an in-flight download writes to
//! `<file>.partial` until the engine finishes.
//!
//! A missing updates directory is reported separately from failures:
//! [`ArtifactListing::DirectoryMissing`] for listings and
//! [`StoreError::DirectoryMissing`] for mutations.
//!
//! File names arrive from the server catalog, so every operation that takes
//! one refuses names that are not a single plain component with
//! [`StoreError::InvalidFileName`].

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::utils::{
    CHANGELOG_SUFFIX, PARTIAL_SUFFIX, file_name_of, md5_file, strip_partial_suffix,
    validate_file_name,
};
use std::path::{Path, PathBuf};

/// Text shown when a changelog cannot be read
pub const CHANGELOG_PLACEHOLDER: &str = "No changelog available";

/// Outcome of listing the updates directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactListing {
    /// The updates directory does not exist; nothing to show
    DirectoryMissing,
    /// Artifact file names with the configured extension, sorted by name
    Present(Vec<String>),
}

impl ArtifactListing {
    /// File names, empty when the directory is missing
    pub fn into_files(self) -> Vec<String> {
        match self {
            ArtifactListing::DirectoryMissing => Vec::new(),
            ArtifactListing::Present(files) => files,
        }
    }
}

/// Artifact store rooted at the updates directory
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl ArtifactStore {
    /// Create a store for `dir`, recognising files ending in `extension`
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Create a store from configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(
            config.updates_dir.clone(),
            config.artifact_extension.clone(),
        )
    }

    /// The updates directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The recognised artifact extension
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Full path of an artifact
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Full path of an artifact's changelog sidecar
    pub fn changelog_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!("{file_name}{CHANGELOG_SUFFIX}"))
    }

    /// Destination an in-flight download writes to
    pub fn partial_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!("{file_name}{PARTIAL_SUFFIX}"))
    }

    /// Whether `path` names an entry directly inside the updates directory
    ///
    /// Compared lexically first, then by canonical parent so that symlinked or
    /// relative spellings of the same directory still match.
    pub async fn contains(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        if file_name_of(path).is_none_or(|name| validate_file_name(name).is_err()) {
            return false;
        }
        if parent == self.dir {
            return true;
        }
        match (
            tokio::fs::canonicalize(parent).await,
            tokio::fs::canonicalize(&self.dir).await,
        ) {
            (Ok(parent), Ok(dir)) => parent == dir,
            _ => false,
        }
    }

    async fn dir_exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.dir).await?)
    }

    /// Create the updates directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Artifact file names present in the updates directory
    ///
    /// Only regular files ending in the configured extension are listed, so
    /// sidecars and `.partial` downloads are skipped.
    pub async fn list(&self) -> Result<ArtifactListing> {
        if !self.dir_exists().await? {
            return Ok(ArtifactListing::DirectoryMissing);
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::debug!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            if name.ends_with(&self.extension) {
                files.push(name);
            }
        }

        files.sort();
        Ok(ArtifactListing::Present(files))
    }

    /// Delete an artifact and, best-effort, its changelog sidecar
    pub async fn delete(&self, file_name: &str) -> Result<()> {
        validate_file_name(file_name)?;
        if !self.dir_exists().await? {
            return Err(StoreError::DirectoryMissing {
                path: self.dir.clone(),
            }
            .into());
        }

        let path = self.artifact_path(file_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::ArtifactNotFound {
                    file_name: file_name.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        let sidecar = self.changelog_path(file_name);
        if let Err(e) = tokio::fs::remove_file(&sidecar).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(path = %sidecar.display(), error = %e, "failed to delete changelog sidecar");
        }

        tracing::info!(file_name, "deleted update artifact");
        Ok(())
    }

    /// Remove everything under the updates directory and leave it existing and empty
    ///
    /// The tree is walked with an explicit stack. Entries that cannot be
    /// removed are collected and reported together in
    /// [`StoreError::DeleteIncomplete`]; the walk does not stop at the first one.
    pub async fn delete_all(&self) -> Result<()> {
        if !self.dir_exists().await? {
            return Err(StoreError::DirectoryMissing {
                path: self.dir.clone(),
            }
            .into());
        }

        let mut failures: Vec<(PathBuf, String)> = Vec::new();
        let mut pending = vec![self.dir.clone()];
        // Directories in discovery order; parents always precede their children
        let mut subdirs: Vec<PathBuf> = Vec::new();

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    failures.push((dir, e.to_string()));
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        failures.push((dir.clone(), e.to_string()));
                        break;
                    }
                };
                let path = entry.path();
                let is_dir = match entry.file_type().await {
                    Ok(file_type) => file_type.is_dir(),
                    Err(e) => {
                        failures.push((path, e.to_string()));
                        continue;
                    }
                };

                if is_dir {
                    pending.push(path.clone());
                    subdirs.push(path);
                } else if let Err(e) = tokio::fs::remove_file(&path).await {
                    failures.push((path, e.to_string()));
                }
            }
        }

        for dir in subdirs.into_iter().rev() {
            if let Err(e) = tokio::fs::remove_dir(&dir).await {
                failures.push((dir, e.to_string()));
            }
        }

        self.ensure_dir().await?;

        if failures.is_empty() {
            tracing::info!(dir = %self.dir.display(), "cleared updates directory");
            Ok(())
        } else {
            tracing::warn!(
                dir = %self.dir.display(),
                failed = failures.len(),
                "updates directory only partially cleared"
            );
            Err(StoreError::DeleteIncomplete { failures }.into())
        }
    }

    /// Write the changelog sidecar for an artifact
    pub async fn write_changelog(&self, file_name: &str, text: &str) -> Result<()> {
        validate_file_name(file_name)?;
        tokio::fs::write(self.changelog_path(file_name), text).await?;
        Ok(())
    }

    /// Read the changelog sidecar, `None` when there is none
    pub async fn read_changelog(&self, file_name: &str) -> Result<Option<String>> {
        validate_file_name(file_name)?;
        match tokio::fs::read_to_string(self.changelog_path(file_name)).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Changelog text, or [`CHANGELOG_PLACEHOLDER`] on any failure
    pub async fn read_changelog_or_placeholder(&self, file_name: &str) -> String {
        match self.read_changelog(file_name).await {
            Ok(Some(text)) => text,
            Ok(None) => CHANGELOG_PLACEHOLDER.to_string(),
            Err(e) => {
                tracing::debug!(file_name, error = %e, "failed to read changelog");
                CHANGELOG_PLACEHOLDER.to_string()
            }
        }
    }

    /// Rename a finished `.partial` download to its final name
    ///
    /// Paths without the suffix are returned unchanged. If the engine already
    /// renamed the file, the final path is returned as long as it exists.
    pub async fn promote_partial(&self, path: &Path) -> Result<PathBuf> {
        let Some(name) = file_name_of(path) else {
            return Ok(path.to_path_buf());
        };
        if !name.ends_with(PARTIAL_SUFFIX) {
            return Ok(path.to_path_buf());
        }

        let final_path = path.with_file_name(strip_partial_suffix(name));
        match tokio::fs::rename(path, &final_path).await {
            Ok(()) => Ok(final_path),
            Err(e)
                if e.kind() == std::io::ErrorKind::NotFound
                    && tokio::fs::try_exists(&final_path).await.unwrap_or(false) =>
            {
                Ok(final_path)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every trace of a rejected download, ignoring what is already gone
    ///
    /// Covers the final artifact, its `.partial` and the changelog sidecar.
    /// Failures are logged and otherwise ignored.
    pub async fn discard(&self, file_name: &str) {
        if validate_file_name(file_name).is_err() {
            return;
        }
        let paths = [
            self.artifact_path(file_name),
            self.partial_path(file_name),
            self.changelog_path(file_name),
        ];
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "discarded download file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to discard download file")
                }
            }
        }
    }

    /// Copy a completed artifact to the installer staging path
    ///
    /// The cached copy in the updates directory is removed afterwards, together
    /// with its changelog sidecar.
    pub async fn stage(&self, file_name: &str, target: &Path) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        let source = self.artifact_path(file_name);
        if !tokio::fs::try_exists(&source).await? {
            return Err(StoreError::ArtifactNotFound {
                file_name: file_name.to_string(),
            }
            .into());
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&source, target).await?;
        self.delete(file_name).await?;

        tracing::info!(file_name, target = %target.display(), "staged update for installation");
        Ok(target.to_path_buf())
    }

    /// MD5 of an artifact in the updates directory
    pub async fn md5_of(&self, file_name: &str) -> Result<String> {
        validate_file_name(file_name)?;
        md5_file(&self.artifact_path(file_name)).await
    }
}
