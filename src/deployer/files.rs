//! Source files and the providers that supply them.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{DeployError, EcatError, Result};
use crate::state::LOCK_FILE_NAME;

/// A file to materialize in a deployer's working directory.
///
/// The path is relative and stays inside the working directory: absolute
/// paths and `..` components are rejected on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    relative_path: PathBuf,
    content: Vec<u8>,
}

impl SourceFile {
    /// Creates a source file.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::UnsafeSourcePath`] if the path is empty,
    /// absolute, contains `..`, or names the lock file.
    pub fn new(relative_path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Result<Self> {
        let relative_path = relative_path.into();

        let safe = relative_path.file_name().is_some()
            && relative_path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            && relative_path.file_name() != Some(OsStr::new(LOCK_FILE_NAME));

        if !safe {
            return Err(EcatError::Deploy(DeployError::UnsafeSourcePath {
                path: relative_path.display().to_string(),
            }));
        }

        Ok(Self {
            relative_path,
            content: content.into(),
        })
    }

    /// Gets the path relative to the working directory.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Gets the file content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Writes the file under `working_dir`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be written.
    pub async fn write_to(&self, working_dir: &Path) -> Result<()> {
        let target = working_dir.join(&self.relative_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &self.content).await?;
        debug!("Wrote {} ({} bytes)", target.display(), self.content.len());
        Ok(())
    }
}

/// Supplies the source files for a verification run.
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Returns every file to deploy.
    async fn files(&self) -> Result<Vec<SourceFile>>;
}

/// Reads source files from local directories.
///
/// Directories are read in order and merged; a file in a later directory
/// replaces one with the same relative path from an earlier directory. This
/// lets a configuration directory override files from a code directory.
#[derive(Debug, Clone)]
pub struct LocalDirectoryProvider {
    roots: Vec<PathBuf>,
}

/// Directory names never copied into a working directory.
const SKIPPED_DIRS: &[&str] = &[".git", ".terraform"];

impl LocalDirectoryProvider {
    /// Creates a provider for a single directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Adds a directory whose files override earlier ones.
    #[must_use]
    pub fn with_overlay(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    async fn collect(root: &Path, files: &mut Vec<SourceFile>) -> Result<()> {
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    let skipped = path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name));
                    if !skipped {
                        pending.push(path);
                    }
                } else if file_type.is_file() {
                    let relative = path
                        .strip_prefix(root)
                        .map_err(|e| EcatError::internal(e.to_string()))?;
                    if relative.file_name() == Some(OsStr::new(LOCK_FILE_NAME)) {
                        continue;
                    }
                    let content = tokio::fs::read(&path).await?;
                    files.push(SourceFile::new(relative, content)?);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl FileProvider for LocalDirectoryProvider {
    async fn files(&self) -> Result<Vec<SourceFile>> {
        let mut merged: Vec<SourceFile> = Vec::new();

        for root in &self.roots {
            let mut found = Vec::new();
            Self::collect(root, &mut found).await?;
            debug!("Read {} file(s) from {}", found.len(), root.display());

            for file in found {
                merged.retain(|existing| existing.relative_path() != file.relative_path());
                merged.push(file);
            }
        }

        merged.sort_by(|a, b| a.relative_path().cmp(b.relative_path()));
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_unsafe_paths() {
        for path in ["/etc/passwd", "../main.tf", "modules/../../x", "", ".ecat.lock"] {
            assert!(
                matches!(
                    SourceFile::new(path, b"x".to_vec()),
                    Err(EcatError::Deploy(DeployError::UnsafeSourcePath { .. }))
                ),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_accepts_nested_relative_paths() {
        let file = SourceFile::new("modules/network/main.tf", b"x".to_vec()).unwrap();
        assert_eq!(file.relative_path(), Path::new("modules/network/main.tf"));
        assert_eq!(file.content(), b"x");
    }

    #[tokio::test]
    async fn test_write_to_creates_parents() {
        let temp = TempDir::new().unwrap();
        let file = SourceFile::new("modules/a/main.tf", b"resource {}".to_vec()).unwrap();

        file.write_to(temp.path()).await.unwrap();

        let written = std::fs::read(temp.path().join("modules/a/main.tf")).unwrap();
        assert_eq!(written, b"resource {}");
    }

    #[tokio::test]
    async fn test_local_provider_overlay() {
        let code = TempDir::new().unwrap();
        let config = TempDir::new().unwrap();
        std::fs::create_dir_all(code.path().join("modules")).unwrap();
        std::fs::create_dir_all(code.path().join(".git")).unwrap();
        std::fs::write(code.path().join("main.tf"), "code").unwrap();
        std::fs::write(code.path().join("terraform.tfvars"), "defaults").unwrap();
        std::fs::write(code.path().join("modules/net.tf"), "net").unwrap();
        std::fs::write(code.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(config.path().join("terraform.tfvars"), "project").unwrap();

        let provider = LocalDirectoryProvider::new(code.path()).with_overlay(config.path());
        let files = provider.files().await.unwrap();

        let paths: Vec<_> = files.iter().map(|f| f.relative_path().to_path_buf()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("main.tf"),
                PathBuf::from("modules/net.tf"),
                PathBuf::from("terraform.tfvars"),
            ]
        );
        assert_eq!(files[2].content(), b"project");
    }
}
