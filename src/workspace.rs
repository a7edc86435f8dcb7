//! Sandboxed file access for the run's target tree.
//!
//! Every read, write, and listing resolves against the sandbox root and
//! refuses paths that escape it. Writes can retain a backup of the prior
//! content so an interrupted or bad rewrite is always recoverable.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path `{0}` escapes sandbox")]
    Sandbox(String),

    #[error("write to `{path}` failed, prior content preserved: {source}")]
    WriteFailure {
        path: String,
        source: std::io::Error,
    },
}

/// File-access collaborator rooted at the sandbox directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path and verify it stays within the sandbox root.
    ///
    /// Non-existent files (write targets) are resolved via their parent.
    pub fn sandbox_check(&self, path: &Path) -> Result<PathBuf, WorkspaceError> {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = candidate.canonicalize().or_else(|_| {
            let parent = candidate
                .parent()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no parent"))?;
            let canon_parent = parent.canonicalize()?;
            Ok::<_, std::io::Error>(canon_parent.join(candidate.file_name().unwrap_or_default()))
        })?;

        if !resolved.starts_with(&self.root) {
            return Err(WorkspaceError::Sandbox(path.display().to_string()));
        }
        Ok(resolved)
    }

    pub fn read(&self, path: &Path) -> Result<String, WorkspaceError> {
        let full = self.sandbox_check(path)?;
        Ok(std::fs::read_to_string(full)?)
    }

    /// Write `content` to `path`. With `backup` set, the prior content is
    /// copied to `<path>.bak` first; if the write itself fails the original
    /// file is untouched (the copy runs before the overwrite).
    pub fn write(&self, path: &Path, content: &str, backup: bool) -> Result<(), WorkspaceError> {
        let full = self.sandbox_check(path)?;
        if backup && full.exists() {
            let bak = backup_path(&full);
            std::fs::copy(&full, &bak)?;
        }
        std::fs::write(&full, content).map_err(|source| WorkspaceError::WriteFailure {
            path: path.display().to_string(),
            source,
        })
    }

    /// Deterministic (lexicographically sorted) recursive listing of Python
    /// source files under `dir`. Test modules and cache directories are
    /// skipped; queue population depends on this order being reproducible.
    pub fn list_sources(&self, dir: &Path) -> Result<Vec<PathBuf>, WorkspaceError> {
        let full = self.sandbox_check(dir)?;
        let mut files = Vec::new();
        collect_py_files(&full, &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

fn collect_py_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), WorkspaceError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type()?.is_dir() {
            if name.starts_with('.') || name == "__pycache__" || name == "venv" {
                continue;
            }
            collect_py_files(&path, out)?;
        } else if name.ends_with(".py") && !name.starts_with("test_") {
            out.push(path);
        }
    }
    Ok(())
}

/// Companion test file for a module: `test_<stem>.py` next to it.
pub fn companion_test_path(module: &Path) -> PathBuf {
    let stem = module
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    module.with_file_name(format!("test_{stem}.py"))
}
