//! Workspace containment and ignore-rule enforcement.
//!
//! Every path a tool touches is resolved through this guard before any
//! side effect happens. Containment is checked lexically (targets may not
//! exist yet), ignore rules come from a gitignore-syntax file at the
//! workspace root.

use std::path::{Component, Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use taskloom_config::constants::IGNORE_FILE_NAME;

use crate::error::ToolError;

pub struct WorkspaceGuard {
    root: PathBuf,
    ignore: Gitignore,
}

impl WorkspaceGuard {
    pub fn new(root: &Path) -> anyhow::Result<Self> {
        let root = root.canonicalize()?;
        let mut builder = GitignoreBuilder::new(&root);
        let ignore_file = root.join(IGNORE_FILE_NAME);
        if ignore_file.is_file() {
            // add() reports a parse error without failing the build; a bad
            // ignore file must not take the whole engine down.
            if let Some(err) = builder.add(&ignore_file) {
                tracing::warn!(%err, "ignore file has invalid patterns");
            }
        }
        let ignore = builder.build()?;
        Ok(Self { root, ignore })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path to an absolute path inside the
    /// workspace. Rejects absolute paths pointing elsewhere and any `..`
    /// traversal that escapes the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(relative);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let normalized = normalize_lexically(&joined);
        if !normalized.starts_with(&self.root) {
            return Err(ToolError::AccessDenied(format!(
                "path '{relative}' is outside the workspace"
            )));
        }
        Ok(normalized)
    }

    /// Containment plus ignore-rule check for reads.
    pub fn resolve_readable(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let path = self.resolve(relative)?;
        self.check_ignored(relative, &path)?;
        Ok(path)
    }

    /// Containment plus ignore-rule check for writes. Write targets under
    /// an ignored path are refused even when the file does not exist yet.
    pub fn resolve_writable(&self, relative: &str) -> Result<PathBuf, ToolError> {
        let path = self.resolve(relative)?;
        self.check_ignored(relative, &path)?;
        Ok(path)
    }

    fn check_ignored(&self, relative: &str, absolute: &Path) -> Result<(), ToolError> {
        let is_dir = absolute.is_dir();
        if self
            .ignore
            .matched_path_or_any_parents(absolute, is_dir)
            .is_ignore()
        {
            return Err(ToolError::AccessDenied(format!(
                "path '{relative}' is blocked by {IGNORE_FILE_NAME}"
            )));
        }
        Ok(())
    }

    /// Whether a path found by directory walks should be hidden from tool
    /// output.
    pub fn is_ignored(&self, absolute: &Path) -> bool {
        self.ignore
            .matched_path_or_any_parents(absolute, absolute.is_dir())
            .is_ignore()
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn guard_in(dir: &Path) -> WorkspaceGuard {
        WorkspaceGuard::new(dir).expect("guard")
    }

    #[test]
    fn rejects_parent_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let guard = guard_in(dir.path());
        let err = guard.resolve("../outside.txt").expect_err("must escape");
        assert!(matches!(err, ToolError::AccessDenied(_)));
    }

    #[test]
    fn resolves_nested_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let guard = guard_in(dir.path());
        let path = guard.resolve("src/./lib.rs").expect("inside");
        assert!(path.starts_with(guard.root()));
        assert!(path.ends_with("src/lib.rs"));
    }

    #[test]
    fn ignore_file_blocks_reads_and_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(IGNORE_FILE_NAME), "secrets/\n*.pem\n").expect("ignore file");
        fs::create_dir(dir.path().join("secrets")).expect("mkdir");
        fs::write(dir.path().join("secrets/key.txt"), "k").expect("secret");
        let guard = guard_in(dir.path());

        assert!(guard.resolve_readable("secrets/key.txt").is_err());
        assert!(guard.resolve_writable("server.pem").is_err());
        assert!(guard.resolve_readable("README.md").is_ok());
    }
}
