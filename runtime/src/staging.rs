//! Scoped ownership of staged files.

use std::io;
use std::path::{Path, PathBuf};

/// Removes a staged file when dropped, unless disarmed.
///
/// Normal exit paths call [`StagedFileGuard::discard`], which removes the
/// file without blocking the runtime. Dropping an armed guard is the
/// fallback for early returns, `?` and unwinding, so a staged file never
/// outlives the scope that owns it.
#[derive(Debug)]
pub(crate) struct StagedFileGuard {
    path: PathBuf,
    armed: bool,
}

impl StagedFileGuard {
    pub(crate) const fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file; ownership passes to whoever consumes the event.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }

    /// Remove the file now, asynchronously.
    pub(crate) async fn discard(mut self) {
        log_removal(&self.path, tokio::fs::remove_file(&self.path).await);
        self.armed = false;
    }
}

impl Drop for StagedFileGuard {
    fn drop(&mut self) {
        if self.armed {
            log_removal(&self.path, std::fs::remove_file(&self.path));
        }
    }
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(file_path = %path.display(), "Staged file removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                file_path = %path.display(),
                error = %e,
                "Failed to remove staged file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        drop(StagedFileGuard::new(path.clone()));

        assert!(!path.exists());
    }

    #[test]
    fn disarmed_guard_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        let guard = StagedFileGuard::new(path.clone());
        assert_eq!(guard.path(), path.as_path());
        guard.disarm();

        assert!(path.exists());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        drop(StagedFileGuard::new(dir.path().join("never-written.csv")));
    }

    #[tokio::test]
    async fn discard_removes_file_without_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        StagedFileGuard::new(path.clone()).discard().await;

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn discard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        StagedFileGuard::new(dir.path().join("never-written.csv")).discard().await;
    }
}
