//! Run-scoped temporary artifact lifecycle.
//!
//! Every production run owns one [`ArtifactManager`]. It creates a private
//! namespace directory inside the working directory, hands out unique paths
//! for intermediate files, and removes all of them when the run ends. Two
//! runs never share a namespace, so concurrent productions cannot collide.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ef_core::{ErrorKind, RunId};
use parking_lot::Mutex;
use serde::Serialize;
use tempfile::TempDir;

/// A tracked temporary artifact owned by an [`ArtifactManager`].
///
/// The file at [`path`](Self::path) is not created by acquisition; the stage
/// that produces it writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    seq: u32,
    path: PathBuf,
}

impl ArtifactHandle {
    /// Location of the artifact inside the run namespace.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A non-fatal failure to remove a temporary artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupWarning {
    /// Artifact (or namespace directory) that could not be removed.
    pub path: PathBuf,
    /// Underlying failure.
    pub message: String,
}

impl CleanupWarning {
    /// Always [`ErrorKind::ArtifactCleanupFailure`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ArtifactCleanupFailure
    }
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.kind(),
            self.path.display(),
            self.message
        )
    }
}

#[derive(Debug)]
struct Inner {
    next_seq: u32,
    tracked: BTreeMap<u32, PathBuf>,
    /// `None` once the namespace has been released.
    dir: Option<TempDir>,
}

/// Owns the temporary artifacts of one production run.
#[derive(Debug)]
pub struct ArtifactManager {
    run_id: RunId,
    namespace: PathBuf,
    inner: Mutex<Inner>,
}

impl ArtifactManager {
    /// Create the run namespace inside `working_dir`.
    ///
    /// The working directory is created if it does not exist.
    pub fn new(working_dir: &Path, run_id: RunId) -> ef_core::Result<Self> {
        std::fs::create_dir_all(working_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("episode-{}-", run_id.short()))
            .tempdir_in(working_dir)?;
        let namespace = dir.path().to_path_buf();

        tracing::debug!(run_id = %run_id, namespace = %namespace.display(), "artifact namespace created");

        Ok(Self {
            run_id,
            namespace,
            inner: Mutex::new(Inner {
                next_seq: 0,
                tracked: BTreeMap::new(),
                dir: Some(dir),
            }),
        })
    }

    /// The run this manager belongs to.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The namespace directory. It no longer exists after [`release_all`](Self::release_all).
    pub fn namespace(&self) -> &Path {
        &self.namespace
    }

    /// Allocate a unique, tracked path ending in `suffix`.
    ///
    /// Fails once the namespace has been released.
    pub fn acquire_temp(&self, suffix: &str) -> ef_core::Result<ArtifactHandle> {
        let mut inner = self.inner.lock();
        if inner.dir.is_none() {
            return Err(ef_core::Error::Internal(format!(
                "artifact namespace for run {} already released",
                self.run_id
            )));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let name = format!("{seq:03}-{}", sanitize(suffix));
        let path = self.namespace.join(name);
        inner.tracked.insert(seq, path.clone());

        tracing::trace!(path = %path.display(), "artifact acquired");
        Ok(ArtifactHandle { seq, path })
    }

    /// Delete one artifact and stop tracking it.
    ///
    /// A file that was never written (or is already gone) is not an error.
    pub fn release(&self, handle: &ArtifactHandle) -> Result<(), CleanupWarning> {
        let removed = self.inner.lock().tracked.remove(&handle.seq);
        match removed {
            Some(path) => remove_if_present(&path),
            None => Ok(()),
        }
    }

    /// Delete every tracked artifact and the namespace directory.
    ///
    /// Idempotent: after the first call the manager is empty and further calls
    /// return no warnings. Failures are reported, never raised.
    pub fn release_all(&self) -> Vec<CleanupWarning> {
        let (tracked, dir) = {
            let mut inner = self.inner.lock();
            (std::mem::take(&mut inner.tracked), inner.dir.take())
        };

        let mut warnings: Vec<CleanupWarning> = tracked
            .into_values()
            .filter_map(|path| remove_if_present(&path).err())
            .collect();

        if let Some(dir) = dir {
            if let Err(e) = dir.close() {
                warnings.push(CleanupWarning {
                    path: self.namespace.clone(),
                    message: e.to_string(),
                });
            }
            for w in &warnings {
                tracing::warn!(run_id = %self.run_id, "{w}");
            }
            tracing::debug!(run_id = %self.run_id, "artifact namespace released");
        }

        warnings
    }

    /// Move a tracked artifact out of the namespace to `destination`.
    ///
    /// Parent directories are created. A rename is attempted first with a
    /// copy+remove fallback for cross-filesystem moves. The artifact is no
    /// longer tracked afterwards.
    pub fn persist(&self, handle: &ArtifactHandle, destination: &Path) -> ef_core::Result<PathBuf> {
        if !self.inner.lock().tracked.contains_key(&handle.seq) {
            return Err(ef_core::Error::Internal(format!(
                "artifact {} is not tracked by run {}",
                handle.path.display(),
                self.run_id
            )));
        }
        if !handle.path.exists() {
            return Err(ef_core::Error::missing_input(&handle.path, "does not exist"));
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        if let Err(_rename_err) = std::fs::rename(&handle.path, destination) {
            if let Err(e) = std::fs::copy(&handle.path, destination) {
                // Never leave a truncated episode behind.
                let _ = std::fs::remove_file(destination);
                return Err(e.into());
            }
            let _ = std::fs::remove_file(&handle.path);
        }

        self.inner.lock().tracked.remove(&handle.seq);
        tracing::debug!(to = %destination.display(), "artifact persisted");
        Ok(destination.to_path_buf())
    }

    /// Paths currently tracked, in acquisition order.
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.inner.lock().tracked.values().cloned().collect()
    }

    /// Whether [`release_all`](Self::release_all) has run.
    pub fn is_released(&self) -> bool {
        self.inner.lock().dir.is_none()
    }
}

impl Drop for ArtifactManager {
    fn drop(&mut self) {
        if !self.is_released() {
            let _ = self.release_all();
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), CleanupWarning> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CleanupWarning {
            path: path.to_path_buf(),
            message: e.to_string(),
        }),
    }
}

/// Keep artifact names inside the namespace.
fn sanitize(suffix: &str) -> String {
    suffix
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &TempDir) -> ArtifactManager {
        ArtifactManager::new(dir.path(), RunId::new()).unwrap()
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn namespace_created_inside_working_dir() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        assert!(mgr.namespace().is_dir());
        assert_eq!(mgr.namespace().parent().unwrap(), work.path());
        let name = mgr.namespace().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("episode-{}-", mgr.run_id().short())));
    }

    #[test]
    fn acquire_allocates_unique_untouched_paths() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        let a = mgr.acquire_temp("scene.mp4").unwrap();
        let b = mgr.acquire_temp("scene.mp4").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(!a.path().exists());
        assert!(a.path().file_name().unwrap().to_string_lossy().starts_with("000-"));
        assert!(b.path().file_name().unwrap().to_string_lossy().starts_with("001-"));
        assert_eq!(mgr.tracked().len(), 2);
    }

    #[test]
    fn suffix_cannot_escape_namespace() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        let h = mgr.acquire_temp("../../etc/passwd").unwrap();
        assert_eq!(h.path().parent().unwrap(), mgr.namespace());
    }

    #[test]
    fn release_single_artifact() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        let h = mgr.acquire_temp("a.mp4").unwrap();
        std::fs::write(h.path(), b"data").unwrap();
        mgr.release(&h).unwrap();
        assert!(!h.path().exists());
        assert!(mgr.tracked().is_empty());
        // Second release of the same handle is a no-op.
        mgr.release(&h).unwrap();
    }

    #[test]
    fn release_unwritten_artifact_is_not_an_error() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        let h = mgr.acquire_temp("never-written.mp4").unwrap();
        assert!(mgr.release(&h).is_ok());
    }

    #[test]
    fn release_all_empties_working_dir_and_is_idempotent() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        for i in 0..3 {
            let h = mgr.acquire_temp(&format!("part{i}.mp4")).unwrap();
            std::fs::write(h.path(), b"x").unwrap();
        }

        assert!(mgr.release_all().is_empty());
        assert!(mgr.is_released());
        assert_eq!(entries(work.path()), 0);

        assert!(mgr.release_all().is_empty());
        assert_eq!(entries(work.path()), 0);
    }

    #[test]
    fn acquire_after_release_fails() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        mgr.release_all();
        assert!(mgr.acquire_temp("late.mp4").is_err());
    }

    #[test]
    fn unremovable_artifact_becomes_warning() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        let h = mgr.acquire_temp("stubborn").unwrap();
        // A non-empty directory cannot be removed with remove_file.
        std::fs::create_dir(h.path()).unwrap();
        std::fs::write(h.path().join("inner"), b"x").unwrap();

        let warnings = mgr.release_all();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].path, h.path());
        assert_eq!(warnings[0].kind(), ErrorKind::ArtifactCleanupFailure);
        // The namespace removal is recursive, so nothing is left behind.
        assert_eq!(entries(work.path()), 0);
    }

    #[test]
    fn persist_moves_artifact_out_of_namespace() {
        let work = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mgr = manager(&work);
        let h = mgr.acquire_temp("final.mp4").unwrap();
        std::fs::write(h.path(), b"episode").unwrap();

        let dest = out.path().join("nested").join("episode.mp4");
        let persisted = mgr.persist(&h, &dest).unwrap();
        assert_eq!(persisted, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"episode");
        assert!(mgr.tracked().is_empty());

        mgr.release_all();
        assert!(dest.exists());
        assert_eq!(entries(work.path()), 0);
    }

    #[test]
    fn persist_missing_artifact_fails() {
        let work = TempDir::new().unwrap();
        let mgr = manager(&work);
        let h = mgr.acquire_temp("ghost.mp4").unwrap();
        let err = mgr.persist(&h, &work.path().join("out.mp4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInputArtifact);
    }

    #[test]
    fn drop_releases_everything() {
        let work = TempDir::new().unwrap();
        {
            let mgr = manager(&work);
            let h = mgr.acquire_temp("dropped.mp4").unwrap();
            std::fs::write(h.path(), b"x").unwrap();
        }
        assert_eq!(entries(work.path()), 0);
    }

    #[test]
    fn concurrent_runs_use_distinct_namespaces() {
        let work = TempDir::new().unwrap();
        let a = manager(&work);
        let b = manager(&work);
        assert_ne!(a.namespace(), b.namespace());
        a.release_all();
        assert!(b.namespace().is_dir());
    }
}
