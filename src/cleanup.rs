use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics::{DELETE_QUEUE_DROPS, FILES_SWEPT_TOTAL};

// Queue depth for the background delete worker. Deletions are rare relative
// to request volume, so a small bound is plenty; overflow falls back to the
// next sweep.
const DELETE_QUEUE_CAPACITY: usize = 64;

// Transient-file lifecycle manager for the staging directory.
//
// Voice payloads are staged on disk for the duration of one request and
// reclaimed two ways: an explicit fire-and-forget delete when the request
// finishes, and a periodic age-based sweep as a safety net for anything the
// explicit path missed. Neither path ever blocks a request handler and
// neither surfaces filesystem errors to callers - a file that survives a
// failed delete is picked up by a later sweep.
pub struct Janitor {
    dir: PathBuf,
    retention: Duration,
    sweep_after: u32,
    counter: AtomicU32,
    delete_tx: mpsc::Sender<PathBuf>,
}

impl Janitor {
    // Spawns the delete worker on the current runtime.
    pub fn new(dir: PathBuf, retention: Duration, sweep_after: u32) -> Self {
        let (delete_tx, delete_rx) = mpsc::channel(DELETE_QUEUE_CAPACITY);
        tokio::spawn(delete_worker(delete_rx));

        Self {
            dir,
            retention,
            sweep_after,
            counter: AtomicU32::new(0),
            delete_tx,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Make sure the staging directory exists. Failure here means a broken
    // environment and is the one cleanup error that propagates.
    pub fn ensure_workspace(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    // Schedule removal of the given paths without waiting for completion.
    // A full queue is logged and dropped - the sweep will catch the file.
    pub fn delete<I>(&self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in paths {
            if self.delete_tx.try_send(path).is_err() {
                DELETE_QUEUE_DROPS.inc();
                warn!("delete queue full, leaving file for the next sweep");
            }
        }
    }

    // Remove staged files older than the retention threshold. Awaiting this
    // directly is the administrative/shutdown path; request handlers only
    // reach it indirectly through tick().
    pub async fn sweep(&self) -> usize {
        sweep_dir(&self.dir, self.retention).await
    }

    // Count one processed message; every sweep_after ticks, kick off an
    // asynchronous sweep. The increment is atomic but the threshold check is
    // deliberately approximate under concurrent ticks - sweeps fire roughly,
    // not exactly, every sweep_after messages.
    pub fn tick(&self) {
        let ticks = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        if ticks >= self.sweep_after {
            self.counter.store(0, Ordering::Relaxed);
            let dir = self.dir.clone();
            let retention = self.retention;
            tokio::spawn(async move {
                sweep_dir(&dir, retention).await;
            });
        }
    }
}

// Drains the delete queue. "Already gone" is success; anything else is
// logged and left for the next sweep cycle.
async fn delete_worker(mut rx: mpsc::Receiver<PathBuf>) {
    debug!("delete worker started");

    while let Some(path) = rx.recv().await {
        match fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "deleted staged file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete staged file"),
        }
    }
}

async fn sweep_dir(dir: &Path, retention: Duration) -> usize {
    let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
        return 0;
    };

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "sweep could not read staging directory");
            return 0;
        }
    };

    let mut removed = 0usize;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "sweep aborted mid-scan");
                break;
            }
        };

        // metadata can vanish under a racing delete - skip, not an error
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        let Ok(mtime) = metadata.modified() else {
            continue;
        };

        if mtime < cutoff {
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), "swept stale file");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "sweep failed to remove file"),
            }
        }
    }

    if removed > 0 {
        FILES_SWEPT_TOTAL.inc_by(removed as f64);
        info!(removed, dir = %dir.display(), "swept stale staged files");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"payload").unwrap();
        path
    }

    async fn wait_until_gone(path: &Path) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while path.exists() {
            assert!(Instant::now() < deadline, "file was never deleted: {}", path.display());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn ensure_workspace_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("staging");
        let janitor = Janitor::new(dir.clone(), Duration::from_secs(300), 10);

        janitor.ensure_workspace().unwrap();
        janitor.ensure_workspace().unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn delete_removes_file_in_background() {
        let tmp = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(tmp.path().to_path_buf(), Duration::from_secs(300), 10);
        let path = touch(tmp.path(), "a.oga");

        janitor.delete([path.clone()]);
        wait_until_gone(&path).await;
    }

    #[tokio::test]
    async fn delete_of_missing_path_is_harmless() {
        let tmp = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(tmp.path().to_path_buf(), Duration::from_secs(300), 10);

        janitor.delete([tmp.path().join("never-existed.oga")]);

        // worker is still alive afterwards
        let path = touch(tmp.path(), "b.oga");
        janitor.delete([path.clone()]);
        wait_until_gone(&path).await;
    }

    #[tokio::test]
    async fn sweep_leaves_fresh_files() {
        let tmp = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(tmp.path().to_path_buf(), Duration::from_secs(3600), 10);
        let path = touch(tmp.path(), "fresh.oga");

        assert_eq!(janitor.sweep().await, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn sweep_removes_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(tmp.path().to_path_buf(), Duration::ZERO, 10);
        let stale = touch(tmp.path(), "stale.oga");

        // with zero retention anything written before "now" is stale
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(janitor.sweep().await, 1);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn sweep_on_missing_directory_returns_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(tmp.path().join("nope"), Duration::ZERO, 10);
        assert_eq!(janitor.sweep().await, 0);
    }

    #[tokio::test]
    async fn tick_triggers_sweep_at_threshold_and_resets() {
        let tmp = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(tmp.path().to_path_buf(), Duration::ZERO, 3);

        let first = touch(tmp.path(), "first.oga");
        tokio::time::sleep(Duration::from_millis(50)).await;

        janitor.tick();
        janitor.tick();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(first.exists(), "sweep fired before the threshold");

        janitor.tick();
        wait_until_gone(&first).await;

        // counter went back to zero - the next cycle needs three ticks again
        let second = touch(tmp.path(), "second.oga");
        tokio::time::sleep(Duration::from_millis(50)).await;

        janitor.tick();
        janitor.tick();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(second.exists(), "counter did not reset after a sweep");

        janitor.tick();
        wait_until_gone(&second).await;
    }
}
