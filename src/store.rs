//! JSON snapshot file backing the CLI between invocations.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use loyalty_core::{LedgerConfig, LedgerSnapshot, LoyaltyLedger, SnapshotError};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
    #[error("encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("snapshot {path} rejected: {source}")]
    Rejected {
        path: String,
        source: SnapshotError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Exclusive hold on the sidecar lock file next to a snapshot. Released when
/// dropped.
#[derive(Debug)]
pub struct StateLock {
    _file: fs::File,
    path: PathBuf,
}

impl StateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Block until this process is the only one holding the lock for the
/// snapshot at `path`. Hold the returned guard from [`open`] through [`save`]
/// so concurrent invocations cannot interleave their read-modify-write.
pub fn lock(path: &Path) -> Result<StateLock, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let lock_path = path.with_extension("json.lock");
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(io_error(&lock_path))?;
    flock_exclusive(&file).map_err(io_error(&lock_path))?;
    debug!(lock = %lock_path.display(), "state lock acquired");
    Ok(StateLock {
        _file: file,
        path: lock_path,
    })
}

fn flock_exclusive(file: &fs::File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        loop {
            // SAFETY: flock is a standard POSIX call and `fd` stays owned by
            // `file` for the duration of the call.
            #[allow(unsafe_code)]
            let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
            if result == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(())
    }
}

/// Load the ledger stored at `path`, or an empty ledger when the file does
/// not exist yet.
pub fn open(path: &Path, config: LedgerConfig) -> Result<LoyaltyLedger, StoreError> {
    if !path.exists() {
        debug!(state = %path.display(), "no snapshot yet, starting empty ledger");
        return Ok(LoyaltyLedger::with_config(config));
    }
    let bytes = fs::read(path).map_err(io_error(path))?;
    let snapshot: LedgerSnapshot =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            path: path.display().to_string(),
            source,
        })?;
    LoyaltyLedger::restore(snapshot, config).map_err(|source| StoreError::Rejected {
        path: path.display().to_string(),
        source,
    })
}

/// Write the snapshot next to `path` and rename it into place.
pub fn save(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let encoded = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(io_error(&tmp))?;
    file.write_all(&encoded).map_err(io_error(&tmp))?;
    file.sync_all().map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_opens_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = open(&dir.path().join("state.json"), LedgerConfig::default()).unwrap();
        assert_eq!(ledger.snapshot().meta.height, 0);
    }

    #[test]
    fn saved_state_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let ledger = LoyaltyLedger::new();
        let id = ledger.create_program("Coffee Rewards", "Coffee Points", "owner").unwrap();
        ledger.issue_points(id, "alice", 150, "owner").unwrap();
        save(&path, &ledger.snapshot()).unwrap();

        let reopened = open(&path, LedgerConfig::default()).unwrap();
        assert_eq!(reopened.get_balance(id, "alice"), 150);
        assert_eq!(reopened.snapshot(), ledger.snapshot());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn lock_file_sits_beside_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let guard = lock(&path).unwrap();
        assert_eq!(guard.path(), path.with_extension("json.lock"));
        assert!(guard.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn second_holder_waits_for_release() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::{thread, time::Duration};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let first = lock(&path).unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let path = path.clone();
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _second = lock(&path).unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(200));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(first);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[cfg(unix)]
    #[test]
    fn locked_invocations_do_not_lose_updates() {
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let workers = 8;

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let path = path.clone();
                thread::spawn(move || {
                    let _guard = lock(&path).unwrap();
                    let ledger = open(&path, LedgerConfig::default()).unwrap();
                    let name = format!("program-{worker}");
                    ledger.create_program(&name, "Points", "owner").unwrap();
                    save(&path, &ledger.snapshot()).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ledger = open(&path, LedgerConfig::default()).unwrap();
        let meta = ledger.snapshot().meta;
        assert_eq!(meta.last_program_id, workers);
        assert_eq!(meta.height, workers);
    }

    #[test]
    fn garbage_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            open(&path, LedgerConfig::default()),
            Err(StoreError::Decode { .. })
        ));
    }
}
