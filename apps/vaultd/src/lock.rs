use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Advisory single-instance lock; released when the guard drops.
pub struct LockGuard {
    _file: File,
}

/// Fails with `WouldBlock` when another daemon already holds the lock.
pub fn acquire_lock(path: &Path) -> std::io::Result<LockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;

    file.try_lock_exclusive()?;
    Ok(LockGuard { _file: file })
}

#[cfg(test)]
mod tests {
    use super::acquire_lock;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("vaultd-lock-{nanos}"));

        let guard = acquire_lock(&path).expect("first acquire");
        assert!(acquire_lock(&path).is_err());

        drop(guard);
        acquire_lock(&path).expect("acquire after release");
        let _ = std::fs::remove_file(path);
    }
}
