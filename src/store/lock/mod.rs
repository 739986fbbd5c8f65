#[cfg(test)]
mod tests;

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{RagError, Result};

pub const LOCK_FILE_NAME: &str = ".writer.lock";

/// Exclusive write access to a persistence directory, released on drop.
///
/// The lock file holds the owner's pid and the acquisition time (RFC 3339).
/// A lock older than the staleness window is treated as abandoned.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockInfo {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }

    fn render(&self) -> String {
        format!("{}\n{}\n", self.pid, self.acquired_at.to_rfc3339())
    }

    fn parse(contents: &str) -> Option<Self> {
        let mut lines = contents.lines();
        let pid = lines.next()?.trim().parse().ok()?;
        let acquired_at = DateTime::parse_from_rfc3339(lines.next()?.trim())
            .ok()?
            .with_timezone(&Utc);
        Some(Self { pid, acquired_at })
    }

    #[inline]
    pub fn read(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|contents| Self::parse(&contents))
    }
}

impl WriterLock {
    #[inline]
    pub fn acquire(dir: &Path, stale_after: Duration) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE_NAME);

        // One retry after clearing a stale lock
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    record_owner(&mut file, &path, &LockInfo::current())?;
                    debug!("Acquired writer lock {}", path.display());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !is_stale(&path, stale_after) {
                        let holder = LockInfo::read(&path).map_or_else(
                            || "another process".to_string(),
                            |info| format!("process {} since {}", info.pid, info.acquired_at),
                        );
                        return Err(RagError::Database(format!(
                            "vector store at {} is locked by {holder}",
                            dir.display()
                        )));
                    }
                    warn!("Replacing stale writer lock {}", path.display());
                    match fs::remove_file(&path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RagError::Database(format!(
            "could not acquire writer lock at {}",
            path.display()
        )))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    #[inline]
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove writer lock {}: {}", self.path.display(), e);
        } else {
            debug!("Released writer lock {}", self.path.display());
        }
    }
}

/// Write the owner into a freshly created lock file, removing the file if
/// that fails so no ownerless lock is left behind.
fn record_owner(file: &mut impl Write, path: &Path, owner: &LockInfo) -> Result<()> {
    let written = file
        .write_all(owner.render().as_bytes())
        .and_then(|()| file.flush());
    if let Err(e) = written {
        if let Err(remove_err) = fs::remove_file(path) {
            warn!(
                "Failed to remove partial writer lock {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(e.into());
    }
    Ok(())
}

/// Age comes from the recorded timestamp, or the file's mtime if unreadable
fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let acquired_at = LockInfo::read(path).map(|info| info.acquired_at).or_else(|| {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    });

    let Some(acquired_at) = acquired_at else {
        return false;
    };

    Utc::now()
        .signed_duration_since(acquired_at)
        .to_std()
        .is_ok_and(|age| age > stale_after)
}
