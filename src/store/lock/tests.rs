use super::*;
use tempfile::TempDir;

const WINDOW: Duration = Duration::from_secs(600);

#[test]
fn acquire_writes_pid_and_timestamp() {
    let dir = TempDir::new().expect("should create temp dir");
    let lock = WriterLock::acquire(dir.path(), WINDOW).expect("should acquire");

    let info = LockInfo::read(lock.path()).expect("lock file should parse");
    assert_eq!(info.pid, std::process::id());
    assert!(info.acquired_at <= Utc::now());
}

#[test]
fn second_writer_is_rejected() {
    let dir = TempDir::new().expect("should create temp dir");
    let _lock = WriterLock::acquire(dir.path(), WINDOW).expect("should acquire");

    let err = WriterLock::acquire(dir.path(), WINDOW).expect_err("should be locked");
    assert!(matches!(err, RagError::Database(msg) if msg.contains("locked")));
}

#[test]
fn drop_releases_the_lock() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = {
        let lock = WriterLock::acquire(dir.path(), WINDOW).expect("should acquire");
        lock.path().to_path_buf()
    };

    assert!(!path.exists());
    WriterLock::acquire(dir.path(), WINDOW).expect("should reacquire after drop");
}

#[test]
fn stale_lock_is_replaced() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join(LOCK_FILE_NAME);
    let old = LockInfo {
        pid: 999_999,
        acquired_at: Utc::now() - chrono::Duration::hours(2),
    };
    fs::write(&path, old.render()).expect("should write stale lock");

    let lock = WriterLock::acquire(dir.path(), WINDOW).expect("stale lock should be replaced");
    let info = LockInfo::read(lock.path()).expect("lock file should parse");
    assert_eq!(info.pid, std::process::id());
}

#[test]
fn fresh_foreign_lock_is_respected() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join(LOCK_FILE_NAME);
    let other = LockInfo {
        pid: 4242,
        acquired_at: Utc::now(),
    };
    fs::write(&path, other.render()).expect("should write lock");

    let err = WriterLock::acquire(dir.path(), WINDOW).expect_err("should be locked");
    assert!(matches!(err, RagError::Database(msg) if msg.contains("4242")));
    assert!(path.exists());
}

#[test]
fn creates_missing_directory() {
    let dir = TempDir::new().expect("should create temp dir");
    let nested = dir.path().join("a").join("b");

    let lock = WriterLock::acquire(&nested, WINDOW).expect("should acquire");
    assert!(lock.path().starts_with(&nested));
}

struct FullDisk;

impl Write for FullDisk {
    fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(ErrorKind::StorageFull, "no space left"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn failed_owner_write_removes_the_lock_file() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join(LOCK_FILE_NAME);
    fs::write(&path, "").expect("should create empty lock file");

    let err = record_owner(&mut FullDisk, &path, &LockInfo::current()).expect_err("should fail");

    assert!(matches!(err, RagError::Io(ref e) if e.kind() == ErrorKind::StorageFull));
    assert!(!path.exists());
    let lock = WriterLock::acquire(dir.path(), Duration::from_secs(60))
        .expect("should acquire after cleanup");
    assert_eq!(lock.path(), path);
}

#[test]
fn parse_rejects_garbage() {
    assert_eq!(LockInfo::parse("not a lock"), None);
    assert_eq!(LockInfo::parse(""), None);
}
