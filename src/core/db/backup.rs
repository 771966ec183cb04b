/// Backup Module
///
/// Online copies of the active database into timestamp-named files. Backups
/// accumulate; nothing here deletes old ones or cleans up a partial file
/// after a failure.

use super::connection::{LogicalDatabase, DB_EXTENSION};
use crate::core::Result;
use chrono::Local;
use rusqlite::backup::Backup;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default directory backups are written to
pub const DEFAULT_BACKUP_DIR: &str = "backups";

/// Pages copied per backup step
const BACKUP_PAGES_PER_STEP: i32 = 256;

/// Computes `<dir>/<stem>_<YYYYMMDD_HHMMSS>.<ext>` for a database name
pub fn backup_path(dir: &Path, db_name: &str, timestamp: &str) -> PathBuf {
    let name = Path::new(db_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| db_name.to_string());
    let ext = name
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DB_EXTENSION.to_string());
    dir.join(format!("{}_{}.{}", stem, timestamp, ext))
}

/// Copies the database into a new timestamped file under `dir`.
///
/// `dir` is created if missing. The copy uses the engine's online backup
/// API, so the source stays readable and writable between steps.
///
/// # Returns
///
/// The path of the written backup file.
pub fn backup(db: &LogicalDatabase, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let target = backup_path(dir, db.name(), &timestamp);

    copy_to(db.conn(), &target)?;
    info!("Database backup created at {}", target.display());
    Ok(target)
}

/// Runs an online backup of `src` into the file at `target`
fn copy_to(src: &Connection, target: &Path) -> Result<()> {
    let mut dst = Connection::open(target)?;
    let backup = Backup::new(src, &mut dst)?;
    backup.run_to_completion(BACKUP_PAGES_PER_STEP, Duration::ZERO, None)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_path_naming() {
        let path = backup_path(Path::new("backups"), "ecommerce.sqlite", "20240102_030405");
        assert_eq!(path, PathBuf::from("backups/ecommerce_20240102_030405.sqlite"));

        let path = backup_path(Path::new("/tmp/b"), "shop", "20240102_030405");
        assert_eq!(path, PathBuf::from("/tmp/b/shop_20240102_030405.sqlite"));
    }

    #[test]
    fn test_copy_to_replicates_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = Connection::open_in_memory().unwrap();
        src.execute_batch(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
        )
        .unwrap();

        let target = dir.path().join("copy.sqlite");
        copy_to(&src, &target).unwrap();

        let copy = Connection::open(&target).unwrap();
        let count: i64 = copy.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
    }
}
