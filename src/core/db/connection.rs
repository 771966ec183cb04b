/// Connection Management Module
///
/// This module owns the single active database of a gateway, replaces it on
/// `connect`, closes it on `disconnect`, and provides the in-process
/// transaction helper used by composite operations.

use crate::core::{GatewayError, Result};
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, error, info, instrument};

/// Database name used when `connect` is called without one
pub const DEFAULT_DB_NAME: &str = "ecommerce.sqlite";

/// Extension appended to database names that lack it
pub const DB_EXTENSION: &str = "sqlite";

/// Settings applied to every database the registry opens
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    /// Directory database files are resolved against
    pub data_dir: PathBuf,
    /// Name used when `connect` receives no name
    pub default_name: String,
    /// Value for `PRAGMA journal_mode`
    pub journal_mode: String,
    /// Value for `PRAGMA foreign_keys`
    pub foreign_keys: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            data_dir: PathBuf::from("."),
            default_name: DEFAULT_DB_NAME.to_string(),
            journal_mode: "WAL".to_string(),
            foreign_keys: true,
        }
    }
}

/// One named, file-backed database opened by the registry
#[derive(Debug)]
pub struct LogicalDatabase {
    name: String,
    path: PathBuf,
    conn: Connection,
}

impl LogicalDatabase {
    /// Opens (or creates) the database file and applies the configured pragmas
    fn open(name: String, path: PathBuf, options: &ConnectionOptions) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "foreign_keys", options.foreign_keys)?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            options.journal_mode.as_str(),
            |row| row.get(0),
        )?;
        debug!("Opened {} with journal_mode={}", path.display(), mode);

        Ok(LogicalDatabase { name, path, conn })
    }

    /// The database name as resolved by the registry (always with extension)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying engine connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Internal registry state
#[derive(Debug, Default)]
struct DbState {
    /// Active database (None if disconnected)
    active: Option<LogicalDatabase>,
}

/// Handle to a single active database shared by everyone holding a clone.
///
/// Every clone observes the same active database: a `connect` through one
/// clone redirects the very next call made through any other clone. Separate
/// registries created with [`ConnectionRegistry::new`] are fully independent.
///
/// The name of the active database is tracked apart from the connection, so
/// status checks never wait behind a running query.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    options: Arc<ConnectionOptions>,
    state: Arc<Mutex<DbState>>,
    active_name: Arc<RwLock<Option<String>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        ConnectionRegistry::new(ConnectionOptions::default())
    }
}

impl ConnectionRegistry {
    /// Creates a registry with no active database
    pub fn new(options: ConnectionOptions) -> Self {
        ConnectionRegistry {
            options: Arc::new(options),
            state: Arc::new(Mutex::new(DbState::default())),
            active_name: Arc::new(RwLock::new(None)),
        }
    }

    /// Options the registry opens databases with
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Resolves a requested name to the file name that will be opened.
    ///
    /// Missing or empty names use the default name; names without the
    /// `.sqlite` suffix get it appended.
    pub fn resolve_name(&self, name: Option<&str>) -> String {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => self.options.default_name.as_str(),
        };
        let suffix = format!(".{}", DB_EXTENSION);
        if name.ends_with(&suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        }
    }

    /// Opens the named database and makes it the active one.
    ///
    /// The previous active database is closed only after the new one opened
    /// successfully; a failed open leaves the registry as it was.
    ///
    /// # Returns
    ///
    /// The resolved database name.
    #[instrument(skip(self))]
    pub fn connect(&self, name: Option<&str>) -> Result<String> {
        let name = self.resolve_name(name);
        let path = self.options.data_dir.join(&name);

        let db = LogicalDatabase::open(name.clone(), path, &self.options).map_err(|e| {
            error!("Error connecting to {}: {}", name, e);
            e
        })?;

        let mut guard = self.lock();
        if let Some(previous) = guard.active.replace(db) {
            debug!("Replacing active database {}", previous.name);
        }
        self.set_active_name(Some(name.clone()));
        info!("Connected to {} successfully", name);
        Ok(name)
    }

    /// Closes the active database.
    ///
    /// The registry is disconnected afterwards even if the engine reports an
    /// error while closing; that error is logged and the handle dropped.
    ///
    /// # Returns
    ///
    /// `Some(name)` of the closed database, or `None` if nothing was open.
    #[instrument(skip(self))]
    pub fn disconnect(&self) -> Result<Option<String>> {
        let mut guard = self.lock();
        let closed = guard.active.take();
        self.set_active_name(None);

        Ok(closed.map(|db| {
            let name = db.name;
            match db.conn.close() {
                Ok(()) => info!("Disconnected from {}", name),
                Err((_, e)) => error!("Error closing {}: {}", name, e),
            }
            name
        }))
    }

    /// Checks if there's an active database
    pub fn is_connected(&self) -> bool {
        self.active_name().is_some()
    }

    /// Name of the active database, if any.
    ///
    /// Does not wait for queries running on the active connection.
    pub fn active_name(&self) -> Option<String> {
        self.active_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs `f` against the active database.
    ///
    /// The registry lock is held for the duration of `f`, so calls through
    /// the same registry are serialized on the single engine connection.
    pub fn with_database<T>(&self, f: impl FnOnce(&LogicalDatabase) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let db = guard.active.as_ref().ok_or(GatewayError::NotConnected)?;
        f(db)
    }

    /// Runs `f` against the active database's connection
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.with_database(|db| f(db.conn()))
    }

    /// Runs `f` inside an engine transaction on the active database.
    ///
    /// Generic gateway calls never share a transaction; this helper is for
    /// in-process composite operations such as order placement. The
    /// transaction commits when `f` returns `Ok` and rolls back when it
    /// returns `Err` or panics.
    #[instrument(skip_all)]
    pub fn transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let db = guard.active.as_mut().ok_or(GatewayError::NotConnected)?;
        let tx = db.conn.transaction()?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                debug!("Transaction committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!("Rollback failed: {}", rollback_err);
                }
                debug!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Locks the registry state. A panic in an earlier caller leaves the
    /// state consistent (a single `Option` swap), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, DbState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_active_name(&self, name: Option<String>) {
        *self
            .active_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry_in(dir: &TempDir) -> ConnectionRegistry {
        ConnectionRegistry::new(ConnectionOptions {
            data_dir: dir.path().to_path_buf(),
            ..ConnectionOptions::default()
        })
    }

    #[test]
    fn test_resolve_name() {
        let registry = ConnectionRegistry::default();
        assert_eq!(registry.resolve_name(None), "ecommerce.sqlite");
        assert_eq!(registry.resolve_name(Some("")), "ecommerce.sqlite");
        assert_eq!(registry.resolve_name(Some("shop")), "shop.sqlite");
        assert_eq!(registry.resolve_name(Some("shop.sqlite")), "shop.sqlite");
        assert_eq!(registry.resolve_name(Some("shop.db")), "shop.db.sqlite");
    }

    #[test]
    fn test_connect_and_disconnect() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        assert!(!registry.is_connected());

        let name = registry.connect(Some("shop")).unwrap();
        assert_eq!(name, "shop.sqlite");
        assert!(registry.is_connected());
        assert_eq!(registry.active_name().as_deref(), Some("shop.sqlite"));
        assert!(dir.path().join("shop.sqlite").exists());

        assert_eq!(registry.disconnect().unwrap().as_deref(), Some("shop.sqlite"));
        assert!(!registry.is_connected());
        assert_eq!(registry.disconnect().unwrap(), None);
    }

    #[test]
    fn test_operations_require_connection() {
        let registry = ConnectionRegistry::default();
        let result = registry.with_connection(|_| Ok(()));
        assert!(matches!(result, Err(GatewayError::NotConnected)));
        let result = registry.transaction(|_| Ok(()));
        assert!(matches!(result, Err(GatewayError::NotConnected)));
    }

    #[test]
    fn test_clones_share_the_active_database() {
        let dir = TempDir::new().unwrap();
        let a = registry_in(&dir);
        let b = a.clone();

        a.connect(Some("first")).unwrap();
        b.connect(Some("second")).unwrap();
        assert_eq!(a.active_name().as_deref(), Some("second.sqlite"));

        let independent = registry_in(&dir);
        assert!(!independent.is_connected());
    }

    #[test]
    fn test_failed_connect_keeps_previous_database() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.connect(Some("good")).unwrap();

        let result = registry.connect(Some("missing_dir/bad"));
        assert!(matches!(result, Err(GatewayError::Engine(_))));
        assert_eq!(registry.active_name().as_deref(), Some("good.sqlite"));
    }

    #[test]
    fn test_pragmas_applied() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.connect(None).unwrap();

        let (fk, mode) = registry
            .with_connection(|conn| {
                let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0))?;
                let mode: String = conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?;
                Ok((fk, mode))
            })
            .unwrap();
        assert_eq!(fk, 1);
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_active_name_does_not_wait_for_running_queries() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.connect(Some("busy")).unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = {
            let registry = registry.clone();
            thread::spawn(move || {
                registry
                    .with_connection(|_| {
                        entered_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(())
                    })
                    .unwrap();
            })
        };
        entered_rx.recv().unwrap();

        let (name_tx, name_rx) = mpsc::channel();
        let reader = registry.clone();
        thread::spawn(move || name_tx.send(reader.active_name()).unwrap());
        let name = name_rx.recv_timeout(Duration::from_secs(5));

        release_tx.send(()).unwrap();
        worker.join().unwrap();
        assert_eq!(name.unwrap().as_deref(), Some("busy.sqlite"));
    }

    #[test]
    fn test_panicking_caller_does_not_wedge_registry() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.connect(None).unwrap();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = registry.with_connection(|_| panic!("handler bug"));
        }));
        assert!(outcome.is_err());

        let one: i64 = registry
            .with_connection(|conn| Ok(conn.query_row("SELECT 1", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(one, 1);
        assert_eq!(registry.disconnect().unwrap().as_deref(), Some("ecommerce.sqlite"));
        assert!(!registry.is_connected());
    }

    #[test]
    fn test_transaction_commit_and_rollback() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);
        registry.connect(None).unwrap();
        registry
            .with_connection(|conn| {
                conn.execute("CREATE TABLE t (id INTEGER)", [])?;
                Ok(())
            })
            .unwrap();

        registry
            .transaction(|tx| {
                tx.execute("INSERT INTO t VALUES (1)", [])?;
                Ok(())
            })
            .unwrap();

        let failed: Result<()> = registry.transaction(|tx| {
            tx.execute("INSERT INTO t VALUES (2)", [])?;
            Err(GatewayError::Transaction("abort".to_string()))
        });
        assert!(failed.is_err());

        let count: i64 = registry
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }
}
