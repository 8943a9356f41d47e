/// Connection Management Module
///
/// This module provides connection acquisition, session state handling,
/// and transaction lifecycle management for Rowbind.
///
/// A [`Session`] owns at most one physical connection at a time and moves
/// between three states:
///
/// ```text
///            open()                begin_transaction()
///   Closed ─────────▶ Open ───────────────────────▶ OpenInTransaction
///     ▲                 ▲ ◀───────────────────────────────┘
///     │                 │        commit() / rollback()
///     └──── close() ────┴──────────── close() ─────────────┘
/// ```
///
/// `close()` never fails: rollback and disconnect errors during teardown
/// are logged and discarded.
use crate::core::{OrmError, Result};
use crate::dialect::IdentifierEncoder;
use crate::types::TypeConverterRegistry;
use rusqlite::Connection;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::query::QueryExecutor;

/// Supplies live connections to a session.
pub trait ConnectionProvider {
    /// # Errors
    ///
    /// Returns `OrmError::Connection` when no connection can be opened.
    fn acquire(&self) -> Result<Connection>;
}

impl<F> ConnectionProvider for F
where
    F: Fn() -> Result<Connection>,
{
    fn acquire(&self) -> Result<Connection> {
        self()
    }
}

/// Opens SQLite databases by path.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: String,
    busy_timeout: Option<Duration>,
    pragmas: Vec<String>,
}

impl SqliteProvider {
    /// A provider for the database file at `path`, or `":memory:"`.
    pub fn new(path: impl Into<String>) -> Self {
        SqliteProvider {
            path: path.into(),
            busy_timeout: None,
            pragmas: Vec::new(),
        }
    }

    /// A provider for a fresh in-memory database on every acquire.
    pub fn in_memory() -> Self {
        SqliteProvider::new(":memory:")
    }

    /// Sets how long a locked database is retried before failing.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    /// Adds a PRAGMA (e.g. `"foreign_keys = ON"`) applied right after opening.
    pub fn with_pragma(mut self, pragma: impl Into<String>) -> Self {
        self.pragmas.push(pragma.into());
        self
    }

    /// The database path this provider opens.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl ConnectionProvider for SqliteProvider {
    fn acquire(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| OrmError::Connection(format!("Failed to open {}: {}", self.path, e)))?;

        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout).map_err(|e| {
                OrmError::Connection(format!("Failed to set busy timeout: {}", e))
            })?;
        }

        for pragma in &self.pragmas {
            conn.execute_batch(&format!("PRAGMA {};", pragma))
                .map_err(|e| {
                    OrmError::Connection(format!("Failed to apply PRAGMA {}: {}", pragma, e))
                })?;
        }

        Ok(conn)
    }
}

/// Transaction isolation levels.
///
/// SQLite has no per-connection isolation setter, so each level maps to a
/// `read_uncommitted` pragma value and a `BEGIN` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Same physical level as `ReadCommitted`
    #[default]
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn read_uncommitted(self) -> bool {
        matches!(self, IsolationLevel::ReadUncommitted)
    }

    pub fn begin_statement(self) -> &'static str {
        match self {
            IsolationLevel::None
            | IsolationLevel::ReadUncommitted
            | IsolationLevel::ReadCommitted => "BEGIN DEFERRED",
            IsolationLevel::RepeatableRead => "BEGIN IMMEDIATE",
            IsolationLevel::Serializable => "BEGIN EXCLUSIVE",
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection held
    #[default]
    Closed,
    /// Connection held, autocommit
    Open,
    /// Connection held, explicit transaction active
    OpenInTransaction,
}

/// One logical database session.
///
/// A session is owned by a single caller; it provides no internal locking.
pub struct Session {
    provider: Box<dyn ConnectionProvider>,
    encoder: Box<dyn IdentifierEncoder>,
    registry: Arc<TypeConverterRegistry>,
    default_isolation: IsolationLevel,
    connection: Option<Connection>,
    state: SessionState,
}

impl Session {
    /// Creates a closed session using the process-wide converter registry.
    pub fn new<P, E>(provider: P, encoder: E) -> Self
    where
        P: ConnectionProvider + 'static,
        E: IdentifierEncoder + 'static,
    {
        Session::from_boxed(Box::new(provider), Box::new(encoder))
    }

    pub fn from_boxed(
        provider: Box<dyn ConnectionProvider>,
        encoder: Box<dyn IdentifierEncoder>,
    ) -> Self {
        Session {
            provider,
            encoder,
            registry: TypeConverterRegistry::global(),
            default_isolation: IsolationLevel::default(),
            connection: None,
            state: SessionState::Closed,
        }
    }

    /// Uses `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<TypeConverterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Level used by [`Session::begin_transaction`].
    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = level;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn is_in_transaction(&self) -> bool {
        self.state == SessionState::OpenInTransaction
    }

    /// Identifier encoder used when generating SQL.
    pub fn encoder(&self) -> &dyn IdentifierEncoder {
        self.encoder.as_ref()
    }

    /// Converter registry used for binding and materialization.
    pub fn registry(&self) -> &TypeConverterRegistry {
        &self.registry
    }

    /// Acquires a connection. No-op when one is already held.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Connection` when the provider fails; the session
    /// stays closed.
    pub fn open(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        let conn = self.provider.acquire()?;
        self.connection = Some(conn);
        self.state = SessionState::Open;
        info!("Session opened");
        Ok(())
    }

    /// Begins a transaction at the session's default isolation level.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.begin_transaction_with(self.default_isolation)
    }

    /// Begins a transaction at `level`, opening the session if needed.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Transaction` if a transaction is already active.
    pub fn begin_transaction_with(&mut self, level: IsolationLevel) -> Result<()> {
        if self.is_in_transaction() {
            return Err(OrmError::Transaction(
                "repeat begin_transaction: a transaction is already active".to_string(),
            ));
        }
        self.open()?;
        let conn = self.connection()?;
        conn.pragma_update(None, "read_uncommitted", level.read_uncommitted())?;
        conn.execute_batch(level.begin_statement())?;
        self.state = SessionState::OpenInTransaction;
        info!(isolation = ?level, "Transaction started");
        Ok(())
    }

    /// Commits the active transaction. No-op without one.
    ///
    /// If the database already ended the transaction on its own (for
    /// example a `RAISE(ROLLBACK)` trigger), the session returns to `Open`.
    pub fn commit(&mut self) -> Result<()> {
        if !self.is_in_transaction() || self.transaction_ended_by_driver()? {
            return Ok(());
        }
        let result = self.connection()?.execute_batch("COMMIT");
        self.finish_transaction(result, "committed")
    }

    /// Rolls back the active transaction. No-op without one.
    ///
    /// The session returns to `Open` whenever the connection is back in
    /// autocommit mode afterwards, even if `ROLLBACK` itself failed.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.is_in_transaction() || self.transaction_ended_by_driver()? {
            return Ok(());
        }
        let result = self.connection()?.execute_batch("ROLLBACK");
        self.finish_transaction(result, "rolled back")
    }

    /// Rolls back any active transaction, releases the connection and
    /// leaves the session closed. Idempotent; failures are logged only.
    pub fn close(&mut self) {
        if let Some(conn) = self.connection.take() {
            if self.state == SessionState::OpenInTransaction {
                if let Err(e) = conn.execute_batch("ROLLBACK") {
                    warn!(error = %e, "Rollback during close failed; ignoring");
                }
            }
            if let Err((_conn, e)) = conn.close() {
                warn!(error = %e, "Disconnect during close failed; ignoring");
            }
            info!("Session closed");
        }
        self.state = SessionState::Closed;
    }

    /// Runs `work` inside a transaction at `level`: commits when it
    /// returns `Ok`, rolls back and returns its error otherwise.
    pub fn transaction<T, F>(&mut self, level: IsolationLevel, work: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        self.begin_transaction_with(level)?;
        match work(self) {
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(e) => {
                    if self.is_in_transaction() {
                        if let Err(rollback_err) = self.rollback() {
                            warn!(error = %rollback_err, "Rollback after failed commit failed");
                        }
                    }
                    Err(e)
                }
            },
            Err(e) => {
                debug!(error = %e, "Transaction body failed; rolling back");
                if let Err(rollback_err) = self.rollback() {
                    warn!(error = %rollback_err, "Rollback after failed transaction body failed");
                }
                Err(e)
            }
        }
    }

    /// Opens the session if needed and returns an executor on its connection.
    pub(crate) fn executor(&mut self) -> Result<QueryExecutor<'_>> {
        self.open()?;
        let conn = self
            .connection
            .as_ref()
            .ok_or_else(|| OrmError::Connection("session has no connection".to_string()))?;
        Ok(QueryExecutor::new(conn, &self.registry))
    }

    /// Syncs the state with a connection that has already left its
    /// transaction. Returns `true` when that happened.
    fn transaction_ended_by_driver(&mut self) -> Result<bool> {
        if self.connection()?.is_autocommit() {
            warn!("Transaction was already ended by the database");
            self.state = SessionState::Open;
            return Ok(true);
        }
        Ok(false)
    }

    fn finish_transaction(&mut self, result: rusqlite::Result<()>, outcome: &str) -> Result<()> {
        match result {
            Ok(()) => {
                self.state = SessionState::Open;
                info!("Transaction {}", outcome);
                Ok(())
            }
            Err(e) => {
                if self.connection()?.is_autocommit() {
                    self.state = SessionState::Open;
                }
                Err(e.into())
            }
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| OrmError::Connection("session has no connection".to_string()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("default_isolation", &self.default_isolation)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::AnsiEncoder;
    use crate::test_utils::memory_session;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_session_starts_closed() {
        let session = memory_session();
        assert!(session.is_closed());
        assert!(!session.is_in_transaction());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_open_is_idempotent() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let provider = move || {
            counter.set(counter.get() + 1);
            Connection::open_in_memory().map_err(|e| OrmError::Connection(e.to_string()))
        };
        let mut session = Session::new(provider, AnsiEncoder);

        session.open().unwrap();
        session.open().unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_provider_failure_leaves_session_closed() {
        let mut session = Session::new(
            SqliteProvider::new("/nonexistent/path/database.db"),
            AnsiEncoder,
        );
        match session.open() {
            Err(OrmError::Connection(_)) => {}
            other => panic!("Expected Connection error, got {:?}", other),
        }
        assert!(session.is_closed());
    }

    #[test]
    fn test_begin_opens_and_rejects_repeat() {
        let mut session = memory_session();
        session.begin_transaction().unwrap();
        assert!(session.is_in_transaction());

        match session.begin_transaction() {
            Err(OrmError::Transaction(msg)) => assert!(msg.contains("repeat")),
            other => panic!("Expected Transaction error, got {:?}", other),
        }
        assert!(session.is_in_transaction());
    }

    #[test]
    fn test_commit_and_rollback_without_transaction_are_noops() {
        let mut session = memory_session();
        session.commit().unwrap();
        session.rollback().unwrap();
        assert!(session.is_closed());

        session.open().unwrap();
        session.commit().unwrap();
        session.rollback().unwrap();
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn test_commit_returns_to_open() {
        let mut session = memory_session();
        session
            .begin_transaction_with(IsolationLevel::Serializable)
            .unwrap();
        session.commit().unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.connection().unwrap().is_autocommit());
    }

    #[test]
    fn test_commit_and_rollback_resync_after_driver_ended_transaction() {
        let mut session = memory_session();
        session.begin_transaction().unwrap();
        session.connection().unwrap().execute_batch("ROLLBACK").unwrap();
        assert!(session.is_in_transaction());

        session.commit().unwrap();
        assert_eq!(session.state(), SessionState::Open);

        session.begin_transaction().unwrap();
        session.connection().unwrap().execute_batch("ROLLBACK").unwrap();
        session.rollback().unwrap();
        assert_eq!(session.state(), SessionState::Open);

        session.begin_transaction().unwrap();
        assert!(session.is_in_transaction());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = memory_session();
        session.begin_transaction().unwrap();
        session.close();
        assert!(session.is_closed());
        assert!(session.connection.is_none());
        session.close();
        assert!(session.is_closed());
    }

    #[test]
    fn test_isolation_mapping() {
        assert_eq!(IsolationLevel::None.begin_statement(), "BEGIN DEFERRED");
        assert_eq!(
            IsolationLevel::ReadCommitted.begin_statement(),
            IsolationLevel::None.begin_statement()
        );
        assert!(IsolationLevel::ReadUncommitted.read_uncommitted());
        assert!(!IsolationLevel::None.read_uncommitted());
        assert_eq!(IsolationLevel::RepeatableRead.begin_statement(), "BEGIN IMMEDIATE");
        assert_eq!(IsolationLevel::Serializable.begin_statement(), "BEGIN EXCLUSIVE");
    }

    #[test]
    fn test_read_uncommitted_pragma_applied() {
        let mut session = memory_session();
        session
            .begin_transaction_with(IsolationLevel::ReadUncommitted)
            .unwrap();
        let flag: i64 = session
            .connection()
            .unwrap()
            .query_row("PRAGMA read_uncommitted", [], |row| row.get(0))
            .unwrap();
        assert_eq!(flag, 1);
    }

    #[test]
    fn test_provider_pragmas() {
        let provider = SqliteProvider::in_memory()
            .with_busy_timeout(Duration::from_millis(250))
            .with_pragma("foreign_keys = ON");
        let conn = provider.acquire().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);

        let bad = SqliteProvider::in_memory().with_pragma("not a pragma ((");
        assert!(matches!(bad.acquire(), Err(OrmError::Connection(_))));
    }
}
