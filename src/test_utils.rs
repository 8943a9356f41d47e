/// # Test Utilities Module
///
/// Shared fixtures for unit tests:
/// - Fixture models (`Account` embedding `Audit`)
/// - Matching table DDL
/// - Closed and schema-ready in-memory sessions
/// - Tracing output routed through the test harness
use crate::core::db::{Session, SqliteProvider};
use crate::dialect::AnsiEncoder;
use crate::model::{Model, ModelSchema};
use std::sync::Once;

/// Base model embedded in [`Account`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Audit {
    pub created_by: String,
    pub revision: i32,
}

impl Model for Audit {
    fn schema() -> ModelSchema<Self> {
        ModelSchema::new("Audit", Audit::default)
            .field("created_by", |a| &a.created_by, |a| &mut a.created_by)
            .field("revision", |a| &a.revision, |a| &mut a.revision)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub balance: f64,
    pub active: bool,
    pub nickname: Option<String>,
    pub audit: Audit,
}

impl Model for Account {
    fn schema() -> ModelSchema<Self> {
        ModelSchema::new("Account", Account::default)
            .field("id", |a| &a.id, |a| &mut a.id)
            .field("name", |a| &a.name, |a| &mut a.name)
            .field("balance", |a| &a.balance, |a| &mut a.balance)
            .field("active", |a| &a.active, |a| &mut a.active)
            .field("nickname", |a| &a.nickname, |a| &mut a.nickname)
            .extend(|a| &a.audit, |a| &mut a.audit)
    }
}

pub const ACCOUNT_DDL: &str = "CREATE TABLE \"Account\" (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        balance REAL,
        active INTEGER NOT NULL DEFAULT 1,
        nickname TEXT,
        created_by TEXT,
        revision INTEGER
    )";

/// Routes `tracing` output through the test harness. Safe to call from
/// every test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A closed session over a fresh in-memory database.
pub fn memory_session() -> Session {
    init_tracing();
    Session::new(SqliteProvider::in_memory(), AnsiEncoder)
}

/// An open session with the `Account` table created.
pub fn account_session() -> Session {
    let mut session = memory_session();
    session
        .open()
        .and_then(|_| session.execute(ACCOUNT_DDL, crate::Params::none()))
        .expect("Failed to create Account table");
    session
}
