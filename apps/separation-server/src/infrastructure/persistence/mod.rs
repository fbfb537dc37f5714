//! Durable state for orders, items, accesses, the purchase queue and users.
//!
//! Uses Turso (Rust rewrite of `SQLite`) with a local database file, or
//! `:memory:` in tests. All batch mutation runs on a single connection
//! inside `BEGIN IMMEDIATE … COMMIT`; a failed batch rolls back and leaves
//! counters untouched.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;
use turso::{Builder, Connection, Database, Error as TursoError, Row, Value};

mod access;
mod orders;
mod purchase;
mod users;

pub use access::{AccessRow, AccessStats};
pub use orders::{BatchOutcome, OrderCounters, TransitionEvent};
pub use purchase::PurchaseQueueEntry;
pub use users::UserRow;

// ============================================================================
// Errors
// ============================================================================

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection error.
    #[error("database connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("query error: {0}")]
    Query(String),

    /// Missing or malformed column value.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A row that must exist does not.
    #[error("not found")]
    NotFound,

    /// Unique `order_number` already taken.
    #[error("order number {0} already exists")]
    DuplicateOrderNumber(String),

    /// A batch referenced an item outside its order.
    #[error("item {0} does not belong to the order")]
    ItemNotInOrder(i64),
}

impl From<TursoError> for StoreError {
    fn from(err: TursoError) -> Self {
        StoreError::Connection(err.to_string())
    }
}

// ============================================================================
// Store
// ============================================================================

/// Handle to the database. Cheap to share behind an `Arc`.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open (or create) the database file and run migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or a migration fails.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let db = Builder::new_local(path).build().await?;
        Self::run_migrations(&db).await?;
        Ok(Self { db })
    }

    /// In-memory database for tests.
    ///
    /// # Errors
    ///
    /// Returns an error when a migration fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::run_migrations(&db).await?;
        Ok(Self { db })
    }

    pub(crate) fn connect(&self) -> Result<Connection, StoreError> {
        Ok(self.db.connect()?)
    }

    async fn run_migrations(db: &Database) -> Result<(), StoreError> {
        let conn = db.connect()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                pin_hash TEXT NOT NULL,
                pin_lookup TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                photo_ref TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_login_at TEXT
            );

            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY,
                order_number TEXT NOT NULL,
                client_name TEXT NOT NULL,
                seller_name TEXT NOT NULL,
                order_date TEXT NOT NULL,
                total_value TEXT NOT NULL,
                logistics_type TEXT,
                package_type TEXT,
                observations TEXT,
                items_count INTEGER NOT NULL DEFAULT 0,
                items_separated INTEGER NOT NULL DEFAULT 0,
                items_in_purchase INTEGER NOT NULL DEFAULT 0,
                items_not_sent INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_order_number
             ON orders(order_number);

            CREATE TABLE IF NOT EXISTS order_items (
                id INTEGER PRIMARY KEY,
                order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                product_code TEXT NOT NULL,
                product_reference TEXT NOT NULL,
                product_name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price TEXT NOT NULL,
                total_price TEXT NOT NULL,
                is_separated INTEGER NOT NULL DEFAULT 0,
                separated_at TEXT,
                separated_by INTEGER REFERENCES users(id),
                sent_to_purchase INTEGER NOT NULL DEFAULT 0,
                sent_to_purchase_at TEXT,
                sent_to_purchase_by INTEGER REFERENCES users(id),
                not_sent INTEGER NOT NULL DEFAULT 0,
                not_sent_at TEXT,
                not_sent_by INTEGER REFERENCES users(id),
                not_sent_reason TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_order_items_order
             ON order_items(order_id);

            CREATE TABLE IF NOT EXISTS purchase_items (
                id INTEGER PRIMARY KEY,
                order_item_id INTEGER NOT NULL UNIQUE
                    REFERENCES order_items(id) ON DELETE CASCADE,
                requested_at TEXT NOT NULL,
                requested_by INTEGER REFERENCES users(id),
                is_completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                completed_by INTEGER REFERENCES users(id),
                notes TEXT,
                completion_notes TEXT
            );

            CREATE TABLE IF NOT EXISTS order_accesses (
                id INTEGER PRIMARY KEY,
                order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id),
                accessed_at TEXT NOT NULL,
                left_at TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_order_accesses_live
             ON order_accesses(order_id, user_id, left_at);",
        )
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        info!("store migrations complete");
        Ok(())
    }
}

// ============================================================================
// Row helpers
// ============================================================================

pub(crate) fn req_i64(row: &Row, idx: usize, name: &str) -> Result<i64, StoreError> {
    row.get::<i64>(idx)
        .map_err(|e| StoreError::MissingField(format!("{name}: {e}")))
}

pub(crate) fn req_u32(row: &Row, idx: usize, name: &str) -> Result<u32, StoreError> {
    let v = req_i64(row, idx, name)?;
    u32::try_from(v).map_err(|_| StoreError::MissingField(format!("{name}: negative count {v}")))
}

pub(crate) fn req_text(row: &Row, idx: usize, name: &str) -> Result<String, StoreError> {
    row.get::<String>(idx)
        .map_err(|e| StoreError::MissingField(format!("{name}: {e}")))
}

pub(crate) fn opt_text(row: &Row, idx: usize) -> Option<String> {
    row.get::<String>(idx).ok()
}

pub(crate) fn opt_i64(row: &Row, idx: usize) -> Option<i64> {
    row.get::<i64>(idx).ok()
}

pub(crate) fn req_bool(row: &Row, idx: usize, name: &str) -> Result<bool, StoreError> {
    Ok(req_i64(row, idx, name)? != 0)
}

pub(crate) fn req_decimal(row: &Row, idx: usize, name: &str) -> Result<Decimal, StoreError> {
    req_text(row, idx, name)?
        .parse::<Decimal>()
        .map_err(|e| StoreError::MissingField(format!("{name}: {e}")))
}

pub(crate) fn req_datetime(row: &Row, idx: usize, name: &str) -> Result<DateTime<Utc>, StoreError> {
    parse_datetime(&req_text(row, idx, name)?)
        .ok_or_else(|| StoreError::MissingField(format!("{name}: invalid timestamp")))
}

pub(crate) fn opt_datetime(row: &Row, idx: usize) -> Option<DateTime<Utc>> {
    opt_text(row, idx).as_deref().and_then(parse_datetime)
}

pub(crate) fn req_date(row: &Row, idx: usize, name: &str) -> Result<NaiveDate, StoreError> {
    req_text(row, idx, name)?
        .parse::<NaiveDate>()
        .map_err(|e| StoreError::MissingField(format!("{name}: {e}")))
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn fmt_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub(crate) fn text_value(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn opt_text_value(s: Option<&str>) -> Value {
    s.map_or(Value::Null, text_value)
}

pub(crate) fn opt_datetime_value(dt: Option<DateTime<Utc>>) -> Value {
    dt.map_or(Value::Null, |dt| Value::Text(fmt_datetime(dt)))
}

pub(crate) fn opt_i64_value(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::Integer)
}

pub(crate) fn bool_value(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

pub(crate) async fn exec(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<u64, StoreError> {
    conn.execute(sql, params)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = Store::in_memory().await.unwrap();
        // A second run against the same database must not fail.
        Store::run_migrations(&store.db).await.unwrap();
    }

    #[test]
    fn datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&fmt_datetime(now)).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn invalid_datetime_is_none() {
        assert!(parse_datetime("ontem").is_none());
    }
}
