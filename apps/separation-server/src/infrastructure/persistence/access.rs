//! Access log: who opened which order and when.
//!
//! A row with `left_at IS NULL` is a live session. Opening is idempotent
//! per (order, user); `leave_all` closes every live session of a user in
//! one statement and is what the presence registry calls on disconnect.

use chrono::{DateTime, Duration, Utc};
use turso::{Row, Value};

use super::{
    Store, StoreError, exec, fmt_datetime, opt_datetime, req_datetime, req_i64, text_value,
};

/// One access-log row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRow {
    /// Row handle.
    pub id: i64,
    /// Order opened.
    pub order_id: i64,
    /// Operator who opened it.
    pub user_id: i64,
    /// Session start.
    pub accessed_at: DateTime<Utc>,
    /// Session end; `None` while live.
    pub left_at: Option<DateTime<Utc>>,
}

impl AccessRow {
    /// Session duration in minutes; `None` while the session is live.
    #[must_use]
    pub fn duration_minutes(&self) -> Option<f64> {
        self.left_at
            .map(|left| (left - self.accessed_at).num_seconds() as f64 / 60.0)
    }
}

/// Session-duration statistics over closed sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccessStats {
    /// Closed sessions in the window.
    pub total_accesses: u32,
    /// Summed duration.
    pub total_minutes: f64,
    /// Mean duration.
    pub avg_minutes: f64,
    /// Shortest session.
    pub min_minutes: f64,
    /// Longest session.
    pub max_minutes: f64,
}

const ACCESS_COLUMNS: &str = "id, order_id, user_id, accessed_at, left_at";

fn row_access(row: &Row) -> Result<AccessRow, StoreError> {
    Ok(AccessRow {
        id: req_i64(row, 0, "id")?,
        order_id: req_i64(row, 1, "order_id")?,
        user_id: req_i64(row, 2, "user_id")?,
        accessed_at: req_datetime(row, 3, "accessed_at")?,
        left_at: opt_datetime(row, 4),
    })
}

impl Store {
    async fn query_accesses(
        &self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Vec<AccessRow>, StoreError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let mut accesses = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::Query(e.to_string()))? {
            accesses.push(row_access(&row)?);
        }
        Ok(accesses)
    }

    /// Open an access session. Re-opening an order for a user with a live
    /// session returns that session unchanged.
    pub async fn open_access(
        &self,
        order_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<AccessRow, StoreError> {
        let live = self
            .query_accesses(
                &format!(
                    "SELECT {ACCESS_COLUMNS} FROM order_accesses \
                     WHERE order_id = ? AND user_id = ? AND left_at IS NULL"
                ),
                vec![Value::Integer(order_id), Value::Integer(user_id)],
            )
            .await?;
        if let Some(existing) = live.into_iter().next() {
            return Ok(existing);
        }

        let conn = self.connect()?;
        exec(
            &conn,
            "INSERT INTO order_accesses (order_id, user_id, accessed_at) VALUES (?, ?, ?)",
            vec![
                Value::Integer(order_id),
                Value::Integer(user_id),
                Value::Text(fmt_datetime(now)),
            ],
        )
        .await?;

        self.query_accesses(
            &format!(
                "SELECT {ACCESS_COLUMNS} FROM order_accesses \
                 WHERE order_id = ? AND user_id = ? AND left_at IS NULL"
            ),
            vec![Value::Integer(order_id), Value::Integer(user_id)],
        )
        .await?
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound)
    }

    /// Close the live session for (order, user). Returns whether one existed.
    pub async fn leave_access(
        &self,
        order_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.connect()?;
        let changed = exec(
            &conn,
            "UPDATE order_accesses SET left_at = ? \
             WHERE order_id = ? AND user_id = ? AND left_at IS NULL",
            vec![
                Value::Text(fmt_datetime(now)),
                Value::Integer(order_id),
                Value::Integer(user_id),
            ],
        )
        .await?;
        Ok(changed > 0)
    }

    /// Close every live session of a user. Returns how many were closed.
    pub async fn leave_all_accesses(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let conn = self.connect()?;
        exec(
            &conn,
            "UPDATE order_accesses SET left_at = ? WHERE user_id = ? AND left_at IS NULL",
            vec![Value::Text(fmt_datetime(now)), Value::Integer(user_id)],
        )
        .await
    }

    /// Full access history of an order, newest first.
    pub async fn access_history(&self, order_id: i64) -> Result<Vec<AccessRow>, StoreError> {
        self.query_accesses(
            &format!(
                "SELECT {ACCESS_COLUMNS} FROM order_accesses \
                 WHERE order_id = ? ORDER BY accessed_at DESC"
            ),
            vec![Value::Integer(order_id)],
        )
        .await
    }

    /// Live sessions on an order.
    pub async fn active_accesses_for_order(
        &self,
        order_id: i64,
    ) -> Result<Vec<AccessRow>, StoreError> {
        self.query_accesses(
            &format!(
                "SELECT {ACCESS_COLUMNS} FROM order_accesses \
                 WHERE order_id = ? AND left_at IS NULL"
            ),
            vec![Value::Integer(order_id)],
        )
        .await
    }

    /// Live sessions of a user.
    pub async fn active_accesses_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<AccessRow>, StoreError> {
        self.query_accesses(
            &format!(
                "SELECT {ACCESS_COLUMNS} FROM order_accesses \
                 WHERE user_id = ? AND left_at IS NULL"
            ),
            vec![Value::Integer(user_id)],
        )
        .await
    }

    /// Session-duration statistics over closed sessions within the window,
    /// optionally scoped to one order and/or one user.
    pub async fn separation_stats(
        &self,
        order_id: Option<i64>,
        user_id: Option<i64>,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<AccessStats, StoreError> {
        let since = now - Duration::days(i64::from(days));
        let mut sql = format!(
            "SELECT {ACCESS_COLUMNS} FROM order_accesses \
             WHERE left_at IS NOT NULL AND accessed_at >= ?"
        );
        let mut params = vec![Value::Text(fmt_datetime(since))];
        if let Some(order_id) = order_id {
            sql.push_str(" AND order_id = ?");
            params.push(Value::Integer(order_id));
        }
        if let Some(user_id) = user_id {
            sql.push_str(" AND user_id = ?");
            params.push(Value::Integer(user_id));
        }

        let accesses = self.query_accesses(&sql, params).await?;
        let durations: Vec<f64> = accesses.iter().filter_map(AccessRow::duration_minutes).collect();
        if durations.is_empty() {
            return Ok(AccessStats::default());
        }

        let total: f64 = durations.iter().sum();
        Ok(AccessStats {
            total_accesses: accesses.len() as u32,
            total_minutes: total,
            avg_minutes: total / durations.len() as f64,
            min_minutes: durations.iter().copied().fold(f64::INFINITY, f64::min),
            max_minutes: durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}
