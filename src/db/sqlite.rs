use crate::db::models::{DbAlert, DbExchangeRate, DbSubscription, DbUser, encode_ts};
use crate::db::schema::SQLITE_INIT;
use crate::error::ClarityError;
use crate::types::{
    Alert, AuditEntry, ExchangeRate, NewSubscription, Subscription, User,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

pub type SqlitePool = Pool<Sqlite>;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, name, provider, cost, currency, billing_cycle, \
     status, start_date, next_bill_date, category, description, created_at, updated_at";

#[derive(Clone)]
pub struct ClarityStorage {
    pool: SqlitePool,
}

impl ClarityStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, ClarityError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // An in-memory database lives and dies with its connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), ClarityError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- users ----

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, ClarityError> {
        let row: Option<DbUser> =
            sqlx::query_as("SELECT id, email, base_currency FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    /// Upsert by id; a changed email or base currency overwrites the old one.
    pub async fn upsert_user(&self, user: &User) -> Result<(), ClarityError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, base_currency) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email=excluded.email,
                base_currency=excluded.base_currency
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(user.base_currency.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- subscriptions ----

    pub async fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>, ClarityError> {
        let rows: Vec<DbSubscription> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ? ORDER BY next_bill_date, id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Subscription::try_from(r).map_err(ClarityError::from))
            .collect()
    }

    /// Fetch a subscription only if it belongs to `user_id`.
    pub async fn get_subscription(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<Subscription>, ClarityError> {
        let row: Option<DbSubscription> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subscription::try_from).transpose()?)
    }

    async fn insert_with(
        conn: &mut SqliteConnection,
        sub: &Subscription,
    ) -> Result<(), ClarityError> {
        sqlx::query(&format!(
            "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&sub.id)
        .bind(&sub.user_id)
        .bind(&sub.name)
        .bind(&sub.provider)
        .bind(sub.cost.to_string())
        .bind(sub.currency.as_str())
        .bind(sub.billing_cycle.as_str())
        .bind(sub.status.as_str())
        .bind(encode_ts(sub.start_date))
        .bind(encode_ts(sub.next_bill_date))
        .bind(&sub.category)
        .bind(&sub.description)
        .bind(encode_ts(sub.created_at))
        .bind(encode_ts(sub.updated_at))
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn insert_subscription(
        &self,
        user_id: &str,
        new_sub: NewSubscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription, ClarityError> {
        let sub = new_sub.into_subscription(Uuid::new_v4().to_string(), user_id, now);
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut conn, &sub).await?;
        Ok(sub)
    }

    /// Batch insert using a single transaction: all rows land or none do.
    /// Returns the new ids in input order.
    pub async fn insert_subscriptions(
        &self,
        user_id: &str,
        items: Vec<NewSubscription>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ClarityError> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(items.len());

        for new_sub in items.into_iter() {
            let sub = new_sub.into_subscription(Uuid::new_v4().to_string(), user_id, now);
            Self::insert_with(&mut tx, &sub).await?;
            ids.push(sub.id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Replace every editable field of a subscription owned by `user_id`.
    /// Returns `false` when no such subscription exists.
    pub async fn update_subscription(&self, sub: &Subscription) -> Result<bool, ClarityError> {
        let result = sqlx::query(
            r#"UPDATE subscriptions SET
                name = ?,
                provider = ?,
                cost = ?,
                currency = ?,
                billing_cycle = ?,
                status = ?,
                start_date = ?,
                next_bill_date = ?,
                category = ?,
                description = ?,
                updated_at = ?
              WHERE id = ? AND user_id = ?"#,
        )
        .bind(&sub.name)
        .bind(&sub.provider)
        .bind(sub.cost.to_string())
        .bind(sub.currency.as_str())
        .bind(sub.billing_cycle.as_str())
        .bind(sub.status.as_str())
        .bind(encode_ts(sub.start_date))
        .bind(encode_ts(sub.next_bill_date))
        .bind(&sub.category)
        .bind(&sub.description)
        .bind(encode_ts(sub.updated_at))
        .bind(&sub.id)
        .bind(&sub.user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_subscription(&self, user_id: &str, id: &str) -> Result<bool, ClarityError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---- exchange rates ----

    pub async fn list_exchange_rates(&self) -> Result<Vec<ExchangeRate>, ClarityError> {
        let rows: Vec<DbExchangeRate> = sqlx::query_as(
            "SELECT currency_code, rate_to_usd, last_updated FROM exchange_rates ORDER BY currency_code",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| ExchangeRate::try_from(r).map_err(ClarityError::from))
            .collect()
    }

    /// Batch upsert by currency code in one transaction.
    ///
    /// Non-positive rates never reach the table; they are skipped with a
    /// warning. Returns the number of rows written.
    pub async fn upsert_exchange_rates(&self, rates: &[ExchangeRate]) -> Result<usize, ClarityError> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for rate in rates {
            if rate.rate_to_usd <= Decimal::ZERO {
                warn!(
                    currency = %rate.currency_code,
                    rate = %rate.rate_to_usd,
                    "refusing to store non-positive exchange rate"
                );
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO exchange_rates (currency_code, rate_to_usd, last_updated)
                VALUES (?, ?, ?)
                ON CONFLICT(currency_code) DO UPDATE SET
                    rate_to_usd=excluded.rate_to_usd,
                    last_updated=excluded.last_updated
                "#,
            )
            .bind(&rate.currency_code)
            .bind(rate.rate_to_usd.to_string())
            .bind(encode_ts(rate.last_updated))
            .execute(&mut *tx)
            .await?;
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }

    // ---- alerts ----

    pub async fn list_alerts(&self, user_id: &str) -> Result<Vec<Alert>, ClarityError> {
        let rows: Vec<DbAlert> = sqlx::query_as(
            r#"SELECT id, user_id, subscription_id, alert_type, severity, message,
               trigger_date, is_read
               FROM alerts WHERE user_id = ? ORDER BY trigger_date DESC, id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| Alert::try_from(r).map_err(ClarityError::from))
            .collect()
    }

    pub async fn insert_alert(&self, alert: &Alert) -> Result<(), ClarityError> {
        sqlx::query(
            r#"INSERT OR REPLACE INTO alerts (
                id, user_id, subscription_id, alert_type, severity, message, trigger_date, is_read
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&alert.id)
        .bind(&alert.user_id)
        .bind(&alert.subscription_id)
        .bind(&alert.alert_type)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(encode_ts(alert.trigger_date))
        .bind(if alert.is_read { 1 } else { 0 })
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- audit ----

    pub async fn insert_audit(&self, entry: &AuditEntry) -> Result<i64, ClarityError> {
        let payload = entry.payload.as_ref().map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            r#"INSERT INTO audit_logs (user_id, subscription_id, action, payload, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(&entry.user_id)
        .bind(&entry.subscription_id)
        .bind(entry.action.as_str())
        .bind(payload)
        .bind(encode_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Record an audit entry; failures are logged and never surface to the caller.
    pub async fn log_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.insert_audit(&entry).await {
            warn!(
                user_id = %entry.user_id,
                action = entry.action.as_str(),
                error = %e,
                "audit log write failed"
            );
        }
    }

    pub async fn count_audit(&self, user_id: &str) -> Result<i64, ClarityError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_logs WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }
}
