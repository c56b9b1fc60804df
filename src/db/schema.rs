//! SQL DDL for initializing the storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - decimals (`cost`, `rate_to_usd`) stored as TEXT to keep exact values
/// - timestamps stored as fixed-width RFC3339 TEXT, so they sort correctly
/// - enumerations stored as their upper-case names
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    base_currency TEXT NOT NULL DEFAULT 'USD'
);

CREATE TABLE IF NOT EXISTS subscriptions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    provider TEXT NULL,
    cost TEXT NOT NULL,
    currency TEXT NOT NULL,
    billing_cycle TEXT NOT NULL DEFAULT 'MONTHLY',
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    start_date TEXT NOT NULL,
    next_bill_date TEXT NOT NULL,
    category TEXT NULL,
    description TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_user_next_bill ON subscriptions(user_id, next_bill_date);

CREATE TABLE IF NOT EXISTS exchange_rates (
    currency_code TEXT PRIMARY KEY,
    rate_to_usd TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    subscription_id TEXT NULL,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL DEFAULT 'INFO',
    message TEXT NOT NULL,
    trigger_date TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_alerts_user ON alerts(user_id, trigger_date);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    subscription_id TEXT NULL,
    action TEXT NOT NULL,
    payload TEXT NULL, -- JSON, serialized as text
    created_at TEXT NOT NULL
)
"#;
