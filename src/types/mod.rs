pub mod alert;
pub mod currency;
pub mod subscription;

pub use alert::{Alert, AlertSeverity, AuditAction, AuditEntry};
pub use currency::{CurrencyCode, ExchangeRate, PIVOT_CURRENCY, RateMap};
pub use subscription::{BillingCycle, NewSubscription, Subscription, SubscriptionStatus, User};
