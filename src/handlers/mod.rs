pub mod exchange_rates;
pub mod import;
pub mod subscriptions;
