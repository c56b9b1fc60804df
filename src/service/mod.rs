pub mod importer;
pub mod normalizer;
pub mod rate_limit;
pub mod rates;
pub mod summary;
