pub mod fx_api;

pub use fx_api::FxApi;
