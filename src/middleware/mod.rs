pub mod api_key;
pub mod caller;

pub use api_key::{client_key, ensure_api_key};
pub use caller::CallerId;
