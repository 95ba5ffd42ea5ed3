pub mod auth;
pub mod errors;
pub mod phone;
pub mod rate_limit;

pub use errors::CoreError;
