// HTTP routes
pub mod escalation;
pub mod health;
pub mod pairing;
pub mod sharing;

pub use escalation::*;
pub use health::*;
pub use pairing::*;
pub use sharing::*;
