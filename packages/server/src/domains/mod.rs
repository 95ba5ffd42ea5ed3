pub mod escalation;
pub mod pairing;
pub mod sharing;
