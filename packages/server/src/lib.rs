//! CareLink server core.
//!
//! Coordinates medication-adherence tracking for a caregiver/patient household
//! app. The engineered core is three time-bounded lifecycle state machines:
//! caregiver→patient pairing, anonymous scoped share sessions, and the periodic
//! escalation scan for unconfirmed doses. Everything else is request/response
//! glue around the abstract entity store.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::Config;
