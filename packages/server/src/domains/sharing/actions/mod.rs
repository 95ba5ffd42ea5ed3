mod create_session;
mod redeem_session;
mod revoke_session;

pub use create_session::{create_session, CreateSessionRequest, CreateSessionResponse};
pub use redeem_session::redeem_session;
pub use revoke_session::revoke_session;
