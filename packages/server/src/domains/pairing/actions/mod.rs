mod accept_invite;
mod create_invite;

pub use accept_invite::{accept_invite, AcceptInviteRequest, AcceptInviteResponse, ConsentGrants};
pub use create_invite::{create_invite, CreateInviteRequest, CreateInviteResponse};
