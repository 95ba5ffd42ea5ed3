use thiserror::Error;

/// Error taxonomy for the CareLink core.
///
/// Every variant except `Storage` is a client error with a stable message.
/// `Storage` carries internal detail that is logged but never surfaced to the
/// caller. HTTP status mapping lives in `server::error`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Permission denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Profile is already linked to a patient")]
    ProfileAlreadyLinked,

    #[error("This invite has already been used or revoked")]
    InviteNotPending,

    #[error("This invite has expired")]
    InviteExpired,

    #[error("Cannot accept your own invite")]
    PatientIsCaregiver,

    #[error("Sharing requires a Pro subscription")]
    UpgradeRequired,

    #[error("This share link has been revoked")]
    SessionRevoked,

    #[error("This share link has expired")]
    SessionExpired,

    #[error("Share session is already revoked")]
    AlreadyRevoked,

    #[error("Rate limit exceeded. Try again later.")]
    RateLimited,

    #[error("Internal server error")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
