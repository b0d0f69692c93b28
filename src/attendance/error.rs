use thiserror::Error;

/// Infrastructure failures, kept strictly apart from scan policy outcomes.
/// A caller receiving one of these may retry; a caller receiving a
/// `ScanOutcome` must not expect a retry to change anything.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Data store unavailable or misbehaving mid-read/write. Transient.
    #[error("data store error: {0}")]
    Database(#[from] sqlx::Error),

    /// The authenticated caller resolved to a member id the registry does
    /// not know. The upstream authenticator is broken, not the user.
    #[error("member {0} not found")]
    MemberNotFound(u64),
}
