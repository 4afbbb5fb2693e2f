use thiserror::Error;

/// Failures a service reports to its caller. Anything that is not a
/// business rule ends up in `Internal`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("email is already registered")]
    EmailAlreadyRegistered,

    #[error("user not found")]
    UserNotFound,

    /// A valid session whose user no longer exists.
    #[error("account no longer exists")]
    AccountGone,

    #[error("invalid password")]
    InvalidPassword,

    #[error("cinema not found")]
    CinemaNotFound,

    #[error("movie not found")]
    MovieNotFound,

    #[error("movie belongs to another user")]
    MovieNotOwned,

    #[error("indicative rating not found")]
    IndicativeRatingNotFound,

    #[error("no indicative ratings available")]
    IndicativeRatingsNotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
