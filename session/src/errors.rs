use thiserror::Error;

use crate::auth::AuthError;
use crate::persist::PersistError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no profile found for account {0}")]
    ProfileNotFound(String),

    #[error("auth service error: {0}")]
    Auth(AuthError),

    #[error("document store error: {0}")]
    Store(#[from] docstore::StoreError),

    #[error("could not persist session: {0}")]
    Persist(#[from] PersistError),
}

impl From<AuthError> for SessionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => SessionError::InvalidCredentials,
            other => SessionError::Auth(other),
        }
    }
}
