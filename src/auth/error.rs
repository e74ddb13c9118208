use thiserror::Error;

use crate::users::directory::DirectoryError;

/// Failures of token issuance, validation and subject resolution.
///
/// The three validation failures stay distinct here; they are collapsed
/// into a single "unauthorized" only by the HTTP extractor.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("subject is inactive or unknown")]
    InvalidSubject,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token ttl out of range: {0}s")]
    InvalidTtl(i64),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("directory lookup cancelled")]
    Cancelled,

    #[error("directory lookup timed out")]
    DirectoryTimeout,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl From<jsonwebtoken::errors::Error> for CredentialError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName => CredentialError::SignatureInvalid,
            ErrorKind::ExpiredSignature => CredentialError::Expired,
            _ => CredentialError::Malformed,
        }
    }
}
