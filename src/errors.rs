use thiserror::Error;

use crate::protocol::ResponseCode;

/// Errors produced by the activation service and its client.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The request was malformed or a field failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No record carries the submitted activation code.
    #[error("no such activation code")]
    UnknownActivationCode,

    /// The activation code is bound to a different machine.
    #[error("activation code is already bound to another machine")]
    AlreadyBound,

    /// The issuance secret did not match.
    #[error("invalid secret key")]
    BadSecretKey,

    /// The pool stayed empty even after a refill.
    #[error("no unused activation code is available")]
    PoolExhausted,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("server error: {0}")]
    ServerError(String),
}

pub type LicenseResult<T> = Result<T, LicenseError>;

impl LicenseError {
    /// The envelope code this error is reported with.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            LicenseError::BadSecretKey => ResponseCode::BadSecretKey,
            LicenseError::UnknownActivationCode => ResponseCode::UnknownActivationCode,
            LicenseError::AlreadyBound => ResponseCode::AlreadyBound,
            LicenseError::InvalidRequest(_) => ResponseCode::InvalidRequest,
            LicenseError::PoolExhausted
            | LicenseError::StorageError(_)
            | LicenseError::ConfigError(_)
            | LicenseError::NetworkError(_)
            | LicenseError::ServerError(_) => ResponseCode::InternalError,
        }
    }

    /// Rebuild an error from a non-success envelope received over the wire.
    pub fn from_response(code: u16, message: impl Into<String>) -> Self {
        match ResponseCode::from_u16(code) {
            Some(ResponseCode::BadSecretKey) => LicenseError::BadSecretKey,
            Some(ResponseCode::UnknownActivationCode) => LicenseError::UnknownActivationCode,
            Some(ResponseCode::AlreadyBound) => LicenseError::AlreadyBound,
            Some(ResponseCode::InvalidRequest) => LicenseError::InvalidRequest(message.into()),
            Some(ResponseCode::Success) | Some(ResponseCode::InternalError) | None => {
                LicenseError::ServerError(format!("code {code}: {}", message.into()))
            }
        }
    }
}

impl From<reqwest::Error> for LicenseError {
    fn from(err: reqwest::Error) -> Self {
        LicenseError::NetworkError(err.to_string())
    }
}
