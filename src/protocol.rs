//! Wire types shared by the server and the client.
//!
//! Every response uses the same envelope:
//!
//! ```json
//! { "code": 0, "message": "success", "data": "..." }
//! ```
//!
//! `code` is `0` on success. Failures carry one of the [`ResponseCode`]
//! values and `data: null`.

use serde::{Deserialize, Serialize};

/// Numeric result codes carried in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success = 0,
    /// Issuance secret did not match
    BadSecretKey = 1,
    /// Activation code does not exist
    UnknownActivationCode = 2,
    /// Activation code is bound to another machine
    AlreadyBound = 3,
    /// Malformed body or invalid field
    InvalidRequest = 4,
    /// Storage failure or other server-side fault
    InternalError = 5,
}

impl ResponseCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(ResponseCode::Success),
            1 => Some(ResponseCode::BadSecretKey),
            2 => Some(ResponseCode::UnknownActivationCode),
            3 => Some(ResponseCode::AlreadyBound),
            4 => Some(ResponseCode::InvalidRequest),
            5 => Some(ResponseCode::InternalError),
            _ => None,
        }
    }

    /// Returns a default human-readable message for this code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ResponseCode::Success => "success",
            ResponseCode::BadSecretKey => "invalid secret key",
            ResponseCode::UnknownActivationCode => "no such activation code",
            ResponseCode::AlreadyBound => "activation code is already bound to another machine",
            ResponseCode::InvalidRequest => "request payload is invalid",
            ResponseCode::InternalError => "internal server error",
        }
    }
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: ResponseCode::Success.as_u16(),
            message: ResponseCode::Success.default_message().to_string(),
            data: Some(data),
        }
    }

    pub fn failure(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u16(),
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success.as_u16()
    }
}

/// Body of `POST /`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivationRequest {
    #[serde(default)]
    pub activation_code: String,
    #[serde(default, alias = "machine_code")]
    pub protected_machine_code: String,
}

/// Body of `POST /code/get`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueCodeRequest {
    #[serde(default)]
    pub secret_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_serializes_null_data() {
        let resp = ApiResponse::<String>::failure(ResponseCode::AlreadyBound, "taken");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["code"], 3);
        assert_eq!(json["message"], "taken");
        assert!(json["data"].is_null());
    }

    #[test]
    fn activation_request_tolerates_missing_fields() {
        let req: ActivationRequest = serde_json::from_str("{}").unwrap();
        assert!(req.activation_code.is_empty());
        assert!(req.protected_machine_code.is_empty());

        let req: ActivationRequest =
            serde_json::from_str(r#"{"activation_code":"A","machine_code":"M"}"#).unwrap();
        assert_eq!(req.protected_machine_code, "M");
    }

    #[test]
    fn unknown_codes_do_not_parse() {
        assert_eq!(ResponseCode::from_u16(2), Some(ResponseCode::UnknownActivationCode));
        assert_eq!(ResponseCode::from_u16(99), None);
    }
}
