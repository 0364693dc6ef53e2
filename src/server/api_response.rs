//! HTTP mapping for the response envelope.
//!
//! Business outcomes (bad secret, unknown code, already bound) keep HTTP 200
//! and carry their meaning in the envelope `code`, which is what deployed
//! clients read. Malformed requests get 400 and server faults 500.
//!
//! ```json
//! { "code": 3, "message": "activation code is already bound to another machine", "data": null }
//! ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::errors::LicenseError;
use crate::protocol::{ApiResponse, ResponseCode};

/// HTTP status used for each envelope code.
pub fn http_status(code: ResponseCode) -> StatusCode {
    match code {
        ResponseCode::Success
        | ResponseCode::BadSecretKey
        | ResponseCode::UnknownActivationCode
        | ResponseCode::AlreadyBound => StatusCode::OK,
        ResponseCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ResponseCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for LicenseError {
    fn into_response(self) -> Response {
        let code = self.response_code();

        // Internal details stay in the log, the client gets the generic text.
        let message = match &self {
            LicenseError::InvalidRequest(msg) => msg.clone(),
            LicenseError::BadSecretKey
            | LicenseError::UnknownActivationCode
            | LicenseError::AlreadyBound => code.default_message().to_string(),
            other => {
                error!("request failed: {other}");
                code.default_message().to_string()
            }
        };

        let body = ApiResponse::<()>::failure(code, message);
        (http_status(code), Json(body)).into_response()
    }
}

impl From<JsonRejection> for LicenseError {
    fn from(rejection: JsonRejection) -> Self {
        LicenseError::InvalidRequest(rejection.body_text())
    }
}
