//! HTTP mapping for [`TonemeterError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use tonemeter_core::error::{ClientCode, TonemeterError};

/// Error returned by handlers; renders as `{"error": CODE, "message": ...}`.
#[derive(Debug)]
pub struct ApiError(pub TonemeterError);

impl From<TonemeterError> for ApiError {
    fn from(e: TonemeterError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.client_code() {
            ClientCode::InvalidInput => StatusCode::BAD_REQUEST,
            ClientCode::InvalidBody => StatusCode::UNPROCESSABLE_ENTITY,
            ClientCode::InvalidConfig | ClientCode::RegistrationConflict | ClientCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}
