//! JSON body extractor reporting malformed bodies in the API error format.

use axum::extract::{rejection::JsonRejection, FromRequest};

use crate::error::AppError;

/// `axum::Json` whose rejection is a 400 `VALIDATION_ERROR` body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
