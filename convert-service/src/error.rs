use crate::models::FormatError;
use axum::extract::multipart::MultipartError;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use service_core::error::AppError;
use thiserror::Error;

pub const NO_FILE_MESSAGE: &str = "No file uploaded.";
pub const CONVERSION_FAILED_MESSAGE: &str = "Error during file conversion.";
pub const BUSY_MESSAGE: &str = "Conversion service is busy.";

/// Everything that can end a `/convert` request early.
///
/// Callers only ever see a fixed plain-text message per kind; the cause is
/// logged here and never sent back.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("no file part in request")]
    NoFile,

    #[error("failed to read upload: {0}")]
    Upload(#[from] MultipartError),

    #[error("no conversion slot became free, retry in {retry_after_secs}s")]
    Busy { retry_after_secs: u64 },

    #[error("conversion failed: {0:#}")]
    Conversion(#[from] anyhow::Error),
}

impl From<FormatError> for ConvertError {
    fn from(err: FormatError) -> Self {
        ConvertError::Conversion(anyhow::Error::new(err))
    }
}

impl From<AppError> for ConvertError {
    fn from(err: AppError) -> Self {
        ConvertError::Conversion(anyhow::Error::new(err))
    }
}

impl ConvertError {
    pub fn status(&self) -> StatusCode {
        match self {
            ConvertError::NoFile => StatusCode::BAD_REQUEST,
            ConvertError::Upload(err) => err.status(),
            ConvertError::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ConvertError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        let status = self.status();
        let plain = [(header::CONTENT_TYPE, "text/plain; charset=utf-8")];

        match self {
            ConvertError::NoFile => (status, plain, NO_FILE_MESSAGE).into_response(),
            ConvertError::Upload(err) => {
                tracing::warn!(error = %err, "Upload rejected");
                (status, plain, err.body_text()).into_response()
            }
            ConvertError::Busy { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Conversion slots exhausted");
                let mut res = (status, plain, BUSY_MESSAGE).into_response();
                res.headers_mut()
                    .insert(header::RETRY_AFTER, retry_after_secs.into());
                res
            }
            ConvertError::Conversion(err) => {
                tracing::error!(error = ?err, "Conversion Error");
                (status, plain, CONVERSION_FAILED_MESSAGE).into_response()
            }
        }
    }
}
