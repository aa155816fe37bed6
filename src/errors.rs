//! Error types surfaced by the prediction endpoint.
//!
//! Every failure of `/predict` is a [`PredictError`]; actix turns it into a
//! `{"error": "..."}` body through the [`ResponseError`] impl. The `Display`
//! text is what the client sees, so it never includes the underlying cause.
//! Causes stay reachable through `source()` for logging.

use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PredictError {
    /// The form carried no `image` field.
    #[error("Файл не получен")]
    MissingFile,

    /// The multipart body could not be read or exceeded the size limit.
    #[error("Некорректная загрузка: {0}")]
    Upload(String),

    /// The uploaded bytes are not a decodable image.
    #[error("Не удалось прочитать изображение")]
    ImageDecode(#[source] image::ImageError),

    /// A tensor handed to the classifier does not have the model's input shape.
    #[error("Неверная размерность тензора: ожидалось {expected:?}, получено {actual:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: Vec<usize>,
    },

    /// The classifier failed or produced an unusable score vector.
    #[error("Ошибка классификации")]
    Inference(#[source] BoxError),

    #[error("Классификация не завершилась за {0:?}")]
    Timeout(Duration),
}

impl PredictError {
    pub fn inference<E: Into<BoxError>>(cause: E) -> Self {
        PredictError::Inference(cause.into())
    }
}

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MissingFile | PredictError::Upload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Renders an error followed by its chain of causes, for log lines.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
