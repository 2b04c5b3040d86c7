use crate::application::book::BookApplicationError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーとリクエストの不備を、HTTPレスポンスにマッピングする。
#[derive(Debug)]
pub enum ApiError {
    Application(BookApplicationError),
    BadRequest(String),
}

impl From<BookApplicationError> for ApiError {
    fn from(err: BookApplicationError) -> Self {
        ApiError::Application(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            // 404 Not Found
            ApiError::Application(BookApplicationError::BookNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Book not found with id: {}", id))
            }

            // 409 Conflict - 在庫切れ
            ApiError::Application(BookApplicationError::OutOfStock(id)) => (
                StatusCode::CONFLICT,
                format!("No stock available for book id: {}", id),
            ),

            // 400 Bad Request
            ApiError::Application(BookApplicationError::InvalidBook(e)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),

            // 500 Internal Server Error
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            ApiError::Application(BookApplicationError::RepositoryError(e)) => {
                tracing::error!("Book repository error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred".to_string(),
                )
            }
        };

        let error = status.canonical_reason().unwrap_or("Error");
        let body = Json(ErrorResponse::new(error, message, status.as_u16()));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookId, BookValidationError};

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(BookApplicationError::BookNotFound(BookId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(BookApplicationError::OutOfStock(BookId::new(1)).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(BookApplicationError::InvalidBook(BookValidationError::BlankTitle).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(BookApplicationError::RepositoryError("db down".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
