use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    UnprocessableEntity(String),
    #[error("{0}")]
    EntityNotFound(String),
    // 予約エンジンのドメインエラー。
    // スロットが無効、または日付が曜日に一致しない
    #[error("{0}")]
    SlotUnavailable(String),
    // 同一 (user, slot, date) の予約がすでに存在する
    #[error("{0}")]
    AlreadyBooked(String),
    // 定員に達している
    #[error("{0}")]
    SlotFull(String),
    // コミット時に競合が検出され、リトライ後も解消しなかった
    #[error("{0}")]
    StorageConflict(String),
    #[error("{0}")]
    ValidationError(#[from] garde::Report),
    #[error("transaction error: {0}")]
    TransactionError(#[source] sqlx::Error),
    #[error("database error: {0}")]
    SpecificOperationError(#[source] sqlx::Error),
    #[error("{0}")]
    NoRowsAffectedError(String),
    #[error("{0}")]
    KeyValueStoreError(#[from] redis::RedisError),
    #[error("{0}")]
    BcryptError(#[from] bcrypt::BcryptError),
    #[error("{0}")]
    ConvertToUuidError(#[from] uuid::Error),
    #[error("{0}")]
    ConversionEntityError(String),
    #[error("ログインが必要です")]
    UnauthenticatedError,
    #[error("認可に失敗しました")]
    UnauthorizedError,
    #[error("許可されていない操作です")]
    ForbiddenOperation,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self {
            AppError::UnprocessableEntity(_) | AppError::SlotUnavailable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyBooked(_) | AppError::SlotFull(_) => StatusCode::CONFLICT,
            AppError::StorageConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ValidationError(_)
            | AppError::ConvertToUuidError(_)
            | AppError::ConversionEntityError(_) => StatusCode::BAD_REQUEST,
            AppError::UnauthenticatedError => StatusCode::UNAUTHORIZED,
            AppError::UnauthorizedError | AppError::ForbiddenOperation => StatusCode::FORBIDDEN,
            e @ (AppError::TransactionError(_)
            | AppError::SpecificOperationError(_)
            | AppError::NoRowsAffectedError(_)
            | AppError::KeyValueStoreError(_)
            | AppError::BcryptError(_)) => {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Unexpected error happened"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        status_code.into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
