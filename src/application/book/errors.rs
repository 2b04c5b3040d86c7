use crate::domain::{BookId, BookValidationError};
use thiserror::Error;

/// 書籍・貸出アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum BookApplicationError {
    /// 書籍が存在しない
    #[error("Book not found with id: {0}")]
    BookNotFound(BookId),

    /// 在庫が0のため貸出不可
    #[error("No stock available for book id: {0}")]
    OutOfStock(BookId),

    /// 登録内容が不正
    #[error("Invalid book: {0}")]
    InvalidBook(#[from] BookValidationError),

    /// 在庫台帳（ロック取得・永続化）のエラー
    #[error("Book repository error")]
    RepositoryError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, BookApplicationError>;
