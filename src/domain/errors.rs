use thiserror::Error;

/// 在庫操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    /// 在庫が0のため減算できない
    #[error("No stock available")]
    OutOfStock,
    /// 永続化層に負の在庫数が保存されていた
    #[error("Stock must not be negative: {0}")]
    Negative(i32),
}

/// 書籍登録時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookValidationError {
    #[error("Title must not be blank")]
    BlankTitle,
    #[error("Author must not be blank")]
    BlankAuthor,
    #[error("Stock must not exceed {max}: {value}")]
    StockTooLarge { value: u32, max: u32 },
}
