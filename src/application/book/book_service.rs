use crate::application::pricing::PricingGateway;
use crate::domain::{self, Book, BookId, BorrowResult, StockError, commands::CreateBook};
use crate::ports::BookRepository;
use std::sync::Arc;

use super::errors::{BookApplicationError, Result};

/// サービスの依存関係
///
/// 振る舞いは持たず、各ユースケース関数に引数として渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub book_repository: Arc<dyn BookRepository>,
    pub pricing: Arc<PricingGateway>,
}

/// 書籍を登録する
pub async fn create_book(deps: &ServiceDependencies, cmd: CreateBook) -> Result<Book> {
    let cmd = cmd.validate()?;

    let book = deps
        .book_repository
        .create(cmd)
        .await
        .map_err(BookApplicationError::RepositoryError)?;

    tracing::info!(book_id = %book.id, stock = book.stock.value(), "book created");
    Ok(book)
}

/// すべての書籍を取得する
pub async fn list_books(deps: &ServiceDependencies) -> Result<Vec<Book>> {
    deps.book_repository
        .find_all()
        .await
        .map_err(BookApplicationError::RepositoryError)
}

/// IDで書籍を取得する
pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.book_repository
        .find_by_id(book_id)
        .await
        .map_err(BookApplicationError::RepositoryError)?
        .ok_or(BookApplicationError::BookNotFound(book_id))
}

/// 書籍を1冊貸し出す
///
/// 1. 書籍レコードの排他ロックを取得する（存在しなければ`BookNotFound`）
/// 2. 在庫を1減らす（0なら`OutOfStock`。ロックは解放してから返す）
/// 3. 更新をコミットしてロックを解放する
/// 4. ロック解放後に価格を問い合わせる
/// 5. 結果を組み立てる
///
/// 価格の取得は失敗しないため、3が成功した貸出は必ず成功として返る。
/// 外部の価格サービスへの問い合わせ中にロックを保持することはない。
pub async fn borrow_book(deps: &ServiceDependencies, book_id: BookId) -> Result<BorrowResult> {
    tracing::debug!(%book_id, "borrow requested");

    // 1. LOCK
    let locked = deps
        .book_repository
        .lock_for_update(book_id)
        .await
        .map_err(BookApplicationError::RepositoryError)?
        .ok_or(BookApplicationError::BookNotFound(book_id))?;

    // 2. DECREMENT
    let updated = match domain::decrement_stock(locked.book()) {
        Ok(updated) => updated,
        Err(StockError::OutOfStock) => {
            locked
                .release()
                .await
                .map_err(BookApplicationError::RepositoryError)?;
            tracing::warn!(%book_id, "borrow rejected: out of stock");
            return Err(BookApplicationError::OutOfStock(book_id));
        }
        Err(other) => {
            locked
                .release()
                .await
                .map_err(BookApplicationError::RepositoryError)?;
            return Err(BookApplicationError::RepositoryError(other.into()));
        }
    };

    // 3. COMMIT
    let book = locked
        .persist(updated)
        .await
        .map_err(BookApplicationError::RepositoryError)?;

    tracing::info!(%book_id, remaining_stock = book.stock.value(), "stock decremented");

    // 4. PRICE
    let quote = deps.pricing.quote(book_id).await;

    // 5. RESPOND
    Ok(BorrowResult::new(book, quote.price, quote.source))
}
