use serde::{Deserialize, Serialize};

use super::{BookId, Stock, StockError};

/// Book集約 - 在庫台帳の1レコード
///
/// id, title, author は登録後不変。
/// stock は貸出の減算経路（`decrement_stock`）でのみ変更される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub stock: Stock,
}

/// 純粋関数：在庫を1冊減らす
///
/// ビジネスルール：
/// - 在庫が1以上なら1減らした新しいBookを返す
/// - 在庫が0なら`StockError::OutOfStock`を返し、元のレコードは変更しない
///
/// 呼び出し側は行ロックを保持した状態でこの関数を呼ぶこと。
/// 在庫確認と減算はこの関数内で1つの操作として行われる。
pub fn decrement_stock(book: &Book) -> Result<Book, StockError> {
    let stock = book.stock.decrement()?;

    Ok(Book {
        stock,
        ..book.clone()
    })
}
