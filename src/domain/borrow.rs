use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Book, BookId};

/// 価格の取得元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// 価格サービスから取得した実価格
    Remote,
    /// リトライ枯渇またはサーキットブレーカーによるフォールバック値
    Fallback,
}

/// 貸出結果（リクエスト単位、永続化しない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowResult {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub remaining_stock: u32,
    pub price: f64,
    pub price_source: PriceSource,
    pub message: String,
    pub borrowed_at: DateTime<Utc>,
}

impl BorrowResult {
    /// 減算後のBookと取得した価格から結果を組み立てる
    pub fn new(book: Book, price: f64, price_source: PriceSource) -> Self {
        let message = match price_source {
            PriceSource::Remote => "Book borrowed successfully".to_string(),
            PriceSource::Fallback => {
                "Book borrowed successfully (price unavailable, fallback applied)".to_string()
            }
        };

        Self {
            book_id: book.id,
            title: book.title,
            author: book.author,
            remaining_stock: book.stock.value(),
            price,
            price_source,
            message,
            borrowed_at: Utc::now(),
        }
    }
}
