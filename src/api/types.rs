use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Book, BorrowResult, PriceSource, Stock, commands::CreateBook};

// ============================================================================
// Request DTOs
// ============================================================================

/// 書籍登録リクエスト
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    /// 負の値はデシリアライズの時点で拒否される
    pub stock: u32,
}

impl CreateBookRequest {
    pub fn to_command(&self) -> CreateBook {
        CreateBook {
            title: self.title.clone(),
            author: self.author.clone(),
            initial_stock: Stock::new(self.stock),
        }
    }
}

/// 価格サービスへのリクエストのクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    #[serde(default)]
    pub fail: bool,
}

// ============================================================================
// Response DTOs
// ============================================================================

/// 書籍レスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub stock: u32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id.value(),
            title: book.title,
            author: book.author,
            stock: book.stock.value(),
        }
    }
}

/// 貸出レスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowResponse {
    pub book_id: i64,
    pub title: String,
    pub author: String,
    pub remaining_stock: u32,
    pub price: f64,
    pub price_source: PriceSource,
    pub message: String,
    pub borrowed_at: DateTime<Utc>,
}

impl From<BorrowResult> for BorrowResponse {
    fn from(result: BorrowResult) -> Self {
        Self {
            book_id: result.book_id.value(),
            title: result.title,
            author: result.author,
            remaining_stock: result.remaining_stock,
            price: result.price,
            price_source: result.price_source,
            message: result.message,
            borrowed_at: result.borrowed_at,
        }
    }
}

/// 価格サービスのレスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub book_id: i64,
    pub price: f64,
    pub currency: String,
}

/// インスタンス情報レスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResponse {
    pub instance_id: Uuid,
    pub hostname: String,
    pub port: u16,
}

/// エラーレスポンス
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status,
            timestamp: Utc::now(),
        }
    }
}
