use crate::domain::BookId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 価格サービスが返す価格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePrice {
    pub price: f64,
    pub currency: String,
}

/// 価格参照ポート
///
/// 外部の価格サービスへの1回の問い合わせを抽象化する。
/// 実装は強制障害やランダム障害を起こしうるため、
/// 呼び出し側はすべての呼び出しを信頼できないものとして扱うこと。
#[async_trait]
pub trait PriceLookup: Send + Sync {
    /// 書籍の価格を1回だけ問い合わせる（リトライしない）
    async fn fetch_price(&self, book_id: BookId) -> Result<RemotePrice>;
}
