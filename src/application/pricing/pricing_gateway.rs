use crate::domain::{BookId, PriceSource};
use crate::ports::{PriceLookup, RemotePrice, price_lookup};
use std::sync::Arc;

use super::circuit_breaker::CircuitBreaker;
use super::retry::RetryPolicy;

/// 価格サービスの論理名（ブレーカー登録簿のキー）
pub const PRICING_SERVICE: &str = "pricingService";

/// 価格サービスが利用できないときの既定価格
pub const DEFAULT_FALLBACK_PRICE: f64 = 0.0;

/// 価格の取得結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub source: PriceSource,
}

/// 価格ゲートウェイ
///
/// 不安定な外部価格サービスを、リトライとサーキットブレーカーで包む。
/// 呼び出し側にエラーを返すことはなく、実価格かフォールバック価格のどちらかを返す。
///
/// ブレーカーへの報告は論理呼び出し1回につき1回だけ行う。
/// リトライ中の個々の失敗はブレーカーの失敗カウントに含めない。
pub struct PricingGateway {
    lookup: Arc<dyn PriceLookup>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    fallback_price: f64,
}

impl PricingGateway {
    pub fn new(
        lookup: Arc<dyn PriceLookup>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        fallback_price: f64,
    ) -> Self {
        Self {
            lookup,
            breaker,
            retry,
            fallback_price,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// 書籍の価格を取得する（失敗しない）
    pub async fn get_price(&self, book_id: BookId) -> f64 {
        self.quote(book_id).await.price
    }

    /// 書籍の価格と、その取得元を返す
    ///
    /// 1. ブレーカーが呼び出しを拒否した場合（OPEN、またはHALF_OPENの試行中）は
    ///    外部サービスに接続せずフォールバック価格を返す
    /// 2. 許可された場合は最大N回まで試行し、最初の成功で止める
    /// 3. 結果を成功または失敗としてブレーカーに1回だけ報告する
    pub async fn quote(&self, book_id: BookId) -> PriceQuote {
        let Some(admission) = self.breaker.try_acquire() else {
            tracing::warn!(
                %book_id,
                breaker = self.breaker.name(),
                "circuit breaker rejected price lookup, using fallback price"
            );
            return self.fallback();
        };

        let lookup: &dyn PriceLookup = self.lookup.as_ref();
        let outcome = self
            .retry
            .run(move |attempt| fetch_valid_price(lookup, book_id, attempt))
            .await;

        match outcome {
            Ok(remote) => {
                admission.record_success();
                tracing::info!(
                    %book_id,
                    price = remote.price,
                    currency = %remote.currency,
                    "received price"
                );
                PriceQuote {
                    price: remote.price,
                    source: PriceSource::Remote,
                }
            }
            Err(error) => {
                admission.record_failure();
                tracing::warn!(
                    %book_id,
                    error = %error,
                    reason = %error.last,
                    "price lookup failed, using fallback price"
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> PriceQuote {
        PriceQuote {
            price: self.fallback_price,
            source: PriceSource::Fallback,
        }
    }
}

/// 1回分の問い合わせ。有限かつ0以上でない価格は不正な応答として失敗扱いにする。
async fn fetch_valid_price(
    lookup: &dyn PriceLookup,
    book_id: BookId,
    attempt: u32,
) -> price_lookup::Result<RemotePrice> {
    tracing::debug!(%book_id, attempt, "requesting price");

    let remote = lookup.fetch_price(book_id).await?;
    if !remote.price.is_finite() || remote.price < 0.0 {
        return Err(format!("invalid price from pricing service: {}", remote.price).into());
    }
    Ok(remote)
}
