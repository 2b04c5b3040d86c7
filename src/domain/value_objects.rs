use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::StockError;

/// 書籍ID - 在庫台帳のレコード識別子
///
/// 永続化層が採番する。作成後は不変。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(i64);

impl BookId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 在庫数
///
/// 不変条件：在庫数は0以上
/// 符号なし整数で保持し、0からの減算は`StockError::OutOfStock`として拒否する。
/// 在庫が負になる状態は型として作れない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stock(u32);

impl Stock {
    /// 台帳に保存できる在庫数の上限（PostgreSQLの`INTEGER`）
    pub const MAX: u32 = i32::MAX as u32;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// 在庫を1減らす
    ///
    /// # エラー
    /// 在庫が0の場合は`StockError::OutOfStock`を返す（値は変更されない）
    pub fn decrement(self) -> Result<Self, StockError> {
        match self.0.checked_sub(1) {
            Some(remaining) => Ok(Self(remaining)),
            None => Err(StockError::OutOfStock),
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i32> for Stock {
    type Error = StockError;

    /// データベースの整数値から変換する（負の値は不正データ）
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| StockError::Negative(value))
    }
}
