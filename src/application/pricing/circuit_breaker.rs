//! サーキットブレーカー
//!
//! ```text
//! CLOSED    --(連続失敗 >= failure_threshold)--> OPEN
//! OPEN      --(cool_down 経過後の最初の呼び出し)--> HALF_OPEN（試行1件のみ）
//! HALF_OPEN --(試行成功)--> CLOSED
//! HALF_OPEN --(試行失敗)--> OPEN（opened_at をリセット）
//! ```
//!
//! 状態は1つのMutexで保護し、遷移は常にロック内で完結させる。
//! ロックを保持したまま`.await`することはない。

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// ブレーカーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// ブレーカーの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// OPENに遷移する連続失敗回数（F）
    pub failure_threshold: u32,
    /// OPENからHALF_OPENの試行を許可するまでの待機時間（D）
    pub cool_down: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(10),
        }
    }
}

/// 共有される可変状態
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_trial_in_flight: bool,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_trial_in_flight: false,
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.half_open_trial_in_flight = false;
    }
}

/// ブレーカーの観測用スナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub half_open_trial_in_flight: bool,
}

/// サーキットブレーカー
///
/// プロセス内のすべての貸出リクエストで共有される。
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.lock();
        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            half_open_trial_in_flight: inner.half_open_trial_in_flight,
        }
    }

    /// 呼び出しの許可を求める
    ///
    /// - CLOSED: 許可
    /// - OPEN: cool_down経過前は拒否。経過後は最初の1件だけHALF_OPENの試行として許可
    /// - HALF_OPEN: 試行中なら拒否
    ///
    /// 拒否された場合は`None`。許可された場合は結果を報告するための`Admission`を返す。
    pub fn try_acquire(&self) -> Option<Admission<'_>> {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Some(Admission::new(self, false)),
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .is_none_or(|opened_at| opened_at.elapsed() >= self.config.cool_down);
                if !cooled_down {
                    return None;
                }

                inner.state = CircuitState::HalfOpen;
                inner.half_open_trial_in_flight = true;
                tracing::info!(breaker = %self.name, "circuit breaker half-open, sending probe");
                Some(Admission::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.half_open_trial_in_flight {
                    return None;
                }
                inner.half_open_trial_in_flight = true;
                Some(Admission::new(self, true))
            }
        }
    }

    fn on_success(&self, probe: bool) {
        let mut inner = self.lock();

        match (inner.state, probe) {
            (CircuitState::HalfOpen, true) => {
                *inner = BreakerState::closed();
                tracing::info!(
                    breaker = %self.name,
                    "circuit breaker closed after successful probe"
                );
            }
            (CircuitState::Closed, false) => {
                inner.consecutive_failures = 0;
            }
            // OPENに遷移した後に届いた古い結果は状態を変えない
            _ => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        match (inner.state, probe) {
            (CircuitState::HalfOpen, true) => {
                inner.open(now);
                tracing::warn!(breaker = %self.name, "probe failed, circuit breaker re-opened");
            }
            (CircuitState::Closed, false) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.open(now);
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            _ => {}
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // 遷移はパニックしない操作のみなので、ポイズン後も状態は一貫している
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 許可された1回の論理呼び出し
///
/// `record_success`か`record_failure`で結果を1回だけ報告する。
/// HALF_OPENの試行が結果を報告せずにdropされた場合は失敗として扱い、
/// 試行枠が占有されたままになることを防ぐ。
#[derive(Debug)]
#[must_use = "report the outcome with record_success or record_failure"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    /// HALF_OPENの試行かどうか
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.on_failure(true);
        }
    }
}

/// 論理名をキーにしたプロセス全体のブレーカー登録簿
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 名前に対応するブレーカーを返す（なければ`config`で作成）
    ///
    /// 既に登録済みの場合、`config`は無視される。
    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config))),
        )
    }

    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let breakers = self
            .breakers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
