use crate::application::book::{
    ServiceDependencies, borrow_book as execute_borrow_book, create_book as execute_create_book,
    get_book as execute_get_book, list_books as execute_list_books,
};
use crate::application::pricing::{CircuitBreakerRegistry, CircuitBreakerSnapshot};
use crate::domain::BookId;
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{BookResponse, BorrowResponse, CreateBookRequest, InstanceResponse},
};

// ============================================================================
// State
// ============================================================================

/// このプロセスを識別する情報（複数インスタンス構成の確認用）
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub instance_id: Uuid,
    pub hostname: String,
    pub port: u16,
}

impl InstanceInfo {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            hostname: hostname.into(),
            port,
        }
    }
}

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub instance: InstanceInfo,
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// POST /api/books - 書籍を登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let Json(req) = payload?;

    let book = execute_create_book(&state.service_deps, req.to_command()).await?;

    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// POST /api/books/:id/borrow - 書籍を1冊貸し出す
///
/// 在庫を1減らしてコミットした後に価格を取得する。
/// 価格サービスが使えない場合もフォールバック価格で200を返す。
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<BorrowResponse>, ApiError> {
    let Path(book_id) = path?;
    let result = execute_borrow_book(&state.service_deps, BookId::new(book_id)).await?;

    Ok(Json(BorrowResponse::from(result)))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /api/books - 書籍一覧を取得
pub async fn list_books(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = execute_list_books(&state.service_deps).await?;

    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /api/books/:id - 書籍をIDで取得
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookResponse>, ApiError> {
    let Path(book_id) = path?;
    let book = execute_get_book(&state.service_deps, BookId::new(book_id)).await?;

    Ok(Json(BookResponse::from(book)))
}

// ============================================================================
// Debug handlers
// ============================================================================

/// GET /api/debug/instance - リクエストを処理したインスタンスの情報
pub async fn instance_info(State(state): State<Arc<AppState>>) -> Json<InstanceResponse> {
    Json(InstanceResponse {
        instance_id: state.instance.instance_id,
        hostname: state.instance.hostname.clone(),
        port: state.instance.port,
    })
}

/// GET /api/debug/circuit-breaker - 登録済みサーキットブレーカーの状態
pub async fn circuit_breakers(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<CircuitBreakerSnapshot>> {
    Json(state.breakers.snapshots())
}
