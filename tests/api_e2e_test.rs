use axum::body::Body;
use axum::http::{Request, StatusCode};
use rusty_library_borrow::api::handlers::{AppState, InstanceInfo};
use rusty_library_borrow::api::router::create_router;
use rusty_library_borrow::api::types::*;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

mod common;

use common::{TestContext, book, setup};

// ============================================================================
// E2Eテスト用のヘルパー関数
// ============================================================================

/// インメモリ台帳とチャオス価格サービスでルーターを組み立てる
fn setup_e2e_app(ctx: &TestContext) -> axum::Router {
    let app_state = Arc::new(AppState {
        service_deps: ctx.deps.clone(),
        breakers: ctx.breakers.clone(),
        instance: InstanceInfo::new("test-host", 8081),
    });

    create_router(app_state)
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ============================================================================
// E2Eテスト: 正常系フロー
// ============================================================================

#[tokio::test]
async fn test_e2e_create_and_borrow_flow() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    // Step 1: 書籍登録（POST /api/books）
    let (status, body) = send(
        &app,
        post_json(
            "/api/books",
            &json!({
                "title": "Designing Data-Intensive Applications",
                "author": "Martin Kleppmann",
                "stock": 2
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created: BookResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(created.stock, 2);

    // Step 2: 書籍取得（GET /api/books/:id）
    let (status, body) = send(&app, get(&format!("/api/books/{}", created.id))).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: BookResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched, created);

    // Step 3: 貸出（POST /api/books/:id/borrow）
    let borrow_uri = format!("/api/books/{}/borrow", created.id);
    let (status, body) = send(&app, post_empty(&borrow_uri)).await;
    assert_eq!(status, StatusCode::OK);
    let borrowed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(borrowed["bookId"], json!(created.id));
    assert_eq!(borrowed["title"], json!("Designing Data-Intensive Applications"));
    assert_eq!(borrowed["author"], json!("Martin Kleppmann"));
    assert_eq!(borrowed["remainingStock"], json!(1));
    assert_eq!(borrowed["priceSource"], json!("remote"));
    assert_eq!(borrowed["message"], json!("Book borrowed successfully"));
    assert!(borrowed["price"].as_f64().unwrap() >= 50.0);
    assert!(borrowed["borrowedAt"].is_string());

    // Step 4: 一覧（GET /api/books）
    let (status, body) = send(&app, get("/api/books")).await;
    assert_eq!(status, StatusCode::OK);
    let books: Vec<BookResponse> = serde_json::from_slice(&body).unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].stock, 1);
}

#[tokio::test]
async fn test_e2e_borrow_with_pricing_down_uses_fallback() {
    let ctx = setup(5, 1);
    ctx.pricing_service.set_force_failure(true);
    ctx.repository.insert(book(7, 1)).unwrap();
    let app = setup_e2e_app(&ctx);

    let (status, body) = send(&app, post_empty("/api/books/7/borrow")).await;

    assert_eq!(status, StatusCode::OK);
    let borrowed: BorrowResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(borrowed.remaining_stock, 0);
    assert_eq!(borrowed.price, 0.0);
    assert_eq!(
        borrowed.message,
        "Book borrowed successfully (price unavailable, fallback applied)"
    );
}

// ============================================================================
// E2Eテスト: エラー系
// ============================================================================

#[tokio::test]
async fn test_e2e_borrow_unknown_book_returns_404() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    let (status, body) = send(&app, post_empty("/api/books/999/borrow")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.status, 404);
    assert_eq!(error.error, "Not Found");
    assert_eq!(error.message, "Book not found with id: 999");
}

#[tokio::test]
async fn test_e2e_borrow_out_of_stock_returns_409() {
    let ctx = setup(5, 3);
    ctx.repository.insert(book(3, 0)).unwrap();
    let app = setup_e2e_app(&ctx);

    let (status, body) = send(&app, post_empty("/api/books/3/borrow")).await;

    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.status, 409);
    assert_eq!(error.message, "No stock available for book id: 3");
    assert_eq!(ctx.pricing_service.call_count(), 0);
}

#[tokio::test]
async fn test_e2e_get_unknown_book_returns_404() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    let (status, _) = send(&app, get("/api/books/42")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_e2e_create_book_validation() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    // 空のタイトル
    let (status, body) = send(
        &app,
        post_json("/api/books", &json!({ "title": " ", "author": "A", "stock": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.status, 400);

    // 負の在庫
    let (status, body) = send(
        &app,
        post_json("/api/books", &json!({ "title": "T", "author": "A", "stock": -3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "Bad Request");

    let (_, body) = send(&app, get("/api/books")).await;
    let books: Vec<BookResponse> = serde_json::from_slice(&body).unwrap();
    assert!(books.is_empty());
}

#[tokio::test]
async fn test_e2e_create_book_with_unstorable_stock_returns_400() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    let (status, body) = send(
        &app,
        post_json(
            "/api/books",
            &json!({ "title": "T", "author": "A", "stock": 3_000_000_000u64 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.status, 400);
    assert_eq!(error.message, "Stock must not exceed 2147483647: 3000000000");

    let (_, body) = send(&app, get("/api/books")).await;
    let books: Vec<BookResponse> = serde_json::from_slice(&body).unwrap();
    assert!(books.is_empty());
}

#[tokio::test]
async fn test_e2e_non_numeric_id_returns_json_400() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    for request in [post_empty("/api/books/abc/borrow"), get("/api/books/abc")] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.status, 400);
        assert_eq!(error.error, "Bad Request");
    }
}

#[tokio::test]
async fn test_e2e_persist_failure_returns_generic_500() {
    let ctx = setup(5, 3);
    ctx.repository.insert(book(5, 2)).unwrap();
    ctx.repository.set_fail_on_persist(true);
    let app = setup_e2e_app(&ctx);

    let (status, body) = send(&app, post_empty("/api/books/5/borrow")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.message, "An unexpected error occurred");
}

// ============================================================================
// E2Eテスト: デバッグ用エンドポイント
// ============================================================================

#[tokio::test]
async fn test_e2e_health_and_instance() {
    let ctx = setup(5, 3);
    let app = setup_e2e_app(&ctx);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");

    let (status, body) = send(&app, get("/api/debug/instance")).await;
    assert_eq!(status, StatusCode::OK);
    let instance: InstanceResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(instance.hostname, "test-host");
    assert_eq!(instance.port, 8081);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_circuit_breaker_state() {
    let ctx = setup(1, 1);
    ctx.pricing_service.set_force_failure(true);
    ctx.repository.insert(book(1, 3)).unwrap();
    let app = setup_e2e_app(&ctx);

    let (_, body) = send(&app, get("/api/debug/circuit-breaker")).await;
    let breakers: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(breakers[0]["name"], json!("pricingService"));
    assert_eq!(breakers[0]["state"], json!("CLOSED"));

    let (status, _) = send(&app, post_empty("/api/books/1/borrow")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/debug/circuit-breaker")).await;
    let breakers: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(breakers[0]["state"], json!("OPEN"));
    assert_eq!(breakers[0]["consecutiveFailures"], json!(1));
    assert_eq!(breakers[0]["halfOpenTrialInFlight"], json!(false));
}
