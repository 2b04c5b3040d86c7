use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, circuit_breakers, create_book, get_book, instance_info, list_books,
};

/// Creates the API router with the book and borrow endpoints
///
/// - POST /api/books - Register a book
/// - GET /api/books - List books
/// - GET /api/books/:id - Get a book
/// - POST /api/books/:id/borrow - Borrow one copy
/// - GET /api/debug/instance - Which instance answered
/// - GET /api/debug/circuit-breaker - Breaker states
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/api/books", post(create_book).get(list_books))
        .route("/api/books/:id", get(get_book))
        .route("/api/books/:id/borrow", post(borrow_book))
        .route("/api/debug/instance", get(instance_info))
        .route("/api/debug/circuit-breaker", get(circuit_breakers))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
