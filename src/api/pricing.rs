use crate::adapters::mock::ChaosPricingService;
use crate::domain::BookId;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::types::{ErrorResponse, PriceQuery, PriceResponse};

/// Creates the router of the standalone chaos pricing service
///
/// - GET /api/prices/:id?fail=true|false - Price of a book
pub fn create_pricing_router(service: Arc<ChaosPricingService>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/prices/:id", get(get_price))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// GET /api/prices/:id
///
/// `fail=true` always fails; otherwise the service's random failure rate applies.
async fn get_price(
    State(service): State<Arc<ChaosPricingService>>,
    Path(book_id): Path<i64>,
    Query(query): Query<PriceQuery>,
) -> Response {
    let book_id = BookId::new(book_id);

    match service.quote(book_id, query.fail) {
        Ok(remote) => {
            tracing::info!(%book_id, price = remote.price, "price served");
            Json(PriceResponse {
                book_id: book_id.value(),
                price: remote.price,
                currency: remote.currency,
            })
            .into_response()
        }
        Err(error) => {
            tracing::warn!(%book_id, %error, "pricing failure injected");
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let body = ErrorResponse::new(
                "Pricing Service Error",
                error.to_string(),
                status.as_u16(),
            );
            (status, Json(body)).into_response()
        }
    }
}
