//! Standalone chaos pricing service.
//!
//! Configured by [`PricingServiceConfig`]; a `PRICING_FAILURE_RATE` outside
//! `0..=1` stops startup.

use rusty_library_borrow::{
    adapters::mock::ChaosPricingService, api::pricing::create_pricing_router,
    config::PricingServiceConfig,
};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_library_borrow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PricingServiceConfig::from_env().expect("Invalid configuration");
    let failure_rate = config.failure_rate;

    let service = ChaosPricingService::new()
        .with_failure_rate(failure_rate)
        .expect("Invalid failure rate");
    let app = create_pricing_router(Arc::new(service));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!(%addr, failure_rate, "pricing service listening");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
