use rusty_library_borrow::{
    adapters::{
        http::HttpPricingClient, memory::InMemoryBookRepository, postgres::PostgresBookRepository,
    },
    api::{
        handlers::{AppState, InstanceInfo},
        router::create_router,
    },
    application::{
        book::ServiceDependencies,
        pricing::{CircuitBreakerRegistry, PRICING_SERVICE, PricingGateway},
    },
    config::Config,
    ports::BookRepository,
};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_library_borrow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    // Stock ledger: Postgres when configured, in-memory otherwise
    let book_repository: Arc<dyn BookRepository> = match &config.database_url {
        Some(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await
                .expect("Failed to connect to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("using postgres stock ledger");
            Arc::new(PostgresBookRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stock ledger");
            Arc::new(InMemoryBookRepository::new())
        }
    };

    // Pricing: HTTP client wrapped by retry, circuit breaker and fallback
    let pricing = &config.pricing;
    let lookup = HttpPricingClient::new(&pricing.base_url, pricing.timeout, pricing.force_failure)
        .expect("Failed to build pricing client");
    let breakers = Arc::new(CircuitBreakerRegistry::new());
    let breaker = breakers.get_or_create(PRICING_SERVICE, pricing.circuit_breaker());
    let gateway = PricingGateway::new(
        Arc::new(lookup),
        breaker,
        pricing.retry_policy(),
        pricing.fallback_price,
    );

    tracing::info!(
        pricing_url = %pricing.base_url,
        force_failure = pricing.force_failure,
        failure_threshold = pricing.failure_threshold,
        max_attempts = pricing.retry_max_attempts,
        "pricing gateway configured"
    );

    let service_deps = ServiceDependencies {
        book_repository,
        pricing: Arc::new(gateway),
    };

    let app_state = Arc::new(AppState {
        service_deps,
        breakers,
        instance: InstanceInfo::new(config.hostname.clone(), config.port),
    });

    let app = create_router(app_state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    tracing::info!("server shut down gracefully");
}
