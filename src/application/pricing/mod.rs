mod circuit_breaker;
mod pricing_gateway;
mod retry;

pub use circuit_breaker::{
    Admission, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry,
    CircuitBreakerSnapshot, CircuitState,
};
pub use pricing_gateway::{DEFAULT_FALLBACK_PRICE, PRICING_SERVICE, PriceQuote, PricingGateway};
pub use retry::{AttemptError, RetryError, RetryPolicy, calculate_backoff};
