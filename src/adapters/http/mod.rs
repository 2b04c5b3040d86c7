pub mod pricing_client;

pub use pricing_client::PricingClient as HttpPricingClient;
