pub mod book_repository;
pub mod price_lookup;

pub use book_repository::{BookRepository, LockedBook};
pub use price_lookup::{PriceLookup, RemotePrice};
