pub mod book;
pub mod pricing;
