mod book_service;
mod errors;

pub use book_service::{ServiceDependencies, borrow_book, create_book, get_book, list_books};
pub use errors::{BookApplicationError, Result};
