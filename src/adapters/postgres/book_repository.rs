use crate::domain::{Book, BookId, Stock, commands::CreateBook};
use crate::ports::book_repository::{BookRepository as BookRepositoryTrait, LockedBook, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

/// Map a `books` row to the domain record.
///
/// A negative stock value in the table is reported as invalid data rather
/// than clamped.
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let stock: i32 = row.get("stock");

    Ok(Book {
        id: BookId::new(row.get("id")),
        title: row.get("title"),
        author: row.get("author"),
        stock: Stock::try_from(stock)?,
    })
}

/// PostgreSQL implementation of the stock ledger
///
/// The exclusive hold is a row lock taken with `SELECT ... FOR UPDATE` inside
/// a transaction. The transaction travels with the [`LockedBook`] handle, so
/// the lock lives exactly as long as the handle does.
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    /// Create a new BookRepository with a PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepositoryTrait for BookRepository {
    async fn create(&self, cmd: CreateBook) -> Result<Book> {
        let initial_stock = i32::try_from(cmd.initial_stock.value())?;

        let row = sqlx::query(
            r#"
            INSERT INTO books (title, author, stock)
            VALUES ($1, $2, $3)
            RETURNING id, title, author, stock
            "#,
        )
        .bind(&cmd.title)
        .bind(&cmd.author)
        .bind(initial_stock)
        .fetch_one(&self.pool)
        .await?;

        map_row_to_book(&row)
    }

    async fn find_all(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, author, stock
            FROM books
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, author, stock
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    /// Lock the row for update
    ///
    /// A second transaction selecting the same row `FOR UPDATE` blocks inside
    /// PostgreSQL until this one commits or rolls back. Other rows are not
    /// affected.
    async fn lock_for_update(&self, id: BookId) -> Result<Option<Box<dyn LockedBook>>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, title, author, stock
            FROM books
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.value())
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(row) => {
                let book = map_row_to_book(&row)?;
                Ok(Some(Box::new(PostgresLockedBook { tx, book })))
            }
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }
}

/// A row held under `FOR UPDATE` together with its open transaction
///
/// Dropping it without `persist` lets sqlx roll the transaction back.
struct PostgresLockedBook {
    tx: Transaction<'static, Postgres>,
    book: Book,
}

#[async_trait]
impl LockedBook for PostgresLockedBook {
    fn book(&self) -> &Book {
        &self.book
    }

    /// Write the new stock and commit; the row lock is released by the commit.
    async fn persist(self: Box<Self>, updated: Book) -> Result<Book> {
        let Self { mut tx, book } = *self;

        if updated.id != book.id {
            tx.rollback().await?;
            return Err(format!(
                "cannot persist book {} under the lock of book {}",
                updated.id, book.id
            )
            .into());
        }

        let stock = i32::try_from(updated.stock.value())?;
        let result = sqlx::query(
            r#"
            UPDATE books
            SET stock = $2
            WHERE id = $1
            "#,
        )
        .bind(updated.id.value())
        .bind(stock)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Err(format!("book {} disappeared while locked", updated.id).into());
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let Self { tx, .. } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
