use crate::domain::{Book, BookId, commands::CreateBook};
use crate::ports::book_repository::{BookRepository as BookRepositoryTrait, LockedBook, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

type Rows = BTreeMap<BookId, Arc<RowLock<Book>>>;

/// In-memory implementation of the stock ledger
///
/// Every book lives behind its own async mutex, which plays the role of the
/// row lock: a borrower holding it keeps every other reader and writer of the
/// same id waiting, while other ids stay independent. The table mutex only
/// guards the id → row map and is never held across an `.await`.
pub struct BookRepository {
    rows: Mutex<Rows>,
    next_id: AtomicI64,
    fail_on_persist: Arc<AtomicBool>,
}

impl BookRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            fail_on_persist: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Insert a book with a caller-chosen id (seeding and tests)
    ///
    /// Later `create` calls never reuse an id at or below the inserted one.
    pub fn insert(&self, book: Book) -> Result<()> {
        self.next_id.fetch_max(book.id.value() + 1, Ordering::SeqCst);
        self.rows()?.insert(book.id, Arc::new(RowLock::new(book)));
        Ok(())
    }

    /// Make every subsequent `persist` fail without touching the record
    pub fn set_fail_on_persist(&self, fail: bool) {
        self.fail_on_persist.store(fail, Ordering::SeqCst);
    }

    fn rows(&self) -> Result<MutexGuard<'_, Rows>> {
        self.rows
            .lock()
            .map_err(|_| "in-memory book table lock poisoned".into())
    }

    fn row(&self, id: BookId) -> Result<Option<Arc<RowLock<Book>>>> {
        Ok(self.rows()?.get(&id).cloned())
    }
}

impl Default for BookRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookRepositoryTrait for BookRepository {
    async fn create(&self, cmd: CreateBook) -> Result<Book> {
        let id = BookId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let book = Book {
            id,
            title: cmd.title,
            author: cmd.author,
            stock: cmd.initial_stock,
        };

        self.rows()?.insert(id, Arc::new(RowLock::new(book.clone())));
        Ok(book)
    }

    /// Reads wait for any in-flight borrow of the same row to finish.
    async fn find_all(&self) -> Result<Vec<Book>> {
        let rows: Vec<_> = self.rows()?.values().cloned().collect();

        let mut books = Vec::with_capacity(rows.len());
        for row in rows {
            books.push(row.lock().await.clone());
        }
        Ok(books)
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>> {
        match self.row(id)? {
            Some(row) => Ok(Some(row.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn lock_for_update(&self, id: BookId) -> Result<Option<Box<dyn LockedBook>>> {
        let Some(row) = self.row(id)? else {
            return Ok(None);
        };

        let guard = row.lock_owned().await;
        Ok(Some(Box::new(MemoryLockedBook {
            guard,
            fail_on_persist: Arc::clone(&self.fail_on_persist),
        })))
    }
}

/// Owned guard over one row; dropping it releases the lock.
struct MemoryLockedBook {
    guard: OwnedMutexGuard<Book>,
    fail_on_persist: Arc<AtomicBool>,
}

#[async_trait]
impl LockedBook for MemoryLockedBook {
    fn book(&self) -> &Book {
        &self.guard
    }

    async fn persist(self: Box<Self>, updated: Book) -> Result<Book> {
        let Self {
            mut guard,
            fail_on_persist,
        } = *self;

        if updated.id != guard.id {
            return Err(format!(
                "cannot persist book {} under the lock of book {}",
                updated.id, guard.id
            )
            .into());
        }
        if fail_on_persist.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("injected persistence failure").into());
        }

        *guard = updated.clone();
        Ok(updated)
    }

    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Stock, decrement_stock};
    use std::time::Duration;

    fn create_cmd(stock: u32) -> CreateBook {
        CreateBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            initial_stock: Stock::new(stock),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = BookRepository::new();

        let first = repo.create(create_cmd(1)).await.unwrap();
        let second = repo.create(create_cmd(1)).await.unwrap();

        assert_eq!(first.id, BookId::new(1));
        assert_eq!(second.id, BookId::new(2));
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_moves_id_sequence_past_seeded_id() {
        let repo = BookRepository::new();
        repo.insert(Book {
            id: BookId::new(7),
            title: "Seeded".to_string(),
            author: "Someone".to_string(),
            stock: Stock::new(1),
        })
        .unwrap();

        let created = repo.create(create_cmd(1)).await.unwrap();
        assert_eq!(created.id, BookId::new(8));
    }

    #[tokio::test]
    async fn test_lock_for_update_missing_book() {
        let repo = BookRepository::new();
        let locked = repo.lock_for_update(BookId::new(42)).await.unwrap();
        assert!(locked.is_none());
    }

    #[tokio::test]
    async fn test_persist_commits_and_releases() {
        let repo = BookRepository::new();
        let book = repo.create(create_cmd(2)).await.unwrap();

        let locked = repo.lock_for_update(book.id).await.unwrap().unwrap();
        let updated = decrement_stock(locked.book()).unwrap();
        locked.persist(updated).await.unwrap();

        let stored = repo.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.stock.value(), 1);
    }

    #[tokio::test]
    async fn test_release_discards_changes() {
        let repo = BookRepository::new();
        let book = repo.create(create_cmd(2)).await.unwrap();

        let locked = repo.lock_for_update(book.id).await.unwrap().unwrap();
        locked.release().await.unwrap();

        let stored = repo.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.stock.value(), 2);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_record_unchanged() {
        let repo = BookRepository::new();
        let book = repo.create(create_cmd(2)).await.unwrap();
        repo.set_fail_on_persist(true);

        let locked = repo.lock_for_update(book.id).await.unwrap().unwrap();
        let updated = decrement_stock(locked.book()).unwrap();
        assert!(locked.persist(updated).await.is_err());

        // ロックも解放されている
        let stored = repo.find_by_id(book.id).await.unwrap().unwrap();
        assert_eq!(stored.stock.value(), 2);
    }

    #[tokio::test]
    async fn test_second_locker_waits_for_first() {
        let repo = Arc::new(BookRepository::new());
        let book = repo.create(create_cmd(1)).await.unwrap();

        let first = repo.lock_for_update(book.id).await.unwrap().unwrap();

        let contender = {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                let locked = repo.lock_for_update(book.id).await.unwrap().unwrap();
                locked.book().stock.value()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        let updated = decrement_stock(first.book()).unwrap();
        first.persist(updated).await.unwrap();

        // 2つ目はコミット後の値を読む
        assert_eq!(contender.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_different_ids_do_not_block_each_other() {
        let repo = BookRepository::new();
        let a = repo.create(create_cmd(1)).await.unwrap();
        let b = repo.create(create_cmd(1)).await.unwrap();

        let _held = repo.lock_for_update(a.id).await.unwrap().unwrap();
        let other = tokio::time::timeout(Duration::from_secs(1), repo.lock_for_update(b.id))
            .await
            .expect("lock on a different id must not wait")
            .unwrap();

        assert!(other.is_some());
    }
}
