use crate::domain::{Book, BookId, commands::CreateBook};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 在庫台帳ポート
///
/// 書籍レコードの保存・取得と、行単位の排他ロック取得を抽象化する。
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// 書籍を登録し、採番されたIDを含むレコードを返す
    async fn create(&self, cmd: CreateBook) -> Result<Book>;

    /// すべての書籍をID順に取得する
    async fn find_all(&self) -> Result<Vec<Book>>;

    /// IDで書籍を取得する
    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>>;

    /// 書籍レコードの排他ロックを取得する
    ///
    /// 同じIDに対する2つ目の呼び出しは、1つ目が`persist`または`release`するまで
    /// 待機する（失敗はしない）。異なるIDの呼び出し同士は互いをブロックしない。
    ///
    /// レコードが存在しない場合は`Ok(None)`を返す。
    async fn lock_for_update(&self, id: BookId) -> Result<Option<Box<dyn LockedBook>>>;
}

/// 排他ロックを保持した書籍レコード
///
/// `persist`か`release`のどちらかで必ずロックを解放する。
/// どちらも呼ばれずにdropされた場合も、変更を破棄してロックを解放する。
#[async_trait]
pub trait LockedBook: Send {
    /// ロック取得時点のレコード
    fn book(&self) -> &Book;

    /// 更新後のレコードをコミットし、同じ単位でロックを解放する
    ///
    /// コミット完了前にロックが解放されることはない。
    async fn persist(self: Box<Self>, updated: Book) -> Result<Book>;

    /// 変更を破棄してロックを解放する
    async fn release(self: Box<Self>) -> Result<()>;
}
