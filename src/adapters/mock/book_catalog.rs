use crate::domain::value_objects::BookId;
use crate::ports::book_catalog::{BookCatalog as BookCatalogTrait, BookRecord, CatalogError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// BookCatalogのモック実装
///
/// 書籍レコードをメモリに保持する。
/// 取得と更新の間に`yield_now`を挟み、同時実行時の競合を再現しやすくしている。
pub struct BookCatalog {
    books: Mutex<HashMap<BookId, BookRecord>>,
    unreachable: AtomicBool,
    fail_updates: AtomicBool,
    lose_update_replies: AtomicBool,
    updates: AtomicUsize,
}

impl BookCatalog {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
            unreachable: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            lose_update_replies: AtomicBool::new(false),
            updates: AtomicUsize::new(0),
        }
    }

    /// テスト用に書籍を登録
    pub fn add_book(&self, book_id: BookId, available_quantity: i32) {
        self.books
            .lock()
            .unwrap()
            .insert(book_id, BookRecord::new(book_id, available_quantity));
    }

    /// 書籍レコードをそのまま登録
    pub fn put_record(&self, record: BookRecord) {
        self.books.lock().unwrap().insert(record.id, record);
    }

    pub fn record(&self, book_id: BookId) -> Option<BookRecord> {
        self.books.lock().unwrap().get(&book_id).cloned()
    }

    pub fn quantity(&self, book_id: BookId) -> Option<i32> {
        self.record(book_id).map(|b| b.available_quantity)
    }

    /// 取得・更新の両方を到達不能にする
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// 更新だけを失敗させる
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// 更新は反映するが、呼び出し元にはタイムアウトを返す
    pub fn set_lose_update_replies(&self, lose: bool) {
        self.lose_update_replies.store(lose, Ordering::SeqCst);
    }

    /// 反映された更新の回数
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CatalogError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for BookCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookCatalogTrait for BookCatalog {
    async fn fetch(&self, book_id: BookId) -> Result<BookRecord> {
        self.check_reachable()?;
        let record = self
            .books
            .lock()
            .unwrap()
            .get(&book_id)
            .cloned()
            .ok_or(CatalogError::NotFound(book_id))?;

        tokio::task::yield_now().await;
        Ok(record)
    }

    async fn update(&self, book_id: BookId, record: &BookRecord) -> Result<()> {
        self.check_reachable()?;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CatalogError::Status {
                status: 500,
                url: format!("mock://books/{}", book_id),
            });
        }

        let mut books = self.books.lock().unwrap();
        if !books.contains_key(&book_id) {
            return Err(CatalogError::NotFound(book_id));
        }
        books.insert(book_id, record.clone());
        self.updates.fetch_add(1, Ordering::SeqCst);

        if self.lose_update_replies.load(Ordering::SeqCst) {
            return Err(CatalogError::Transport("operation timed out".to_string()));
        }
        Ok(())
    }
}
