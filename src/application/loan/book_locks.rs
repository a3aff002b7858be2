use crate::domain::value_objects::BookId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 書籍ごとの排他制御
///
/// 在庫の「確認 → 減算」を同じ書籍について直列化する。
/// 1プロセス内でのみ有効で、複数インスタンス間の排他は行わない。
#[derive(Default)]
pub struct BookLocks {
    locks: Mutex<HashMap<BookId, Arc<AsyncMutex<()>>>>,
}

impl BookLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 書籍のロックを取得する
    ///
    /// ガードを破棄するまで同じ書籍への他のサガは待たされる。
    pub async fn acquire(&self, book_id: BookId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // 誰も保持していないエントリを掃除する
            locks.retain(|id, lock| *id == book_id || Arc::strong_count(lock) > 1);
            locks.entry(book_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// 現在テーブルに残っているエントリ数
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_book_is_serialized() {
        let locks = Arc::new(BookLocks::new());
        let guard = locks.acquire(BookId::new(7)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(BookId::new(7)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_books_do_not_block() {
        let locks = BookLocks::new();
        let _first = locks.acquire(BookId::new(1)).await;
        let _second = locks.acquire(BookId::new(2)).await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = BookLocks::new();
        drop(locks.acquire(BookId::new(1)).await);
        drop(locks.acquire(BookId::new(2)).await);
        let _third = locks.acquire(BookId::new(3)).await;
        assert_eq!(locks.len(), 1);
    }
}
