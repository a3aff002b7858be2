use crate::domain::loan::{Loan, LoanStatus, NewLoan};
use crate::domain::value_objects::{LoanId, UserId};
use crate::ports::loan_store::{LoanStore as LoanStoreTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// LoanStoreのインメモリ実装
///
/// IDは1から連番で採番する。
/// テスト用に挿入・読み込み・削除の失敗を注入できる。
pub struct LoanStore {
    loans: Mutex<BTreeMap<LoanId, Loan>>,
    next_id: Mutex<i64>,
    fail_inserts: AtomicBool,
    fail_queries: AtomicBool,
    fail_deletes: AtomicBool,
}

impl LoanStore {
    pub fn new() -> Self {
        Self {
            loans: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(1),
            fail_inserts: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// 挿入（チェックポイント）を失敗させる
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// 一覧取得を失敗させる
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// 削除（補償）を失敗させる
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// 保存されている貸出の件数
    pub fn len(&self) -> usize {
        self.loans.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_queries(&self) -> Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err("loan store unavailable".into());
        }
        Ok(())
    }
}

impl Default for LoanStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoanStoreTrait for LoanStore {
    async fn reserve_id(&self) -> Result<LoanId> {
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        Ok(LoanId::new(id))
    }

    async fn insert(&self, loan_id: LoanId, new_loan: NewLoan) -> Result<Loan> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err("loan store unavailable".into());
        }

        let mut loans = self.loans.lock().unwrap();
        if loans.contains_key(&loan_id) {
            return Err(format!("loan {} already exists", loan_id).into());
        }
        let loan = Loan::from_new(loan_id, new_loan);
        loans.insert(loan_id, loan.clone());
        Ok(loan)
    }

    async fn delete(&self, loan_id: LoanId) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err("loan store unavailable".into());
        }
        self.loans.lock().unwrap().remove(&loan_id);
        Ok(())
    }

    async fn mark_returned(
        &self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Loan>> {
        let mut loans = self.loans.lock().unwrap();
        match loans.get_mut(&loan_id) {
            Some(loan) if loan.status == LoanStatus::Active => {
                loan.status = LoanStatus::Returned;
                loan.return_date = Some(returned_at);
                Ok(Some(loan.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        Ok(self.loans.lock().unwrap().get(&loan_id).cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Loan>> {
        self.check_queries()?;
        Ok(self
            .loans
            .lock()
            .unwrap()
            .values()
            .filter(|loan| loan.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Loan>> {
        self.check_queries()?;
        Ok(self.loans.lock().unwrap().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loan::open_loan;
    use crate::domain::value_objects::BookId;

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let store = LoanStore::new();
        let now = Utc::now();

        let first = store.reserve_id().await.unwrap();
        let second = store.reserve_id().await.unwrap();
        assert_eq!(first, LoanId::new(1));
        assert_eq!(second, LoanId::new(2));

        // 予約だけでは貸出は作られない
        assert!(store.is_empty());

        let loan = store
            .insert(second, open_loan(UserId::new(1), BookId::new(2), now))
            .await
            .unwrap();
        assert_eq!(loan.id, second);
        assert!(
            store
                .insert(second, open_loan(UserId::new(1), BookId::new(2), now))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_mark_returned_only_once() {
        let store = LoanStore::new();
        let now = Utc::now();
        let id = store.reserve_id().await.unwrap();
        let loan = store
            .insert(id, open_loan(UserId::new(1), BookId::new(1), now))
            .await
            .unwrap();

        let first = store.mark_returned(loan.id, now).await.unwrap();
        let second = store.mark_returned(loan.id, now).await.unwrap();

        assert_eq!(first.unwrap().status, LoanStatus::Returned);
        assert!(second.is_none());
    }
}
