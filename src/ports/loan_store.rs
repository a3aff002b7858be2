use crate::domain::loan::{Loan, NewLoan};
use crate::domain::value_objects::{LoanId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出ストアポート
///
/// 貸出レコードの唯一の所有者。IDはストアが採番する。
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// 次の貸出IDを予約する
    ///
    /// 貸出作成サガは予約したIDで意図レコードを先に記録してから挿入する。
    async fn reserve_id(&self) -> Result<LoanId>;

    /// 予約済みのIDで貸出を挿入する
    ///
    /// 貸出作成サガのチェックポイント。
    async fn insert(&self, loan_id: LoanId, new_loan: NewLoan) -> Result<Loan>;

    /// 貸出を削除する
    ///
    /// 貸出作成サガの補償としてのみ使用される。
    async fn delete(&self, loan_id: LoanId) -> Result<()>;

    /// 貸出中の貸出を返却済みにする
    ///
    /// `status = ACTIVE`の行だけを更新する条件付き更新。
    /// 対象がない（存在しない、または既に返却済み）場合は`None`を返す。
    async fn mark_returned(
        &self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Loan>>;

    /// IDで貸出を取得する
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 利用者の全貸出を貸出日の新しい順で取得する
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Loan>>;

    /// 全貸出を貸出日の新しい順で取得する
    async fn find_all(&self) -> Result<Vec<Loan>>;
}
