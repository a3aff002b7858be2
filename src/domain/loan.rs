use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, ReturnLoanError, UserId};

/// 貸出期間（日数）
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// 貸出ステータス
///
/// 遷移は Active → Returned の一方向のみ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// 貸出中
    Active,
    /// 返却済み
    Returned,
}

impl LoanStatus {
    /// ワイヤ・DB上の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
        }
    }

    pub fn is_returned(&self) -> bool {
        matches!(self, LoanStatus::Returned)
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(LoanStatus::Active),
            "RETURNED" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

/// 採番前の貸出
///
/// ストアに挿入されるとIDが割り当てられ`Loan`になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub user_id: UserId,
    pub book_id: BookId,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// 貸出 - 1冊の書籍の1回の貸出
///
/// 不変条件：`status == Returned` ⇔ `return_date.is_some()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

impl Loan {
    /// 採番済みIDと組み合わせて貸出中の貸出を作る
    pub fn from_new(id: LoanId, new_loan: NewLoan) -> Self {
        Self {
            id,
            user_id: new_loan.user_id,
            book_id: new_loan.book_id,
            loan_date: new_loan.loan_date,
            due_date: new_loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
        }
    }
}

/// 純粋関数：貸出を開始する
///
/// 返却期限は貸出日 + 14日。
pub fn open_loan(user_id: UserId, book_id: BookId, loan_date: DateTime<Utc>) -> NewLoan {
    NewLoan {
        user_id,
        book_id,
        loan_date,
        due_date: loan_date + Duration::days(LOAN_PERIOD_DAYS),
    }
}

/// 純粋関数：返却する
///
/// 返却済みの貸出は再返却できない（冪等ではない）。
pub fn return_loan(loan: &Loan, returned_at: DateTime<Utc>) -> Result<Loan, ReturnLoanError> {
    if loan.status.is_returned() {
        return Err(ReturnLoanError::AlreadyReturned);
    }

    Ok(Loan {
        return_date: Some(returned_at),
        status: LoanStatus::Returned,
        ..loan.clone()
    })
}

/// 貸出日の新しい順に並べる（同時刻はIDの降順）
pub fn sort_newest_first(loans: &mut [Loan]) {
    loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));
}
