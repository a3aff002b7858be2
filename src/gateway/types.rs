use serde::{Deserialize, Serialize};

use crate::domain::loan::Loan;
use crate::protocol::codec::format_timestamp;

/// 貸出作成リクエスト（POST /api/loans）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub user_id: i64,
    pub book_id: i64,
}

/// 貸出レスポンス
///
/// 未返却の場合`returnDate`は`null`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub loan_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub status: String,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        Self {
            id: loan.id.value(),
            user_id: loan.user_id.value(),
            book_id: loan.book_id.value(),
            loan_date: format_timestamp(&loan.loan_date),
            due_date: format_timestamp(&loan.due_date),
            return_date: loan.return_date.as_ref().map(format_timestamp),
            status: loan.status.as_str().to_string(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
