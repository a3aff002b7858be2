use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, UserId};

/// コマンド：書籍を貸し出す
///
/// プロトコル層から受け取った入力をそのまま保持する。
/// 空のパラメータは`None`となり、バリデーションはアプリケーション層で行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLoan {
    pub user_id: Option<UserId>,
    pub book_id: Option<BookId>,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLoan {
    pub loan_id: Option<LoanId>,
}
