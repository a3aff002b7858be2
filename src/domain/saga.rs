use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, SagaId};

/// サガの種類
///
/// どちらも「貸出ストアの更新」→「カタログ在庫の更新」の2段階。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaKind {
    /// 貸出作成：在庫 -1
    Checkout,
    /// 返却：在庫 +1
    Return,
}

impl SagaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaKind::Checkout => "checkout",
            SagaKind::Return => "return",
        }
    }

    /// カタログ在庫に対する増減量
    pub fn quantity_delta(&self) -> i32 {
        match self {
            SagaKind::Checkout => -1,
            SagaKind::Return => 1,
        }
    }
}

impl std::str::FromStr for SagaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkout" => Ok(SagaKind::Checkout),
            "return" => Ok(SagaKind::Return),
            _ => Err(format!("Invalid saga kind: {}", s)),
        }
    }
}

/// サガの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaState {
    /// 第2段階（カタログ更新）が未確定
    Pending,
    /// 両段階が完了
    Completed,
    /// 第1段階を取り消した
    Compensated,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Pending => "pending",
            SagaState::Completed => "completed",
            SagaState::Compensated => "compensated",
        }
    }
}

impl std::str::FromStr for SagaState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SagaState::Pending),
            "completed" => Ok(SagaState::Completed),
            "compensated" => Ok(SagaState::Compensated),
            _ => Err(format!("Invalid saga state: {}", s)),
        }
    }
}

/// カタログ側の現在値から見た第2段階の進捗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogProgress {
    /// 書き込みは反映済み
    Applied,
    /// 書き込みは未反映
    NotApplied,
    /// 観測値が記録されていない（更新前の取得より前に中断した）
    Unobserved,
    /// 他の更新が混ざっており判定できない
    Drifted,
}

/// 永続化された意図レコード
///
/// チェックポイント（貸出ストア更新）の前に記録され、
/// カタログ更新の成否が確定するまで`Pending`のまま残る。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub id: SagaId,
    pub kind: SagaKind,
    pub loan_id: LoanId,
    pub book_id: BookId,
    /// カタログ更新直前に観測した在庫数
    pub observed_quantity: Option<i32>,
    pub state: SagaState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord {
    pub fn open(
        kind: SagaKind,
        loan_id: LoanId,
        book_id: BookId,
        observed_quantity: Option<i32>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SagaId::new(),
            kind,
            loan_id,
            book_id,
            observed_quantity,
            state: SagaState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// 書き込み後に期待される在庫数
    pub fn expected_quantity(&self) -> Option<i32> {
        self.observed_quantity
            .map(|observed| observed + self.kind.quantity_delta())
    }

    /// 現在の在庫数から第2段階が反映済みかを判定する
    pub fn progress(&self, current_quantity: i32) -> CatalogProgress {
        match self.observed_quantity {
            None => CatalogProgress::Unobserved,
            Some(observed) if current_quantity == observed => CatalogProgress::NotApplied,
            Some(observed) if current_quantity == observed + self.kind.quantity_delta() => {
                CatalogProgress::Applied
            }
            Some(_) => CatalogProgress::Drifted,
        }
    }
}
