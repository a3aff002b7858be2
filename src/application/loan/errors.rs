use crate::ports::CatalogError;
use thiserror::Error;

/// 障害の分類
///
/// ワイヤ上の`errorCode`要素とゲートウェイのHTTPステータス決定に使われる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    /// 必須項目の欠落
    Validation,
    /// 貸出・書籍が存在しない
    NotFound,
    /// 状態の競合（返却済み、在庫なし）
    Conflict,
    /// カタログサービスに到達できない・異常応答
    UpstreamUnavailable,
    /// ストア障害・想定外のエラー
    Internal,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::Validation => "VALIDATION",
            FaultCode::NotFound => "NOT_FOUND",
            FaultCode::Conflict => "CONFLICT",
            FaultCode::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            FaultCode::Internal => "INTERNAL",
        }
    }
}

impl std::str::FromStr for FaultCode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "VALIDATION" => Ok(FaultCode::Validation),
            "NOT_FOUND" => Ok(FaultCode::NotFound),
            "CONFLICT" => Ok(FaultCode::Conflict),
            "UPSTREAM_UNAVAILABLE" => Ok(FaultCode::UpstreamUnavailable),
            "INTERNAL" => Ok(FaultCode::Internal),
            _ => Err(format!("Invalid fault code: {}", s)),
        }
    }
}

/// 貸出管理アプリケーション層のエラー
///
/// `Display`はそのままクライアントに返せる文言にする。
/// 内部の詳細は`source`に保持し、ログにのみ出力する。
#[derive(Debug, Error)]
pub enum LoanApplicationError {
    /// 必須項目が空
    #[error("{0}")]
    Validation(&'static str),

    /// 書籍の取得に失敗（存在しない、またはカタログに到達できない）
    #[error("Book not found or book service unavailable")]
    BookLookupFailed(#[source] CatalogError),

    /// 在庫なし
    #[error("Book is not available")]
    BookNotAvailable,

    /// 貸出が見つからない
    #[error("Loan not found")]
    LoanNotFound,

    /// 既に返却済み
    #[error("Loan already returned")]
    LoanAlreadyReturned,

    /// 貸出作成時の在庫更新に失敗（貸出は補償済み）
    #[error("Failed to update book quantity")]
    CheckoutCatalogUpdateFailed(#[source] CatalogError),

    /// 返却時の在庫更新に失敗（返却は確定済み、サガは未確定のまま残る）
    #[error("Failed to update book quantity on return")]
    ReturnCatalogUpdateFailed(#[source] CatalogError),

    /// 貸出ストアのエラー
    #[error("Loan store error")]
    LoanStoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// サガログのエラー
    #[error("Saga log error")]
    SagaLogError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LoanApplicationError {
    pub fn fault_code(&self) -> FaultCode {
        match self {
            LoanApplicationError::Validation(_) => FaultCode::Validation,
            LoanApplicationError::BookLookupFailed(CatalogError::NotFound(_)) => {
                FaultCode::NotFound
            }
            LoanApplicationError::BookLookupFailed(_) => FaultCode::UpstreamUnavailable,
            LoanApplicationError::BookNotAvailable => FaultCode::Conflict,
            LoanApplicationError::LoanNotFound => FaultCode::NotFound,
            LoanApplicationError::LoanAlreadyReturned => FaultCode::Conflict,
            LoanApplicationError::CheckoutCatalogUpdateFailed(_)
            | LoanApplicationError::ReturnCatalogUpdateFailed(_) => {
                FaultCode::UpstreamUnavailable
            }
            LoanApplicationError::LoanStoreError(_) | LoanApplicationError::SagaLogError(_) => {
                FaultCode::Internal
            }
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LoanApplicationError>;
