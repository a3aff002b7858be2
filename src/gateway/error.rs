use crate::application::loan::FaultCode;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// 操作の種類によって業務エラーのステータスの決め方が変わる
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Lookup,
}

/// ゲートウェイ層のエラー型
#[derive(Debug)]
pub enum GatewayError {
    /// `/api/loans`以下で該当するルートがない
    RouteNotFound,
    /// リクエストボディを解釈できない
    InvalidBody(String),
    /// 貸出サービスに接続できない
    LoanServiceUnreachable(String),
    /// 貸出サービスの応答を解釈できない
    InvalidReply(String),
    /// 貸出サービスがリクエストを拒否した（soap:Client）
    RejectedRequest(String),
    /// 貸出サービス内部の失敗（soap:Server）
    LoanServiceFault(String),
    /// 操作は実行されたが業務エラーになった
    Operation {
        kind: OperationKind,
        code: Option<FaultCode>,
        message: String,
    },
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::InvalidBody(_) | GatewayError::RejectedRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::LoanServiceUnreachable(_)
            | GatewayError::InvalidReply(_)
            | GatewayError::LoanServiceFault(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Operation { kind, code, .. } => operation_status(*kind, *code),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound => "NOT_FOUND",
            GatewayError::InvalidBody(_) | GatewayError::RejectedRequest(_) => "INVALID_REQUEST",
            GatewayError::LoanServiceUnreachable(_) => "LOAN_SERVICE_UNAVAILABLE",
            GatewayError::InvalidReply(_) | GatewayError::LoanServiceFault(_) => {
                "LOAN_SERVICE_ERROR"
            }
            GatewayError::Operation { code: Some(code), .. } => code.as_str(),
            GatewayError::Operation {
                kind: OperationKind::Create,
                code: None,
                ..
            } => "LOAN_REJECTED",
            GatewayError::Operation {
                kind: OperationKind::Lookup,
                code: None,
                ..
            } => "NOT_FOUND",
        }
    }
}

/// 業務エラーのHTTPステータス
///
/// 作成は内部エラー以外400。返却・ID指定は分類ごとに分け、
/// 分類を持たない応答は404として扱う。
fn operation_status(kind: OperationKind, code: Option<FaultCode>) -> StatusCode {
    match (kind, code) {
        (_, Some(FaultCode::Internal)) => StatusCode::INTERNAL_SERVER_ERROR,
        (OperationKind::Create, _) => StatusCode::BAD_REQUEST,
        (OperationKind::Lookup, Some(FaultCode::NotFound) | None) => StatusCode::NOT_FOUND,
        (OperationKind::Lookup, Some(FaultCode::Conflict)) => StatusCode::CONFLICT,
        (OperationKind::Lookup, Some(FaultCode::Validation)) => StatusCode::BAD_REQUEST,
        (OperationKind::Lookup, Some(FaultCode::UpstreamUnavailable)) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.error_code();

        // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
        let message = match self {
            GatewayError::RouteNotFound => "Not found".to_string(),
            GatewayError::InvalidBody(detail) => {
                tracing::debug!("Invalid request body: {}", detail);
                "Invalid request body".to_string()
            }
            GatewayError::LoanServiceUnreachable(detail) => {
                tracing::error!("Loan service unreachable: {}", detail);
                "Failed to contact loan service".to_string()
            }
            GatewayError::InvalidReply(detail) => {
                tracing::error!("Unparsable loan service reply: {}", detail);
                "Failed to parse response".to_string()
            }
            GatewayError::LoanServiceFault(detail) => {
                tracing::error!("Loan service fault: {}", detail);
                "Loan service error".to_string()
            }
            GatewayError::RejectedRequest(message) | GatewayError::Operation { message, .. } => {
                message
            }
        };

        (status, Json(ErrorResponse::new(error, message))).into_response()
    }
}
