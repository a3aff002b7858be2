use crate::protocol::{Fault, ProtocolError, Reply, encode_reply};
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

/// API層のエラー型
///
/// 操作の実行前後で発生したエンベロープレベルのエラー。
/// いずれもfault要素としてクライアントに返す。
#[derive(Debug)]
pub enum ApiError {
    /// 解釈できないリクエスト
    Protocol(ProtocolError),
    /// ハンドラー内部の想定外の失敗
    Internal,
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        ApiError::Protocol(err)
    }
}

impl ApiError {
    fn status_and_fault(&self) -> (StatusCode, Fault) {
        match self {
            // 未知の操作は200のままfaultを返す
            ApiError::Protocol(ProtocolError::UnknownOperation(name)) => {
                tracing::warn!(operation = %name, "Unknown operation");
                (StatusCode::OK, Fault::client("Unknown operation"))
            }
            ApiError::Protocol(err) => {
                tracing::warn!("Rejected request envelope: {}", err);
                (
                    StatusCode::BAD_REQUEST,
                    Fault::client(format!("Invalid request: {}", err)),
                )
            }
            // 内部エラーの詳細は発生箇所でログに記録済み
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Fault::server("Internal server error"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, fault) = self.status_and_fault();
        (
            status,
            [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
            encode_reply(&Reply::Fault(fault)),
        )
            .into_response()
    }
}
