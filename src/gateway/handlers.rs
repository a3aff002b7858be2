use crate::domain::commands::CreateLoan;
use crate::domain::value_objects::{BookId, UserId};
use crate::protocol::{
    Envelope, FaultSide, LoanOperation, OperationName, Reply, ResponseBody, decode_reply,
    encode_envelope,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::{
    client::LoanServiceTransport,
    error::{GatewayError, OperationKind},
    routes::{GatewayRoute, classify},
    types::{CreateLoanRequest, LoanResponse},
};

/// ゲートウェイの共有状態
#[derive(Clone)]
pub struct GatewayState {
    pub transport: Arc<dyn LoanServiceTransport>,
}

const LOANS_PREFIX: &str = "/api/loans";

/// /api/loans, /api/loans/* - RESTリクエストを貸出サービスに転送
pub async fn proxy_loans(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let path = uri.path().strip_prefix(LOANS_PREFIX).unwrap_or_default();
    let route = classify(&method, path).ok_or(GatewayError::RouteNotFound)?;

    let envelope = build_envelope(&route, &body)?;
    let operation = route_operation(&route);

    tracing::debug!(operation = %operation, "Forwarding loan request");

    let reply = state
        .transport
        .post_envelope(encode_envelope(&envelope))
        .await
        .map_err(|e| GatewayError::LoanServiceUnreachable(e.to_string()))?;

    let reply = decode_reply(&reply.body).map_err(|e| {
        GatewayError::InvalidReply(format!("HTTP {}: {}", reply.status, e))
    })?;

    let response = match reply {
        Reply::Fault(fault) => {
            return Err(match fault.side {
                FaultSide::Client => GatewayError::RejectedRequest(fault.message),
                FaultSide::Server => GatewayError::LoanServiceFault(fault.message),
            });
        }
        Reply::Operation(response) => response,
    };

    if response.operation != operation {
        return Err(GatewayError::InvalidReply(format!(
            "expected {} reply, got {}",
            operation.response_element(),
            response.operation.response_element()
        )));
    }

    match response.body {
        ResponseBody::Loan(Ok(loan)) => {
            let status = if route == GatewayRoute::CreateLoan {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((status, Json(LoanResponse::from(loan))).into_response())
        }
        ResponseBody::Loan(Err(e)) => Err(GatewayError::Operation {
            kind: if route == GatewayRoute::CreateLoan {
                OperationKind::Create
            } else {
                OperationKind::Lookup
            },
            code: e.code,
            message: e.message,
        }),
        ResponseBody::Loans(loans) => {
            let loans: Vec<LoanResponse> = loans.into_iter().map(LoanResponse::from).collect();
            Ok(Json(loans).into_response())
        }
    }
}

fn route_operation(route: &GatewayRoute) -> OperationName {
    match route {
        GatewayRoute::CreateLoan => OperationName::CreateLoan,
        GatewayRoute::ReturnLoan { .. } => OperationName::ReturnLoan,
        GatewayRoute::LoansByUser { .. } => OperationName::GetLoansByUser,
        GatewayRoute::LoanById { .. } => OperationName::GetLoanById,
        GatewayRoute::AllLoans => OperationName::GetAllLoans,
    }
}

/// ルートからエンベロープを組み立てる
///
/// パス上のIDはそのまま渡す（値はエンコード時にエスケープされる）。
fn build_envelope(route: &GatewayRoute, body: &[u8]) -> Result<Envelope, GatewayError> {
    let envelope = match route {
        GatewayRoute::CreateLoan => {
            let req: CreateLoanRequest = serde_json::from_slice(body)
                .map_err(|e| GatewayError::InvalidBody(e.to_string()))?;
            LoanOperation::CreateLoan(CreateLoan {
                user_id: Some(UserId::new(req.user_id)),
                book_id: Some(BookId::new(req.book_id)),
            })
            .to_envelope()
        }
        GatewayRoute::ReturnLoan { loan_id } => {
            Envelope::new(OperationName::ReturnLoan).with_param("loanId", loan_id.as_str())
        }
        GatewayRoute::LoansByUser { user_id } => {
            Envelope::new(OperationName::GetLoansByUser).with_param("userId", user_id.as_str())
        }
        GatewayRoute::LoanById { loan_id } => {
            Envelope::new(OperationName::GetLoanById).with_param("loanId", loan_id.as_str())
        }
        GatewayRoute::AllLoans => LoanOperation::GetAllLoans.to_envelope(),
    };
    Ok(envelope)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
