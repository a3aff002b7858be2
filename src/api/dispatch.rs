//! Envelope → coordinator dispatch.

use std::error::Error as _;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::application::loan::{
    FaultCode, LoanApplicationError, ServiceDependencies, create_loan, get_all_loans,
    get_loan_by_id, get_loans_by_user, return_loan,
};
use crate::protocol::{Envelope, LoanOperation, OperationResponse, ResponseBody, WireError};

use super::error::ApiError;

/// デコード済みのエンベロープを対応する操作に振り分ける
///
/// 操作のパニックはここで捕捉し、`ApiError::Internal`に変換する。
pub async fn dispatch(
    deps: &ServiceDependencies,
    envelope: &Envelope,
) -> Result<OperationResponse, ApiError> {
    let operation = LoanOperation::try_from(envelope)?;
    let name = operation.name();

    tracing::debug!(operation = %name, "Dispatching operation");

    let body = AssertUnwindSafe(execute(deps, operation))
        .catch_unwind()
        .await
        .map_err(|panic| {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_default();
            tracing::error!(operation = %name, "Operation handler panicked: {}", detail);
            ApiError::Internal
        })?;

    Ok(OperationResponse {
        operation: name,
        body,
    })
}

async fn execute(deps: &ServiceDependencies, operation: LoanOperation) -> ResponseBody {
    match operation {
        LoanOperation::CreateLoan(cmd) => {
            ResponseBody::Loan(create_loan(deps, cmd).await.map_err(to_wire_error))
        }
        LoanOperation::ReturnLoan(cmd) => {
            ResponseBody::Loan(return_loan(deps, cmd).await.map_err(to_wire_error))
        }
        LoanOperation::GetLoanById { loan_id } => {
            ResponseBody::Loan(get_loan_by_id(deps, loan_id).await.map_err(to_wire_error))
        }
        LoanOperation::GetLoansByUser { user_id } => {
            ResponseBody::Loans(get_loans_by_user(deps, user_id).await)
        }
        LoanOperation::GetAllLoans => ResponseBody::Loans(get_all_loans(deps).await),
    }
}

/// アプリケーションエラーをワイヤ上のエラーに変換する
///
/// 返す文言は`Display`のみ。原因はログにだけ残す。
fn to_wire_error(err: LoanApplicationError) -> WireError {
    let code = err.fault_code();
    let cause = err.source().map(|e| e.to_string()).unwrap_or_default();

    match code {
        FaultCode::Internal => tracing::error!(code = code.as_str(), cause = %cause, "{}", err),
        FaultCode::UpstreamUnavailable => {
            tracing::warn!(code = code.as_str(), cause = %cause, "{}", err)
        }
        _ => tracing::debug!(code = code.as_str(), "{}", err),
    }

    WireError {
        code: Some(code),
        message: err.to_string(),
    }
}
