use std::fmt;

use crate::domain::commands::{CreateLoan, ReturnLoan};
use crate::domain::value_objects::{BookId, LoanId, UserId};

use super::codec::Envelope;
use super::error::ProtocolError;

/// The five operations understood by the loan service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationName {
    CreateLoan,
    ReturnLoan,
    GetLoansByUser,
    GetLoanById,
    GetAllLoans,
}

impl OperationName {
    pub const ALL: [OperationName; 5] = [
        OperationName::CreateLoan,
        OperationName::ReturnLoan,
        OperationName::GetLoansByUser,
        OperationName::GetLoanById,
        OperationName::GetAllLoans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationName::CreateLoan => "createLoan",
            OperationName::ReturnLoan => "returnLoan",
            OperationName::GetLoansByUser => "getLoansByUser",
            OperationName::GetLoanById => "getLoanById",
            OperationName::GetAllLoans => "getAllLoans",
        }
    }

    pub fn response_element(&self) -> String {
        format!("{}Response", self.as_str())
    }

    /// Single-loan operations answer with `loan` + `error`; the others with a list.
    pub fn returns_single_loan(&self) -> bool {
        matches!(
            self,
            OperationName::CreateLoan | OperationName::ReturnLoan | OperationName::GetLoanById
        )
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationName::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownOperation(s.to_string()))
    }
}

/// A decoded request with typed, named fields.
///
/// Empty or missing ids are kept as `None` so the coordinator can answer
/// with a validation fault; ids that are present but not integers are
/// rejected while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanOperation {
    CreateLoan(CreateLoan),
    ReturnLoan(ReturnLoan),
    GetLoansByUser { user_id: Option<UserId> },
    GetLoanById { loan_id: Option<LoanId> },
    GetAllLoans,
}

impl LoanOperation {
    pub fn name(&self) -> OperationName {
        match self {
            LoanOperation::CreateLoan(_) => OperationName::CreateLoan,
            LoanOperation::ReturnLoan(_) => OperationName::ReturnLoan,
            LoanOperation::GetLoansByUser { .. } => OperationName::GetLoansByUser,
            LoanOperation::GetLoanById { .. } => OperationName::GetLoanById,
            LoanOperation::GetAllLoans => OperationName::GetAllLoans,
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        let envelope = Envelope::new(self.name());
        match self {
            LoanOperation::CreateLoan(cmd) => envelope
                .with_optional_param("userId", cmd.user_id.map(|id| id.value()))
                .with_optional_param("bookId", cmd.book_id.map(|id| id.value())),
            LoanOperation::ReturnLoan(cmd) => {
                envelope.with_optional_param("loanId", cmd.loan_id.map(|id| id.value()))
            }
            LoanOperation::GetLoansByUser { user_id } => {
                envelope.with_optional_param("userId", user_id.map(|id| id.value()))
            }
            LoanOperation::GetLoanById { loan_id } => {
                envelope.with_optional_param("loanId", loan_id.map(|id| id.value()))
            }
            LoanOperation::GetAllLoans => envelope,
        }
    }
}

impl TryFrom<&Envelope> for LoanOperation {
    type Error = ProtocolError;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        let operation = envelope.operation.parse::<OperationName>()?;

        let op = match operation {
            OperationName::CreateLoan => LoanOperation::CreateLoan(CreateLoan {
                user_id: id_param(envelope, "userId")?.map(UserId::new),
                book_id: id_param(envelope, "bookId")?.map(BookId::new),
            }),
            OperationName::ReturnLoan => LoanOperation::ReturnLoan(ReturnLoan {
                loan_id: id_param(envelope, "loanId")?.map(LoanId::new),
            }),
            OperationName::GetLoansByUser => LoanOperation::GetLoansByUser {
                user_id: id_param(envelope, "userId")?.map(UserId::new),
            },
            OperationName::GetLoanById => LoanOperation::GetLoanById {
                loan_id: id_param(envelope, "loanId")?.map(LoanId::new),
            },
            OperationName::GetAllLoans => LoanOperation::GetAllLoans,
        };

        Ok(op)
    }
}

fn id_param(envelope: &Envelope, tag: &str) -> Result<Option<i64>, ProtocolError> {
    match envelope.param(tag).map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ProtocolError::InvalidParameter {
                tag: tag.to_string(),
                value: value.to_string(),
            }),
    }
}
