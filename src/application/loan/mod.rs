mod book_locks;
mod errors;
mod loan_service;
mod saga_recovery;

pub use book_locks::BookLocks;
pub use errors::{FaultCode, LoanApplicationError, Result};
pub use loan_service::{
    ServiceDependencies, create_loan, get_all_loans, get_loan_by_id, get_loans_by_user,
    return_loan,
};
pub use saga_recovery::{RecoveryReport, recover_pending_sagas};
