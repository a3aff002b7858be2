pub mod loan_store;
pub mod saga_log;

// パブリックに型を再エクスポート
pub use loan_store::LoanStore as PostgresLoanStore;
pub use saga_log::SagaLog as PostgresSagaLog;
