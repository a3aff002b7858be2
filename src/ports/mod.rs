pub mod book_catalog;
pub mod loan_store;
pub mod saga_log;

pub use book_catalog::{BookCatalog, BookRecord, CatalogError};
pub use loan_store::LoanStore;
pub use saga_log::SagaLog;
