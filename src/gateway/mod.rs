//! REST front end that forwards loan requests to the loan service as envelopes.

pub mod client;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod types;

pub use client::{HttpLoanServiceTransport, LoanServiceTransport, TransportReply};
pub use error::GatewayError;
pub use handlers::GatewayState;
pub use router::create_gateway_router;
pub use routes::{GatewayRoute, classify};
