//! Wire format shared by the loan service and the gateway.

pub mod codec;
pub mod error;
pub mod operation;
pub mod wsdl;
pub mod xml;

pub use codec::{
    Envelope, Fault, FaultSide, OperationResponse, Reply, ResponseBody, WireError, decode_envelope,
    decode_reply, encode_envelope, encode_reply,
};
pub use error::ProtocolError;
pub use operation::{LoanOperation, OperationName};
