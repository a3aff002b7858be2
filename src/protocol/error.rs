use thiserror::Error;

/// Errors raised while reading or interpreting a wire envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("malformed markup at byte {0}")]
    Malformed(usize),

    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },

    #[error("unknown entity &{0};")]
    UnknownEntity(String),

    #[error("element nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("trailing content after root element")]
    TrailingContent,

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("invalid value for <{tag}>: {value:?}")]
    InvalidParameter { tag: String, value: String },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}
