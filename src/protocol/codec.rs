//! Envelope encoding and decoding.
//!
//! Requests are `Envelope/Body/<operation>` with one leaf element per
//! parameter. Responses carry either an `<operation>Response` element
//! (`loan` / `error` / `errorCode`, or a list of `loan`) or a `Fault`.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::application::loan::FaultCode;
use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::value_objects::{BookId, LoanId, UserId};

use super::error::ProtocolError;
use super::operation::OperationName;
use super::xml::{self, Element, escape};

pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const LOAN_NS: &str = "http://example.com/loan";

/// Operation name plus raw parameter values, as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub operation: String,
    pub params: BTreeMap<String, String>,
}

impl Envelope {
    pub fn new(operation: OperationName) -> Self {
        Self {
            operation: operation.as_str().to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn with_optional_param<T: ToString>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with_param(name, value.to_string()),
            None => self,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Error payload inside a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    /// Absent on replies produced by peers that only send the `error` text.
    pub code: Option<FaultCode>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Loan(Result<Loan, WireError>),
    Loans(Vec<Loan>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResponse {
    pub operation: OperationName,
    pub body: ResponseBody,
}

/// Which side a transport-level fault blames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSide {
    Client,
    Server,
}

impl FaultSide {
    fn as_code(&self) -> &'static str {
        match self {
            FaultSide::Client => "soap:Client",
            FaultSide::Server => "soap:Server",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub side: FaultSide,
    pub message: String,
}

impl Fault {
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            side: FaultSide::Client,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self {
            side: FaultSide::Server,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Operation(OperationResponse),
    Fault(Fault),
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(tag: &str, value: &str) -> Result<DateTime<Utc>, ProtocolError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ProtocolError::InvalidParameter {
            tag: tag.to_string(),
            value: value.to_string(),
        })
}

// ============================================================================
// Requests
// ============================================================================

/// Decodes a request envelope. A bare operation element is accepted as root.
pub fn decode_envelope(raw: &str) -> Result<Envelope, ProtocolError> {
    let root = xml::parse(raw)?;
    let op = operation_element(&root)?;

    let name = op.name.strip_suffix("Request").unwrap_or(&op.name);

    let mut params = BTreeMap::new();
    for child in op.children.iter().filter(|c| c.is_leaf()) {
        params
            .entry(child.name.clone())
            .or_insert_with(|| child.text.clone());
    }

    Ok(Envelope {
        operation: name.to_string(),
        params,
    })
}

/// Encodes a request envelope. Every parameter value is escaped.
pub fn encode_envelope(envelope: &Envelope) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<soapenv:Envelope xmlns:soapenv=\"{}\" xmlns:loan=\"{}\">",
        SOAP_ENV_NS, LOAN_NS
    );
    out.push_str("   <soapenv:Header/>\n");
    out.push_str("   <soapenv:Body>\n");

    if envelope.params.is_empty() {
        let _ = writeln!(out, "      <loan:{}/>", envelope.operation);
    } else {
        let _ = writeln!(out, "      <loan:{}>", envelope.operation);
        for (name, value) in &envelope.params {
            leaf(&mut out, 9, name, value);
        }
        let _ = writeln!(out, "      </loan:{}>", envelope.operation);
    }

    out.push_str("   </soapenv:Body>\n");
    out.push_str("</soapenv:Envelope>");
    out
}

fn operation_element(root: &Element) -> Result<&Element, ProtocolError> {
    if root.name != "Envelope" {
        return Ok(root);
    }
    root.child("Body")
        .ok_or(ProtocolError::MissingElement("Body"))?
        .first_child()
        .ok_or(ProtocolError::MissingElement("operation"))
}

// ============================================================================
// Responses
// ============================================================================

pub fn encode_reply(reply: &Reply) -> String {
    match reply {
        Reply::Operation(response) => encode_response(response),
        Reply::Fault(fault) => encode_fault(fault),
    }
}

pub fn encode_response(response: &OperationResponse) -> String {
    let element = response.operation.response_element();

    let mut body = String::new();
    match &response.body {
        ResponseBody::Loan(Ok(loan)) => {
            write_loan(&mut body, loan);
            leaf(&mut body, 6, "error", "");
        }
        ResponseBody::Loan(Err(e)) => {
            leaf(&mut body, 6, "error", &e.message);
            if let Some(code) = e.code {
                leaf(&mut body, 6, "errorCode", code.as_str());
            }
        }
        ResponseBody::Loans(loans) => {
            for loan in loans {
                write_loan(&mut body, loan);
            }
        }
    }

    let mut out = soap_open();
    let _ = writeln!(out, "    <{} xmlns=\"{}\">", element, LOAN_NS);
    out.push_str(&body);
    let _ = writeln!(out, "    </{}>", element);
    out.push_str(SOAP_CLOSE);
    out
}

pub fn encode_fault(fault: &Fault) -> String {
    let mut out = soap_open();
    out.push_str("    <soap:Fault>\n");
    leaf(&mut out, 6, "faultcode", fault.side.as_code());
    leaf(&mut out, 6, "faultstring", &fault.message);
    out.push_str("    </soap:Fault>\n");
    out.push_str(SOAP_CLOSE);
    out
}

/// Decodes a response envelope into a reply.
pub fn decode_reply(raw: &str) -> Result<Reply, ProtocolError> {
    let root = xml::parse(raw)?;
    let element = operation_element(&root)?;

    if element.name == "Fault" {
        let side = match element.child_text("faultcode").map(str::trim) {
            Some(code) if code.ends_with("Client") => FaultSide::Client,
            _ => FaultSide::Server,
        };
        let message = element.child_text("faultstring").unwrap_or_default();
        return Ok(Reply::Fault(Fault {
            side,
            message: message.to_string(),
        }));
    }

    let name = element
        .name
        .strip_suffix("Response")
        .ok_or_else(|| ProtocolError::UnknownOperation(element.name.clone()))?;
    let operation = name.parse::<OperationName>()?;

    let body = if operation.returns_single_loan() {
        let error = element.child_text("error").map(str::trim).unwrap_or("");
        if error.is_empty() {
            let loan = element
                .child("loan")
                .ok_or(ProtocolError::MissingElement("loan"))?;
            ResponseBody::Loan(Ok(decode_loan(loan)?))
        } else {
            let code = element
                .child_text("errorCode")
                .and_then(|c| c.trim().parse::<FaultCode>().ok());
            ResponseBody::Loan(Err(WireError {
                code,
                message: error.to_string(),
            }))
        }
    } else {
        let loans = element
            .children_named("loan")
            .map(decode_loan)
            .collect::<Result<Vec<_>, _>>()?;
        ResponseBody::Loans(loans)
    };

    Ok(Reply::Operation(OperationResponse { operation, body }))
}

fn decode_loan(element: &Element) -> Result<Loan, ProtocolError> {
    let text = |tag: &'static str| -> Result<&str, ProtocolError> {
        element
            .child_text(tag)
            .map(str::trim)
            .ok_or(ProtocolError::MissingElement(tag))
    };
    let integer = |tag: &'static str| -> Result<i64, ProtocolError> {
        let value = text(tag)?;
        value
            .parse::<i64>()
            .map_err(|_| ProtocolError::InvalidParameter {
                tag: tag.to_string(),
                value: value.to_string(),
            })
    };

    let return_date = match element.child_text("returnDate").map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(parse_timestamp("returnDate", value)?),
    };

    let status_text = text("status")?;
    let status =
        status_text
            .parse::<LoanStatus>()
            .map_err(|_| ProtocolError::InvalidParameter {
                tag: "status".to_string(),
                value: status_text.to_string(),
            })?;

    Ok(Loan {
        id: LoanId::new(integer("id")?),
        user_id: UserId::new(integer("userId")?),
        book_id: BookId::new(integer("bookId")?),
        loan_date: parse_timestamp("loanDate", text("loanDate")?)?,
        due_date: parse_timestamp("dueDate", text("dueDate")?)?,
        return_date,
        status,
    })
}

const SOAP_CLOSE: &str = "  </soap:Body>\n</soap:Envelope>";

fn soap_open() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<soap:Envelope xmlns:soap=\"{}\">\n  <soap:Body>\n",
        SOAP_ENV_NS
    )
}

fn leaf(out: &mut String, indent: usize, name: &str, value: &str) {
    let _ = writeln!(
        out,
        "{:indent$}<{name}>{}</{name}>",
        "",
        escape(value),
        indent = indent,
        name = name
    );
}

fn write_loan(out: &mut String, loan: &Loan) {
    let return_date = loan
        .return_date
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_default();

    out.push_str("      <loan>\n");
    leaf(out, 8, "id", &loan.id.to_string());
    leaf(out, 8, "userId", &loan.user_id.to_string());
    leaf(out, 8, "bookId", &loan.book_id.to_string());
    leaf(out, 8, "loanDate", &format_timestamp(&loan.loan_date));
    leaf(out, 8, "dueDate", &format_timestamp(&loan.due_date));
    leaf(out, 8, "returnDate", &return_date);
    leaf(out, 8, "status", loan.status.as_str());
    out.push_str("      </loan>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_loan(returned: bool) -> Loan {
        let loan_date = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        Loan {
            id: LoanId::new(1),
            user_id: UserId::new(3),
            book_id: BookId::new(7),
            loan_date,
            due_date: loan_date + Duration::days(14),
            return_date: returned.then(|| loan_date + Duration::days(2)),
            status: if returned {
                LoanStatus::Returned
            } else {
                LoanStatus::Active
            },
        }
    }

    #[test]
    fn test_request_round_trip_for_every_operation() {
        let cases = [
            (OperationName::CreateLoan, vec![("userId", "3"), ("bookId", "7")]),
            (OperationName::ReturnLoan, vec![("loanId", "1")]),
            (OperationName::GetLoansByUser, vec![("userId", "3")]),
            (OperationName::GetLoanById, vec![("loanId", "1")]),
            (OperationName::GetAllLoans, vec![]),
        ];

        for (operation, params) in cases {
            let envelope = params
                .into_iter()
                .fold(Envelope::new(operation), |env, (k, v)| env.with_param(k, v));

            let decoded = decode_envelope(&encode_envelope(&envelope)).unwrap();

            assert_eq!(decoded, envelope);
        }
    }

    #[test]
    fn test_request_round_trip_with_reserved_characters() {
        let envelope = Envelope::new(OperationName::GetLoanById)
            .with_param("loanId", r#"1</loanId><loanId>2 & "x" 'y'"#);

        let raw = encode_envelope(&envelope);
        assert!(!raw.contains("</loanId><loanId>2"));

        let decoded = decode_envelope(&raw).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_tolerates_request_suffix_and_whitespace() {
        let raw = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <returnLoanRequest xmlns="http://library.example.com/loan">
      <loanId>5</loanId>
    </returnLoanRequest>
  </soap:Body>
</soap:Envelope>"#;

        let envelope = decode_envelope(raw).unwrap();

        assert_eq!(envelope.operation, "returnLoan");
        assert_eq!(envelope.param("loanId"), Some("5"));
    }

    #[test]
    fn test_decode_keeps_first_duplicate_param() {
        let envelope =
            decode_envelope("<getLoanById><loanId>1</loanId><loanId>2</loanId></getLoanById>")
                .unwrap();
        assert_eq!(envelope.param("loanId"), Some("1"));
    }

    #[test]
    fn test_decode_rejects_envelope_without_body() {
        let err = decode_envelope(&format!(
            "<soap:Envelope xmlns:soap=\"{}\"><soap:Header/></soap:Envelope>",
            SOAP_ENV_NS
        ))
        .unwrap_err();
        assert_eq!(err, ProtocolError::MissingElement("Body"));
    }

    #[test]
    fn test_single_loan_response_round_trip() {
        for returned in [false, true] {
            let reply = Reply::Operation(OperationResponse {
                operation: OperationName::ReturnLoan,
                body: ResponseBody::Loan(Ok(sample_loan(returned))),
            });

            let raw = encode_reply(&reply);

            assert_eq!(decode_reply(&raw).unwrap(), reply);
        }
    }

    #[test]
    fn test_unset_return_date_is_an_empty_element() {
        let raw = encode_response(&OperationResponse {
            operation: OperationName::GetLoanById,
            body: ResponseBody::Loan(Ok(sample_loan(false))),
        });

        assert!(raw.contains("<returnDate></returnDate>"));
        assert!(raw.contains("<error></error>"));
        assert!(raw.contains("<loanDate>2024-05-01T10:00:00.000000Z</loanDate>"));
    }

    #[test]
    fn test_error_response_is_escaped_and_round_trips() {
        let reply = Reply::Operation(OperationResponse {
            operation: OperationName::CreateLoan,
            body: ResponseBody::Loan(Err(WireError {
                code: Some(FaultCode::Conflict),
                message: "Book <7> is not available & \"reserved\"".to_string(),
            })),
        });

        let raw = encode_reply(&reply);
        assert!(raw.contains("Book &lt;7&gt; is not available &amp; &quot;reserved&quot;"));
        assert!(!raw.contains("<loan>"));

        assert_eq!(decode_reply(&raw).unwrap(), reply);
    }

    #[test]
    fn test_list_response_round_trip() {
        for loans in [vec![], vec![sample_loan(true), sample_loan(false)]] {
            let reply = Reply::Operation(OperationResponse {
                operation: OperationName::GetAllLoans,
                body: ResponseBody::Loans(loans),
            });

            assert_eq!(decode_reply(&encode_reply(&reply)).unwrap(), reply);
        }
    }

    #[test]
    fn test_fault_round_trip() {
        for fault in [
            Fault::client("Unknown operation"),
            Fault::server("Internal server error <&>"),
        ] {
            let reply = Reply::Fault(fault);
            assert_eq!(decode_reply(&encode_reply(&reply)).unwrap(), reply);
        }
    }

    #[test]
    fn test_legacy_error_without_code() {
        let raw = format!(
            "<soap:Envelope xmlns:soap=\"{}\"><soap:Body><getLoanByIdResponse><error>Loan not found</error></getLoanByIdResponse></soap:Body></soap:Envelope>",
            SOAP_ENV_NS
        );

        let reply = decode_reply(&raw).unwrap();

        assert_eq!(
            reply,
            Reply::Operation(OperationResponse {
                operation: OperationName::GetLoanById,
                body: ResponseBody::Loan(Err(WireError {
                    code: None,
                    message: "Loan not found".to_string(),
                })),
            })
        );
    }

    #[test]
    fn test_response_with_bad_date_is_rejected() {
        let raw = encode_response(&OperationResponse {
            operation: OperationName::GetLoanById,
            body: ResponseBody::Loan(Ok(sample_loan(false))),
        })
        .replace("2024-05-01T10:00:00.000000Z", "yesterday");

        assert!(matches!(
            decode_reply(&raw),
            Err(ProtocolError::InvalidParameter { .. })
        ));
    }
}
