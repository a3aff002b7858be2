//! Service description served on `GET` of the endpoint paths.

use std::fmt::Write as _;

use super::codec::LOAN_NS;
use super::operation::OperationName;

/// Request parameters per operation, in document order.
fn request_params(op: OperationName) -> &'static [&'static str] {
    match op {
        OperationName::CreateLoan => &["userId", "bookId"],
        OperationName::ReturnLoan | OperationName::GetLoanById => &["loanId"],
        OperationName::GetLoansByUser => &["userId"],
        OperationName::GetAllLoans => &[],
    }
}

/// Renders the description for every operation, bound to `location`.
pub fn describe(location: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\"?>\n");
    let _ = writeln!(
        out,
        "<definitions xmlns=\"http://schemas.xmlsoap.org/wsdl/\"\n             xmlns:soap=\"http://schemas.xmlsoap.org/wsdl/soap/\"\n             xmlns:tns=\"{ns}\"\n             targetNamespace=\"{ns}\">",
        ns = LOAN_NS
    );

    out.push_str("  <types>\n");
    let _ = writeln!(
        out,
        "    <xsd:schema xmlns:xsd=\"http://www.w3.org/2001/XMLSchema\" targetNamespace=\"{}\">",
        LOAN_NS
    );
    for op in OperationName::ALL {
        let _ = writeln!(out, "      <xsd:element name=\"{}Request\">", op);
        out.push_str("        <xsd:complexType>\n          <xsd:sequence>\n");
        for param in request_params(op) {
            let _ = writeln!(
                out,
                "            <xsd:element name=\"{}\" type=\"xsd:integer\"/>",
                param
            );
        }
        out.push_str("          </xsd:sequence>\n        </xsd:complexType>\n      </xsd:element>\n");

        let _ = writeln!(out, "      <xsd:element name=\"{}\">", op.response_element());
        out.push_str("        <xsd:complexType>\n          <xsd:sequence>\n");
        if op.returns_single_loan() {
            out.push_str("            <xsd:element name=\"loan\" type=\"tns:loanType\" minOccurs=\"0\"/>\n");
            out.push_str("            <xsd:element name=\"error\" type=\"xsd:string\" minOccurs=\"0\"/>\n");
            out.push_str("            <xsd:element name=\"errorCode\" type=\"xsd:string\" minOccurs=\"0\"/>\n");
        } else {
            out.push_str("            <xsd:element name=\"loan\" type=\"tns:loanType\" minOccurs=\"0\" maxOccurs=\"unbounded\"/>\n");
        }
        out.push_str("          </xsd:sequence>\n        </xsd:complexType>\n      </xsd:element>\n");
    }
    out.push_str(
        r#"      <xsd:complexType name="loanType">
        <xsd:sequence>
          <xsd:element name="id" type="xsd:integer"/>
          <xsd:element name="userId" type="xsd:integer"/>
          <xsd:element name="bookId" type="xsd:integer"/>
          <xsd:element name="loanDate" type="xsd:dateTime"/>
          <xsd:element name="dueDate" type="xsd:dateTime"/>
          <xsd:element name="returnDate" type="xsd:dateTime" minOccurs="0"/>
          <xsd:element name="status" type="xsd:string"/>
        </xsd:sequence>
      </xsd:complexType>
"#,
    );
    out.push_str("    </xsd:schema>\n  </types>\n");

    for op in OperationName::ALL {
        let _ = writeln!(
            out,
            "  <message name=\"{op}Request\">\n    <part name=\"parameters\" element=\"tns:{op}Request\"/>\n  </message>",
            op = op
        );
        let _ = writeln!(
            out,
            "  <message name=\"{resp}\">\n    <part name=\"parameters\" element=\"tns:{resp}\"/>\n  </message>",
            resp = op.response_element()
        );
    }

    out.push_str("  <portType name=\"LoanServicePortType\">\n");
    for op in OperationName::ALL {
        let _ = writeln!(
            out,
            "    <operation name=\"{op}\">\n      <input message=\"tns:{op}Request\"/>\n      <output message=\"tns:{resp}\"/>\n    </operation>",
            op = op,
            resp = op.response_element()
        );
    }
    out.push_str("  </portType>\n");

    out.push_str("  <binding name=\"LoanServiceBinding\" type=\"tns:LoanServicePortType\">\n");
    out.push_str("    <soap:binding style=\"document\" transport=\"http://schemas.xmlsoap.org/soap/http\"/>\n");
    for op in OperationName::ALL {
        let _ = writeln!(
            out,
            "    <operation name=\"{op}\">\n      <soap:operation soapAction=\"{op}\"/>\n      <input>\n        <soap:body use=\"literal\"/>\n      </input>\n      <output>\n        <soap:body use=\"literal\"/>\n      </output>\n    </operation>",
            op = op
        );
    }
    out.push_str("  </binding>\n");

    let _ = writeln!(
        out,
        "  <service name=\"LoanService\">\n    <port name=\"LoanServicePort\" binding=\"tns:LoanServiceBinding\">\n      <soap:address location=\"{}\"/>\n    </port>\n  </service>",
        super::xml::escape(location)
    );
    out.push_str("</definitions>\n");
    out
}
