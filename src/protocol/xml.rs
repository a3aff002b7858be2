//! Minimal element-tree reader for the loan envelope format.
//!
//! Only what the envelopes use is supported: elements, text, CDATA, comments,
//! processing instructions and the predefined/numeric character references.
//! Attributes are skipped and namespace prefixes are dropped from names.

use super::error::ProtocolError;

const MAX_DEPTH: usize = 64;

/// A parsed element. `name` is the local name (prefix stripped).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub children: Vec<Element>,
    /// Concatenated, unescaped character data directly inside this element.
    pub text: String,
}

impl Element {
    /// First child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Text of a leaf child, or `None` when the child is absent.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

/// Parses a complete document into its root element.
pub fn parse(input: &str) -> Result<Element, ProtocolError> {
    let mut parser = Parser { src: input, pos: 0 };
    parser.skip_misc()?;
    let root = parser.parse_element(0)?;
    parser.skip_misc()?;
    if parser.pos < parser.src.len() {
        return Err(ProtocolError::TrailingContent);
    }
    Ok(root)
}

/// Escapes the five reserved markup characters.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolves predefined and numeric character references.
pub fn unescape(value: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or(ProtocolError::UnexpectedEof)?;
        let entity = &after[..semi];

        match entity {
            "amp" => out.push('&'),
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "quot" => out.push('"'),
            "apos" => out.push('\''),
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok()
                } else {
                    None
                };
                let c = code
                    .and_then(char::from_u32)
                    .ok_or_else(|| ProtocolError::UnknownEntity(entity.to_string()))?;
                out.push(c);
            }
        }

        rest = &after[semi + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn local_name(qualified: &str) -> &str {
    qualified
        .rsplit_once(':')
        .map(|(_, local)| local)
        .unwrap_or(qualified)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        let src = self.src;
        &src[self.pos..]
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Advances past `terminator`, returning the text before it.
    fn take_until(&mut self, terminator: &str) -> Result<&'a str, ProtocolError> {
        let rest = self.rest();
        let end = rest.find(terminator).ok_or(ProtocolError::UnexpectedEof)?;
        self.pos += end + terminator.len();
        Ok(&rest[..end])
    }

    /// Skips whitespace, the prolog, comments, processing instructions and doctype.
    fn skip_misc(&mut self) -> Result<(), ProtocolError> {
        loop {
            self.skip_whitespace();
            if self.starts_with("<?") {
                self.take_until("?>")?;
            } else if self.starts_with("<!--") {
                self.take_until("-->")?;
            } else if self.starts_with("<!DOCTYPE") {
                self.take_until(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn read_name(&mut self) -> Result<&'a str, ProtocolError> {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .ok_or(ProtocolError::UnexpectedEof)?;
        if end == 0 {
            return Err(ProtocolError::Malformed(self.pos));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    /// Skips attributes up to the end of the start tag.
    /// Returns `true` for a self-closing tag.
    fn skip_attributes(&mut self) -> Result<bool, ProtocolError> {
        let mut quote: Option<char> = None;
        let mut prev = ' ';

        for (offset, c) in self.rest().char_indices() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '>' => {
                        self.pos += offset + 1;
                        return Ok(prev == '/');
                    }
                    '<' => return Err(ProtocolError::Malformed(self.pos + offset)),
                    _ => {}
                },
            }
            if !c.is_whitespace() {
                prev = c;
            }
        }

        Err(ProtocolError::UnexpectedEof)
    }

    fn parse_element(&mut self, depth: usize) -> Result<Element, ProtocolError> {
        if depth >= MAX_DEPTH {
            return Err(ProtocolError::TooDeep(MAX_DEPTH));
        }
        if !self.starts_with("<") {
            return Err(if self.pos >= self.src.len() {
                ProtocolError::UnexpectedEof
            } else {
                ProtocolError::Malformed(self.pos)
            });
        }
        self.pos += 1;

        let qualified = self.read_name()?;
        let mut element = Element {
            name: local_name(qualified).to_string(),
            ..Element::default()
        };

        if self.skip_attributes()? {
            return Ok(element);
        }

        loop {
            if self.pos >= self.src.len() {
                return Err(ProtocolError::UnexpectedEof);
            }

            if self.starts_with("</") {
                self.pos += 2;
                let closing = self.read_name()?;
                self.skip_whitespace();
                if !self.starts_with(">") {
                    return Err(ProtocolError::Malformed(self.pos));
                }
                self.pos += 1;
                if closing != qualified {
                    return Err(ProtocolError::MismatchedTag {
                        expected: qualified.to_string(),
                        found: closing.to_string(),
                    });
                }
                return Ok(element);
            } else if self.starts_with("<!--") {
                self.take_until("-->")?;
            } else if self.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let data = self.take_until("]]>")?;
                element.text.push_str(data);
            } else if self.starts_with("<?") {
                self.take_until("?>")?;
            } else if self.starts_with("<") {
                let child = self.parse_element(depth + 1)?;
                element.children.push(child);
            } else {
                let rest = self.rest();
                let end = rest.find('<').unwrap_or(rest.len());
                element.text.push_str(&unescape(&rest[..end])?);
                self.pos += end;
            }
        }
    }
}
