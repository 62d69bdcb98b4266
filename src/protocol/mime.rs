//! Media type parsing
//!
//! Parses `Content-Type` values of the form
//! `type/subtype; name=value; name="quoted value"` (RFC 2045 section 5.1).
//! Parameter names are case-insensitive; values keep their case.

use crate::error::ProtocolError;

/// Parsed media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lowercased `type/subtype`
    pub essence: String,
    /// Parameters in order of appearance, names lowercased
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// Parse a `Content-Type` header value
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let invalid = |why: &str| ProtocolError::InvalidMediaType(format!("{why}: {value:?}"));

        let (essence, mut rest) = match value.find(';') {
            Some(idx) => (&value[..idx], &value[idx + 1..]),
            None => (value, ""),
        };

        let essence = essence.trim().to_ascii_lowercase();
        let (ty, subtype) = essence
            .split_once('/')
            .ok_or_else(|| invalid("missing '/'"))?;
        if !is_token(ty) || !is_token(subtype) {
            return Err(invalid("bad type or subtype"));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
            if rest.is_empty() {
                break;
            }

            let eq = rest.find('=').ok_or_else(|| invalid("parameter without '='"))?;
            let name = rest[..eq].trim().to_ascii_lowercase();
            if !is_token(&name) {
                return Err(invalid("bad parameter name"));
            }
            rest = rest[eq + 1..].trim_start();

            let (val, remaining) = if let Some(quoted) = rest.strip_prefix('"') {
                parse_quoted(quoted).ok_or_else(|| invalid("unterminated quoted string"))?
            } else {
                let end = rest.find(';').unwrap_or(rest.len());
                (rest[..end].trim().to_string(), &rest[end..])
            };

            params.push((name, val));
            rest = remaining;
        }

        Ok(Self { essence, params })
    }

    /// Look up a parameter by name (case-insensitive)
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether this is any `multipart/*` type
    pub fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }
}

/// Parse the body of a quoted string (after the opening quote)
///
/// Returns the unescaped value and the input following the closing quote.
fn parse_quoted(input: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Some((out, &input[idx + 1..])),
            '\\' => out.push(chars.next()?.1),
            c => out.push(c),
        }
    }
    None
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
}
