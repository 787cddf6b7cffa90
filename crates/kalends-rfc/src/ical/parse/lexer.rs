//! Content line lexer: unfolding and `name;params:value` splitting
//! (RFC 5545 §3.1).

use super::error::{ParseError, ParseErrorKind, ParseResult};

/// A property parameter (`TZID=America/New_York`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name, normalized to uppercase.
    pub name: String,
    /// Parameter value, unquoted.
    pub value: String,
}

/// One unfolded logical line, split into name, parameters, and raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Property name, normalized to uppercase.
    pub name: String,
    /// Parameters in order of appearance.
    pub params: Vec<Parameter>,
    /// Everything after the value separator, untouched.
    pub raw_value: String,
}

impl ContentLine {
    /// Returns the value of the named parameter, if present.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        let upper = name.to_ascii_uppercase();
        self.params
            .iter()
            .find(|p| p.name == upper)
            .map(|p| p.value.as_str())
    }

    /// Returns the TZID parameter if present.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        self.param("TZID")
    }
}

/// Splits input into logical lines, merging folded continuations.
///
/// A physical line starting with SP or HTAB continues the previous logical
/// line; the terminator and the single whitespace byte are removed. Handles
/// both CRLF and bare LF endings. Returns `(line_number, line)` pairs, with
/// the number taken from the first physical line of each logical line.
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (i, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            if let Some((_, prev)) = lines.last_mut() {
                prev.push_str(continuation);
            } else {
                lines.push((i + 1, continuation.to_string()));
            }
        } else {
            lines.push((i + 1, line.to_string()));
        }
    }

    lines
}

/// Parses a single content line.
///
/// Format: `name *(";" param) ":" value`
///
/// ## Errors
/// Returns an error if the line is malformed: no `:`, empty or invalid
/// property name, malformed parameter, or unclosed quote.
pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let name_end = line.find([';', ':']).ok_or_else(|| {
        ParseError::new(ParseErrorKind::MissingColon, line_num, "no ':' in line")
    })?;
    if name_end == 0 {
        return Err(ParseError::new(
            ParseErrorKind::MissingPropertyName,
            line_num,
            "line starts with separator",
        ));
    }

    let name = line[..name_end].to_ascii_uppercase();
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(ParseError::new(
            ParseErrorKind::InvalidPropertyName,
            line_num,
            name,
        ));
    }

    let mut params = Vec::new();
    let mut rest = &line[name_end..];
    while let Some(stripped) = rest.strip_prefix(';') {
        let (param, remainder) = parse_parameter(stripped, line_num)?;
        params.push(param);
        rest = remainder;
    }

    let value = rest.strip_prefix(':').ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MissingColon,
            line_num,
            "parameters not terminated by ':'",
        )
    })?;

    Ok(ContentLine {
        name,
        params,
        raw_value: value.to_string(),
    })
}

/// Parses one parameter; returns it plus the remaining input (starting at
/// `;`, `:`, or empty).
fn parse_parameter(input: &str, line_num: usize) -> ParseResult<(Parameter, &str)> {
    let eq = input.find('=').ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            "parameter without '='",
        )
    })?;
    if eq == 0 {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            "empty parameter name",
        ));
    }
    let name = input[..eq].to_ascii_uppercase();

    let rest = &input[eq + 1..];
    if let Some(quoted) = rest.strip_prefix('"') {
        let close = quoted
            .find('"')
            .ok_or_else(|| ParseError::new(ParseErrorKind::UnclosedQuote, line_num, name.clone()))?;
        let value = quoted[..close].to_string();
        Ok((Parameter { name, value }, &quoted[close + 1..]))
    } else {
        let end = rest.find([';', ':']).unwrap_or(rest.len());
        let value = rest[..end].to_string();
        Ok((Parameter { name, value }, &rest[end..]))
    }
}
