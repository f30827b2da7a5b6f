//! Table-name validation and column quoting.
//!
//! A table name is one or more dot-separated segments. A bare segment starts
//! with a letter or `_` and continues with letters, digits, `_` or `$`; it is
//! rendered as written and left to Postgres' case folding. A segment wrapped
//! in double quotes may hold anything except NUL, with `""` standing for a
//! literal quote, and keeps its exact spelling.
//!
//! Column names never go through [`Ident`]: they are always emitted with
//! [`quote`], so `createdAt` stays `createdAt`.

use crate::error::{OrmError, OrmResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    quoted: bool,
}

/// A table name that is safe to splice into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    segments: Vec<Segment>,
}

impl Ident {
    pub fn parse(name: &str) -> OrmResult<Self> {
        if name.is_empty() {
            return Err(OrmError::validation("table name can not be empty"));
        }
        if name.contains('\0') {
            return Err(invalid(name, "NUL is not allowed"));
        }

        let mut segments = Vec::new();
        let mut rest = name;
        loop {
            let (segment, tail) = match rest.strip_prefix('"') {
                Some(quoted) => quoted_segment(name, quoted)?,
                None => bare_segment(name, rest)?,
            };
            segments.push(segment);
            if tail.is_empty() {
                break;
            }
            rest = tail
                .strip_prefix('.')
                .ok_or_else(|| invalid(name, "a quoted segment must be followed by '.'"))?;
        }
        Ok(Self { segments })
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }

    /// Segment names joined with `_`, for generated names such as indexes.
    pub fn to_flat_name(&self) -> String {
        let names: Vec<&str> = self.segments.iter().map(|s| s.name.as_str()).collect();
        names.join("_")
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if segment.quoted {
                f.write_str(&quote(&segment.name))?;
            } else {
                f.write_str(&segment.name)?;
            }
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> OrmError {
    OrmError::validation(format!("invalid table name '{name}': {reason}"))
}

/// Splits the bare segment at the front of `rest`; the tail keeps its `.`.
fn bare_segment<'s>(name: &str, rest: &'s str) -> OrmResult<(Segment, &'s str)> {
    let end = rest.find('.').unwrap_or(rest.len());
    let (segment, tail) = rest.split_at(end);

    let mut chars = segment.chars();
    match chars.next() {
        None => return Err(invalid(name, "empty segment")),
        Some(c) if !(c == '_' || c.is_ascii_alphabetic()) => {
            return Err(invalid(name, "a segment must start with a letter or '_'"));
        }
        Some(_) => {}
    }
    if let Some(c) = chars.find(|&c| !(c == '_' || c == '$' || c.is_ascii_alphanumeric())) {
        return Err(invalid(name, &format!("unexpected character '{c}'")));
    }

    Ok((
        Segment {
            name: segment.to_string(),
            quoted: false,
        },
        tail,
    ))
}

/// `body` starts just past the opening quote.
fn quoted_segment<'s>(name: &str, body: &'s str) -> OrmResult<(Segment, &'s str)> {
    let mut unescaped = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            unescaped.push(c);
            continue;
        }
        let after = &body[i + 1..];
        if after.starts_with('"') {
            chars.next();
            unescaped.push('"');
            continue;
        }
        if unescaped.is_empty() {
            return Err(invalid(name, "empty quoted segment"));
        }
        let segment = Segment {
            name: unescaped,
            quoted: true,
        };
        return Ok((segment, after));
    }
    Err(invalid(name, "unterminated quote"))
}

/// Double-quote a column name, doubling any embedded quotes.
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
