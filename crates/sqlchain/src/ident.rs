//! Database object names.
//!
//! [`ObjectName`] is the schema-qualified name of a table, view, procedure or
//! function. It parses plain dotted names as well as `[bracketed]` (SQL
//! Server / Access) and `"quoted"` (PostgreSQL) parts.
//!
//! - Unquoted parts are validated against: `[A-Za-z_][A-Za-z0-9_$]*`
//! - Delimited parts allow any characters except NUL; the closing delimiter
//!   is escaped by doubling it (`]]` or `""`)
//!
//! # Example
//! ```ignore
//! use sqlchain::ObjectName;
//!
//! let t = ObjectName::parse("dbo.Employee")?;
//! let u = ObjectName::parse("[HR].[Employee Notes]")?;
//! # Ok::<(), sqlchain::ChainError>(())
//! ```

use crate::error::{ChainError, ChainResult};
use std::fmt;

/// A schema-qualified object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectName {
    pub schema: Option<String>,
    pub name: String,
}

impl ObjectName {
    /// Create a name from its parts without validation.
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Parse an object name, supporting dotted, bracketed and quoted forms.
    ///
    /// - Dotted: `schema.table`
    /// - Bracketed: `[dbo].[Order Details]`
    /// - Quoted: `"public"."UserTable"`
    pub fn parse(s: &str) -> ChainResult<Self> {
        if s.is_empty() {
            return Err(ChainError::ArgumentEmpty("name"));
        }
        if s.contains('\0') {
            return Err(ChainError::InvalidArgument(
                "Object name cannot contain NUL character".to_string(),
            ));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            // Consume '.' between parts (but require there is a next part).
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(invalid(s, "trailing '.'"));
                        }
                    }
                    Some(c) => {
                        return Err(invalid(s, &format!("expected '.' between parts, got '{c}'")));
                    }
                    None => break,
                }
            }

            let close = match chars.peek() {
                Some('"') => Some('"'),
                Some('[') => Some(']'),
                _ => None,
            };

            // Delimited part.
            if let Some(close) = close {
                chars.next(); // opening delimiter
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == close => {
                            if chars.peek() == Some(&close) {
                                chars.next();
                                name.push(close);
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(invalid(s, "unclosed delimiter")),
                    }
                }
                if name.is_empty() {
                    return Err(invalid(s, "empty delimited part"));
                }
                parts.push(name);
                continue;
            }

            // Unquoted part.
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                let ok = if name.is_empty() {
                    c == '_' || c.is_ascii_alphabetic()
                } else {
                    c == '_' || c == '$' || c.is_ascii_alphanumeric()
                };
                if !ok {
                    return Err(invalid(s, &format!("invalid character '{c}'")));
                }
                name.push(c);
                chars.next();
            }
            if name.is_empty() {
                return Err(invalid(s, "empty segment"));
            }
            parts.push(name);
        }

        match parts.len() {
            1 => Ok(Self {
                schema: None,
                name: parts.remove(0),
            }),
            2 => {
                let name = parts.remove(1);
                Ok(Self {
                    schema: Some(parts.remove(0)),
                    name,
                })
            }
            n => Err(invalid(s, &format!("expected at most 2 parts, got {n}"))),
        }
    }

    /// Fill in `schema` when the name was written without one.
    pub fn or_schema(mut self, default_schema: Option<&str>) -> Self {
        if self.schema.is_none() {
            self.schema = default_schema.map(str::to_string);
        }
        self
    }

    /// Case-insensitive cache key.
    pub fn cache_key(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema.to_lowercase(), self.name.to_lowercase()),
            None => self.name.to_lowercase(),
        }
    }

    /// Case-insensitive comparison where a missing schema on `self` matches any schema.
    pub fn matches(&self, other: &ObjectName) -> bool {
        if !self.name.eq_ignore_ascii_case(&other.name) {
            return false;
        }
        match (&self.schema, &other.schema) {
            (None, _) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (Some(_), None) => false,
        }
    }

    /// Render the name with each part passed through `quote`.
    pub fn to_quoted(&self, quote: impl Fn(&str) -> String) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote(schema), quote(&self.name)),
            None => quote(&self.name),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn invalid(input: &str, reason: &str) -> ChainError {
    ChainError::InvalidArgument(format!("Invalid object name '{input}': {reason}"))
}

/// Quote with square brackets, escaping `]` as `]]`.
pub fn quote_bracketed(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('[');
    for ch in name.chars() {
        if ch == ']' {
            out.push_str("]]");
        } else {
            out.push(ch);
        }
    }
    out.push(']');
    out
}

/// Quote with double quotes, escaping `"` as `""`.
pub fn quote_double(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out
}

/// Returns `true` if `name` is usable without delimiters: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Strip characters that cannot appear in a host-language identifier.
pub(crate) fn clr_safe_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c == '_' || c.is_ascii_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_simple() {
        let n = ObjectName::parse("Employee").unwrap();
        assert_eq!(n.schema, None);
        assert_eq!(n.name, "Employee");
    }

    #[test]
    fn name_dotted() {
        let n = ObjectName::parse("HR.Employee").unwrap();
        assert_eq!(n.schema.as_deref(), Some("HR"));
        assert_eq!(n.to_string(), "HR.Employee");
    }

    #[test]
    fn name_bracketed_with_escape() {
        let n = ObjectName::parse("[dbo].[Order]]Details]").unwrap();
        assert_eq!(n.name, "Order]Details");
        assert_eq!(n.to_quoted(quote_bracketed), "[dbo].[Order]]Details]");
    }

    #[test]
    fn name_quoted() {
        let n = ObjectName::parse(r#""public"."UserTable""#).unwrap();
        assert_eq!(n.to_quoted(quote_double), r#""public"."UserTable""#);
    }

    #[test]
    fn cache_key_ignores_case() {
        let a = ObjectName::parse("HR.Employee").unwrap();
        let b = ObjectName::parse("[hr].[EMPLOYEE]").unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn default_schema_only_when_missing() {
        let n = ObjectName::parse("Employee").unwrap().or_schema(Some("dbo"));
        assert_eq!(n.to_string(), "dbo.Employee");
        let n = ObjectName::parse("HR.Employee").unwrap().or_schema(Some("dbo"));
        assert_eq!(n.to_string(), "HR.Employee");
    }

    #[test]
    fn name_rejects_bad_input() {
        assert!(ObjectName::parse("").is_err());
        assert!(ObjectName::parse("1table").is_err());
        assert!(ObjectName::parse("my table").is_err());
        assert!(ObjectName::parse("a..b").is_err());
        assert!(ObjectName::parse("a.").is_err());
        assert!(ObjectName::parse("[open").is_err());
        assert!(ObjectName::parse("a.b.c").is_err());
    }

    #[test]
    fn plain_identifier_check() {
        assert!(is_plain_identifier("first_name"));
        assert!(!is_plain_identifier("First Name"));
        assert!(!is_plain_identifier("9lives"));
        assert_eq!(clr_safe_name("Order Details"), "OrderDetails");
    }
}
