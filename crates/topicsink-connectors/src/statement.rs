//! Named-parameter statements.
//!
//! Statements are configured with `:name` placeholders, e.g.
//!
//! ```text
//! UPDATE orders SET status = :status WHERE id = :id
//! ```
//!
//! `NamedStatement::parse` rewrites them to positional `$1..$n` placeholders,
//! which both PostgreSQL and SQLite accept, and records which attribute each
//! position binds. A name used twice binds the same position twice.
//!
//! Text inside single-quoted literals and double-quoted identifiers is copied
//! verbatim, and `::` (a PostgreSQL cast) is not a placeholder.

use crate::error::{ConnectorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    /// 1-based parameter position.
    Param(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStatement {
    segments: Vec<Segment>,
    sql: String,
    parameters: Vec<String>,
}

impl NamedStatement {
    pub fn parse(sql: &str) -> Result<Self> {
        if sql.trim().is_empty() {
            return Err(ConnectorError::ConfigError(
                "sql statement must not be empty".to_string(),
            ));
        }

        let mut segments: Vec<Segment> = Vec::new();
        let mut out = String::with_capacity(sql.len());
        let mut parameters: Vec<String> = Vec::new();
        let mut chars = sql.chars().peekable();
        let mut quote: Option<char> = None;

        while let Some(c) = chars.next() {
            if let Some(q) = quote {
                out.push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }

            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    out.push(c);
                }
                ':' if chars.peek() == Some(&':') => {
                    out.push_str("::");
                    chars.next();
                }
                ':' if chars.peek().is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if n.is_ascii_alphanumeric() || n == '_' {
                            name.push(n);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let position = match parameters.iter().position(|p| *p == name) {
                        Some(i) => i + 1,
                        None => {
                            parameters.push(name);
                            parameters.len()
                        }
                    };
                    segments.push(Segment::Text(std::mem::take(&mut out)));
                    segments.push(Segment::Param(position));
                }
                _ => out.push(c),
            }
        }

        if let Some(q) = quote {
            return Err(ConnectorError::ConfigError(format!(
                "unterminated {} in sql statement",
                if q == '\'' { "string literal" } else { "quoted identifier" }
            )));
        }

        if !out.is_empty() {
            segments.push(Segment::Text(out));
        }

        let mut stmt = Self {
            segments,
            sql: String::new(),
            parameters,
        };
        stmt.sql = stmt.render(|position| format!("${}", position));
        Ok(stmt)
    }

    /// Rebuild the statement, writing `placeholder(n)` for each positional parameter.
    pub fn render(&self, placeholder: impl Fn(usize) -> String) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Param(position) => out.push_str(&placeholder(*position)),
            }
        }
        out
    }

    /// The statement with positional `$n` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names in positional order: `parameters()[0]` binds `$1`.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}
