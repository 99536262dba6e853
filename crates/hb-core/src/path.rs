//! Structural path queries
//!
//! A small path-query language used by `:xpath(...)` selector nodes:
//! `/` child steps, `//` descendant steps, named or `*` tags, and
//! `[@attr]`, `[@attr='value']`, `[n]` predicates. Anything richer is
//! rejected as an invalid path; the evaluator then treats the node as
//! matching nothing.

use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    pub steps: Vec<PathStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// `//` step: search the whole subtree instead of direct children.
    pub descendant: bool,
    /// Lowercased tag name; `None` for `*`.
    pub tag: Option<String>,
    pub predicate: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    AttrPresent { name: String },
    AttrEquals { name: String, value: String },
    /// 1-based position among the step's matches per context node.
    Position(usize),
}

impl PathQuery {
    pub fn parse(expr: &str) -> Result<Self, QueryError> {
        let expr = expr.trim();
        if !expr.starts_with('/') {
            return Err(QueryError::InvalidPath(expr.to_string()));
        }

        let mut steps = Vec::new();
        let mut rest = expr;

        while !rest.is_empty() {
            let descendant = if let Some(stripped) = rest.strip_prefix("//") {
                rest = stripped;
                true
            } else if let Some(stripped) = rest.strip_prefix('/') {
                rest = stripped;
                false
            } else {
                return Err(QueryError::InvalidPath(expr.to_string()));
            };

            let (step_text, remainder) = split_step(rest);
            rest = remainder;

            steps.push(parse_step(expr, step_text, descendant)?);
        }

        if steps.is_empty() {
            return Err(QueryError::InvalidPath(expr.to_string()));
        }

        Ok(Self { steps })
    }
}

/// Split off one step, leaving any `/` inside a `[...]` predicate alone.
fn split_step(s: &str) -> (&str, &str) {
    let bytes = s.as_bytes();
    let mut in_predicate = false;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'[' => in_predicate = true,
            b']' => in_predicate = false,
            b'/' if !in_predicate => return (&s[..i], &s[i..]),
            _ => {}
        }
    }

    (s, "")
}

fn parse_step(expr: &str, step: &str, descendant: bool) -> Result<PathStep, QueryError> {
    let invalid = || QueryError::InvalidPath(expr.to_string());

    let (name_part, predicate_part) = match step.find('[') {
        Some(pos) => {
            let pred = &step[pos..];
            if !pred.ends_with(']') {
                return Err(invalid());
            }
            (&step[..pos], Some(&pred[1..pred.len() - 1]))
        }
        None => (step, None),
    };

    let name_part = name_part.trim();
    if name_part.is_empty() {
        return Err(invalid());
    }

    let tag = if name_part == "*" {
        None
    } else {
        if !name_part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid());
        }
        Some(name_part.to_ascii_lowercase())
    };

    let predicate = match predicate_part {
        None => None,
        Some(raw) => Some(parse_predicate(expr, raw)?),
    };

    Ok(PathStep {
        descendant,
        tag,
        predicate,
    })
}

fn parse_predicate(expr: &str, raw: &str) -> Result<Predicate, QueryError> {
    let invalid = || QueryError::InvalidPath(expr.to_string());
    let raw = raw.trim();

    if let Some(attr) = raw.strip_prefix('@') {
        return match attr.split_once('=') {
            None => {
                let name = attr.trim();
                if name.is_empty() {
                    return Err(invalid());
                }
                Ok(Predicate::AttrPresent {
                    name: name.to_ascii_lowercase(),
                })
            }
            Some((name, value)) => {
                let name = name.trim();
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .ok_or_else(invalid)?;
                if name.is_empty() {
                    return Err(invalid());
                }
                Ok(Predicate::AttrEquals {
                    name: name.to_ascii_lowercase(),
                    value: unquoted.to_string(),
                })
            }
        };
    }

    let position: usize = raw.parse().map_err(|_| invalid())?;
    if position == 0 {
        return Err(invalid());
    }
    Ok(Predicate::Position(position))
}
