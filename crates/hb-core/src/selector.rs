//! Selector parser
//!
//! Turns one selector string into an ordered chain of typed selector nodes.
//! The first node of a chain seeds a candidate element set; every later node
//! narrows it. Parsing is cheap and deferred to evaluation time, so parse
//! failures surface as "rule does not apply" rather than compile failures.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ParseError;
use crate::types::ElementAction;

lazy_static! {
    /// `<selector>:click(...)` / `<selector>:remove(...)` prefix match.
    static ref ACTION_OPERATORS: Regex = Regex::new(r"(?i)^(.*?):(click|remove)\(").unwrap();
    /// First parenthesized pseudo-operator occurrence.
    static ref COMPLEX_OPERATORS: Regex = Regex::new(r"(?i):([\w-]+)\(").unwrap();
}

/// One node of a parsed selector chain. Nodes keep their raw source text
/// for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorNode {
    /// Native CSS selector, optionally carrying a terminal element action.
    Plain {
        selector: String,
        action: Option<ElementAction>,
        raw: String,
    },
    /// Text-content filter (`:contains(...)`).
    Contains { text: String, raw: String },
    /// Comment-node filter (`:comments(...)`).
    Comments { text: String, raw: String },
    /// Structural containment filter (`:has(...)`) with an owned nested chain.
    Has {
        chain: Vec<SelectorNode>,
        raw: String,
    },
    /// Negation filter (`:not(...)`) with an owned nested chain.
    Not {
        chain: Vec<SelectorNode>,
        raw: String,
    },
    /// Structural path query (`:xpath(...)`).
    Path { expr: String, raw: String },
    /// Computed-style filter (`:properties(...)`).
    Properties { filter: String, raw: String },
}

impl SelectorNode {
    pub fn raw(&self) -> &str {
        match self {
            Self::Plain { raw, .. }
            | Self::Contains { raw, .. }
            | Self::Comments { raw, .. }
            | Self::Has { raw, .. }
            | Self::Not { raw, .. }
            | Self::Path { raw, .. }
            | Self::Properties { raw, .. } => raw,
        }
    }

    fn is_plain(&self) -> bool {
        matches!(self, Self::Plain { .. })
    }
}

/// Parse a selector string into a chain of selector nodes.
///
/// An empty input yields an empty chain (matches nothing). A chain whose
/// first node is `:contains()` / `:comments()` is rejected: those operators
/// cannot seed a candidate set.
pub fn parse(selector: &str) -> Result<Vec<SelectorNode>, ParseError> {
    let nodes = parse_chain(selector)?;
    match nodes.first() {
        Some(SelectorNode::Contains { .. }) | Some(SelectorNode::Comments { .. }) => {
            Err(ParseError::LonelyPseudo(selector.to_string()))
        }
        _ => Ok(nodes),
    }
}

fn parse_chain(selector: &str) -> Result<Vec<SelectorNode>, ParseError> {
    if selector.is_empty() {
        return Ok(Vec::new());
    }

    // Action operators are terminal: nothing after them is parsed.
    if let Some(caps) = ACTION_OPERATORS.captures(selector) {
        let action = ElementAction::parse(&caps[2].to_ascii_lowercase());
        return Ok(vec![SelectorNode::Plain {
            selector: caps[1].to_string(),
            action,
            raw: selector.to_string(),
        }]);
    }

    let caps = match COMPLEX_OPERATORS.captures(selector) {
        Some(caps) => caps,
        None => {
            return Ok(vec![SelectorNode::Plain {
                selector: selector.to_string(),
                action: None,
                raw: selector.to_string(),
            }]);
        }
    };

    let whole = caps.get(0).unwrap();
    let name = caps.get(1).unwrap().as_str().to_ascii_lowercase();

    let mut nodes = Vec::new();
    if whole.start() > 0 {
        let prefix = &selector[..whole.start()];
        nodes.push(SelectorNode::Plain {
            selector: prefix.to_string(),
            action: None,
            raw: prefix.to_string(),
        });
    }

    let (content, close) = scan_balanced(selector, whole.end())
        .ok_or_else(|| ParseError::UnbalancedParens(selector.to_string()))?;

    match name.as_str() {
        "properties" => nodes.push(SelectorNode::Properties {
            filter: content.to_string(),
            raw: selector.to_string(),
        }),
        "has" => {
            let chain = parse_chain(content)?;
            if !chain.is_empty() {
                nodes.push(SelectorNode::Has {
                    chain,
                    raw: selector.to_string(),
                });
            }
        }
        "contains" => nodes.push(SelectorNode::Contains {
            text: content.to_string(),
            raw: selector.to_string(),
        }),
        "comments" => nodes.push(SelectorNode::Comments {
            text: content.to_string(),
            raw: selector.to_string(),
        }),
        "xpath" => nodes.push(SelectorNode::Path {
            expr: content.to_string(),
            raw: selector.to_string(),
        }),
        "not" => {
            let chain = parse_chain(content)?;
            if !chain.is_empty() {
                if chain.iter().all(SelectorNode::is_plain) {
                    // Every nested node is plain: fold into a native :not().
                    nodes.push(SelectorNode::Plain {
                        selector: format!(":not({content})"),
                        action: None,
                        raw: selector.to_string(),
                    });
                } else {
                    nodes.push(SelectorNode::Not {
                        chain,
                        raw: selector.to_string(),
                    });
                }
            }
        }
        _ => {
            return Err(ParseError::UnknownPseudo {
                selector: selector.to_string(),
                name,
            });
        }
    }

    // Parse the remainder after the closing parenthesis and concatenate,
    // allowing chained pseudo-operators.
    let rest = parse_chain(&selector[close + 1..])?;
    nodes.extend(rest);
    Ok(nodes)
}

/// Extract balanced-parenthesis content starting just inside an opening
/// parenthesis. `\` escapes the following character; escapes are preserved
/// in the returned content. Returns the content and the index of the
/// closing parenthesis, or `None` when the parentheses never balance.
fn scan_balanced(s: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = s.as_bytes();
    let mut depth = 1usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&s[start..i], i));
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}
