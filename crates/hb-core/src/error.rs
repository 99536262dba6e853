//! Error taxonomy for the heuristics engine.
//!
//! Parse and query failures are fatal to a single selector chain only;
//! callers log them and treat the chain as non-matching.

use thiserror::Error;

/// Malformed selector syntax. Raised synchronously by the selector parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Parenthesis content of a pseudo-operator never closes.
    #[error("failed to parse selector {0:?}: unmatched parentheses")]
    UnbalancedParens(String),

    /// `:contains()` / `:comments()` as the first node of a chain; these
    /// only make sense as narrowing filters.
    #[error("failed to parse selector {0:?}: lonely pseudo-operator")]
    LonelyPseudo(String),

    /// A parenthesized pseudo-operator the engine does not know.
    #[error("failed to parse selector {selector:?}: invalid pseudo-operator :{name}()")]
    UnknownPseudo { selector: String, name: String },
}

/// Evaluation-time query failure. Caught per-node; the node filters to
/// empty and sibling rules are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("invalid css selector {0:?}")]
    InvalidSelector(String),

    #[error("invalid path expression {0:?}")]
    InvalidPath(String),

    #[error("invalid text pattern {0:?}")]
    InvalidPattern(String),
}

/// An external collaborator (allowlist database, navigation sink) rejected
/// or was unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("collaborator unavailable: {0}")]
pub struct CollaboratorError(pub String);
