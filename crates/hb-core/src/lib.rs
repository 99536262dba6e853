//! HeurBlock Core Library
//!
//! This crate provides the heuristic content-matching engine for the
//! HeurBlock content blocker: a compact selector language, an evaluator
//! that walks selector chains against a document tree, and the decision
//! arbiter that turns matches into hide/block outcomes.
//!
//! # Architecture
//!
//! The engine consumes a pre-compiled rule database (`ProcessedRules`,
//! built by `hb-compiler`) that partitions selector chains by threat
//! category, hiding scope and domain pattern. Evaluating a page is pure:
//! the matcher returns an explicit outcome accumulator, and only the
//! decision arbiter applies it, through its collaborator traits.
//!
//! # Modules
//!
//! - `selector`: selector string -> typed node chain parser
//! - `path`: structural path queries used by `:xpath(...)` nodes
//! - `dom`: document handle over a parsed HTML tree
//! - `evaluator`: candidate-set resolution for one chain
//! - `matcher`: domain matching and whole-database orchestration
//! - `arbiter`: allowlist tiers, protection gating, block decisions
//! - `url`: host extraction and suffix walking
//! - `types`: shared type definitions

pub mod arbiter;
pub mod dom;
pub mod error;
pub mod evaluator;
pub mod matcher;
pub mod path;
pub mod selector;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use arbiter::{AllowlistStore, DecisionArbiter, NavigationSink, ProtectionState, ScanSummary};
pub use dom::Document;
pub use error::{CollaboratorError, ParseError, QueryError};
pub use matcher::{process_rules, PageOutcome};
pub use selector::{parse, SelectorNode};
pub use types::{
    BlockCandidate, CategoryRules, Chain, HidingScope, ProcessedRules, SelectorEntry,
    ThreatCategory,
};
