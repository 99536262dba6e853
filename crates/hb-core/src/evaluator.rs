//! Element evaluator
//!
//! Resolves a parsed selector chain against a document. The first node
//! seeds a candidate set, every later node narrows it, and an empty set
//! short-circuits the rest of the chain. Broken filters (invalid regex,
//! invalid CSS, invalid path) are logged and filter to empty without
//! aborting sibling chains.

use std::collections::HashSet;

use ego_tree::NodeId;
use log::{debug, warn};
use regex::{Regex, RegexBuilder};

use crate::dom::{parse_declarations, Document};
use crate::path::PathQuery;
use crate::selector::SelectorNode;
use crate::types::ElementAction;

/// A `:click()` / `:remove()` request surfaced by an action selector. The
/// caller decides whether to apply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub selector: String,
    pub action: ElementAction,
    pub targets: Vec<NodeId>,
}

/// Result of resolving one chain: the surviving candidate set, plus any
/// action requests encountered along the way. Action requests fire on
/// sight, whether or not the chain completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutcome {
    pub matched: Vec<NodeId>,
    pub actions: Vec<ActionRequest>,
}

/// Resolve a selector chain against the document.
pub fn resolve_chain(doc: &Document, nodes: &[SelectorNode]) -> ChainOutcome {
    let mut outcome = ChainOutcome::default();
    if nodes.is_empty() {
        return outcome;
    }

    let mut candidates = seed(doc, &nodes[0], &mut outcome.actions);

    for node in &nodes[1..] {
        if candidates.is_empty() {
            break;
        }
        candidates = filter(doc, candidates, node, &mut outcome.actions);
    }

    outcome.matched = candidates;
    outcome
}

/// Resolve the first node of a chain into an initial candidate set.
fn seed(doc: &Document, node: &SelectorNode, actions: &mut Vec<ActionRequest>) -> Vec<NodeId> {
    match node {
        SelectorNode::Plain {
            selector,
            action: Some(action),
            ..
        } => {
            // Action operators are side-effects, not matches.
            match doc.select(selector) {
                Ok(targets) => actions.push(ActionRequest {
                    selector: selector.clone(),
                    action: *action,
                    targets,
                }),
                Err(e) => debug!("action selector rejected: {e}"),
            }
            Vec::new()
        }
        SelectorNode::Plain { selector, .. } => {
            if is_regex_shaped(selector) {
                match build_text_regex(selector) {
                    Ok(re) => doc
                        .all_elements()
                        .into_iter()
                        .filter(|&id| re.is_match(&doc.element_text(id)))
                        .collect(),
                    Err(e) => {
                        debug!("text pattern {selector:?} rejected: {e}");
                        Vec::new()
                    }
                }
            } else {
                match doc.select(selector) {
                    Ok(found) => found,
                    Err(e) => {
                        debug!("selector query failed: {e}");
                        Vec::new()
                    }
                }
            }
        }
        SelectorNode::Path { expr, .. } => match PathQuery::parse(expr) {
            Ok(query) => doc.query_path(&query),
            Err(e) => {
                debug!("path query failed: {e}");
                Vec::new()
            }
        },
        other => {
            warn!("selector {:?} cannot seed a candidate set", other.raw());
            Vec::new()
        }
    }
}

/// Narrow the candidate set through one filter node.
fn filter(
    doc: &Document,
    mut candidates: Vec<NodeId>,
    node: &SelectorNode,
    actions: &mut Vec<ActionRequest>,
) -> Vec<NodeId> {
    match node {
        SelectorNode::Plain { selector, .. } => match Document::compile_selector(selector) {
            Ok(compiled) => {
                candidates.retain(|&id| doc.element_matches(id, &compiled));
                candidates
            }
            Err(e) => {
                debug!("plain filter failed: {e}");
                Vec::new()
            }
        },
        SelectorNode::Contains { text, .. } => match build_text_regex(text) {
            Ok(re) => {
                candidates.retain(|&id| re.is_match(&normalize_text(&doc.element_text(id))));
                candidates
            }
            Err(e) => {
                debug!("contains pattern {text:?} rejected: {e}");
                Vec::new()
            }
        },
        SelectorNode::Comments { text, .. } => match build_text_regex(text) {
            Ok(re) => doc
                .comment_nodes()
                .into_iter()
                .filter(|&id| {
                    doc.comment_text(id)
                        .map(|t| re.is_match(&normalize_text(&t)))
                        .unwrap_or(false)
                })
                .collect(),
            Err(e) => {
                debug!("comments pattern {text:?} rejected: {e}");
                Vec::new()
            }
        },
        SelectorNode::Has { chain, .. } => {
            let nested = resolve_chain(doc, chain);
            actions.extend(nested.actions);
            candidates.retain(|&outer| nested.matched.iter().any(|&m| doc.contains(outer, m)));
            candidates
        }
        SelectorNode::Not { chain, .. } => {
            let nested = resolve_chain(doc, chain);
            actions.extend(nested.actions);
            let excluded: HashSet<NodeId> = nested.matched.into_iter().collect();
            candidates.retain(|id| !excluded.contains(id));
            candidates
        }
        SelectorNode::Properties { filter, .. } => filter_by_properties(doc, candidates, filter),
        SelectorNode::Path { expr, .. } => match PathQuery::parse(expr) {
            Ok(query) => {
                let found: HashSet<NodeId> = doc.query_path(&query).into_iter().collect();
                candidates.retain(|id| found.contains(id));
                candidates
            }
            Err(e) => {
                debug!("path filter failed: {e}");
                Vec::new()
            }
        },
    }
}

/// Keep candidates whose style value matches every declaration in the
/// filter. The declarations are realized on a detached reference (parsed
/// and normalized); properties the filter does not name are ignored.
fn filter_by_properties(doc: &Document, mut candidates: Vec<NodeId>, filter: &str) -> Vec<NodeId> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Vec::new();
    }

    let reference = parse_declarations(filter);

    candidates.retain(|&id| {
        reference
            .iter()
            .all(|(prop, want)| doc.style_value(id, prop).as_deref() == Some(want.as_str()))
    });
    candidates
}

/// `/pattern/`-delimited selector text is treated as a regex rather than a
/// literal query.
fn is_regex_shaped(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('/') && text.ends_with('/')
}

/// Build the case-insensitive text regex used by `:contains` /
/// `:comments` filters and regex-shaped plain selectors.
fn build_text_regex(text: &str) -> Result<Regex, regex::Error> {
    let pattern = if is_regex_shaped(text) {
        &text[1..text.len() - 1]
    } else {
        text
    };
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
