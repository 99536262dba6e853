//! Rule database builder
//!
//! Compiles validated raw records into the `ProcessedRules` structure the
//! engine consumes: selector chains partitioned by threat category, hiding
//! scope and domain pattern. Compilation is tolerant of bad input; a
//! malformed record is dropped with a diagnostic and never fails the batch.

use log::debug;

use hb_core::types::{ProcessedRules, SelectorEntry, ThreatCategory};

use crate::parser::{split_rule, RawRule};

/// Compile raw records into a rule database. Each record contributes
/// exactly one chain; records for the same domain and scope accumulate as
/// sibling chains in insertion order.
pub fn compile_rules(records: &[RawRule]) -> ProcessedRules {
    let mut rules = ProcessedRules::default();

    for record in records {
        let category = match record.category() {
            Some(category) => category,
            None => {
                debug!("skipping rule {}: unknown category {:?}", record.id, record.t);
                continue;
            }
        };
        if record.r.is_empty() {
            debug!("skipping rule {}: empty rule text", record.id);
            continue;
        }

        compile_record(&mut rules, record, category);
    }

    rules
}

fn compile_record(rules: &mut ProcessedRules, record: &RawRule, category: ThreatCategory) {
    let parts = match split_rule(&record.r) {
        Some(parts) => parts,
        None => {
            debug!("skipping rule {}: unparsable rule text {:?}", record.id, record.r);
            return;
        }
    };

    let mut domain = parts.domain.trim();
    if domain.is_empty() {
        domain = "*";
    }

    let chain: Vec<SelectorEntry> = parts
        .selectors
        .iter()
        .map(|selector| SelectorEntry {
            selector: rewrite_escapes(selector.trim()),
            silent: record.s.unwrap_or(false),
            aggressive: record.a.unwrap_or(false),
            id: record.id,
        })
        .collect();

    if chain.is_empty() {
        debug!("skipping rule {}: no selectors", record.id);
        return;
    }

    rules
        .category_mut(category)
        .chains_mut(parts.scope, domain)
        .push(chain);
}

/// Selector text rewrites applied at compile time. An escaped pipe becomes
/// a character class so the text stays a literal pipe when the selector is
/// later compiled into a regex; escaped quotes are unescaped.
fn rewrite_escapes(selector: &str) -> String {
    let mut selector = selector.to_string();
    if selector.contains("\\|") {
        selector = selector.replace("\\|", "[|]");
    }
    if selector.contains("\\\"") {
        selector = selector.replace("\\\"", "\"");
    }
    selector
}
