//! Rule matching orchestration
//!
//! Selects the chains applicable to the current page URL and evaluates
//! them against the document. Results come back as an explicit
//! `PageOutcome` accumulator (elements to hide, pages to block, actions
//! to apply) that the decision arbiter consumes; the engine itself never
//! mutates the document.

use std::collections::HashSet;

use ego_tree::NodeId;
use log::debug;
use regex::RegexBuilder;

use crate::dom::Document;
use crate::evaluator::{resolve_chain, ActionRequest};
use crate::selector;
use crate::types::{
    BlockCandidate, Chain, DomainChains, HidingScope, ProcessedRules, SelectorEntry,
    ThreatCategory,
};
use crate::url::extract_host;

/// Accumulated result of evaluating a rule database against one page.
#[derive(Debug, Clone, Default)]
pub struct PageOutcome {
    /// Elements matched by fully-resolved adserver chains, in match order.
    pub hide: Vec<NodeId>,
    /// Page-block candidates from fully-resolved scam/phishing chains.
    pub block: Vec<BlockCandidate>,
    /// Element actions encountered during evaluation.
    pub actions: Vec<ActionRequest>,
}

/// Test the current URL against one domain pattern: a case-insensitive
/// regex when it compiles, a literal containment test otherwise (`""` and
/// `"*"` match everything).
pub fn domain_applies(pattern: &str, url: &str) -> bool {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re.is_match(url),
        Err(_) => pattern.is_empty() || pattern == "*" || url.contains(pattern),
    }
}

/// Collect the chains whose domain pattern applies to the current URL, in
/// insertion order. All matching patterns contribute; none takes priority.
pub fn select_chains<'a>(entries: &'a [DomainChains], url: &str) -> Vec<&'a Chain> {
    entries
        .iter()
        .filter(|entry| domain_applies(&entry.domain, url))
        .flat_map(|entry| entry.chains.iter())
        .collect()
}

/// Evaluate the whole rule database against a document.
pub fn process_rules(rules: &ProcessedRules, doc: &Document, current_url: &str) -> PageOutcome {
    let mut outcome = PageOutcome::default();

    let host = match extract_host(current_url) {
        Some(host) => host,
        None => {
            debug!("no host in url {current_url:?}, skipping evaluation");
            return outcome;
        }
    };

    let mut seen_hide = HashSet::new();

    for category in [
        ThreatCategory::Adserver,
        ThreatCategory::Scam,
        ThreatCategory::Phishing,
    ] {
        let set = rules.category(category);
        for scope in [HidingScope::Extended, HidingScope::Basic] {
            for chain in select_chains(set.scope(scope), current_url) {
                evaluate_chain(doc, chain, category, host, &mut outcome, &mut seen_hide);
            }
        }
    }

    outcome
}

/// Evaluate one chain. Entries resolve in order; a parse failure or an
/// empty result stops the chain. Adserver entries commit their matches to
/// the hide set as they resolve, so an entry that fails later keeps the
/// hides already earned. A page-block candidate is only produced when
/// every entry resolved non-empty.
fn evaluate_chain(
    doc: &Document,
    chain: &Chain,
    category: ThreatCategory,
    host: &str,
    outcome: &mut PageOutcome,
    seen_hide: &mut HashSet<NodeId>,
) {
    if chain.is_empty() {
        return;
    }

    let mut last_entry: Option<&SelectorEntry> = None;

    for entry in chain {
        last_entry = Some(entry);

        let nodes = match selector::parse(&entry.selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!("selector {:?} rejected: {e}", entry.selector);
                return;
            }
        };

        let resolved = resolve_chain(doc, &nodes);
        outcome.actions.extend(resolved.actions);

        if resolved.matched.is_empty() {
            return;
        }
        if !category.is_page_block() {
            for id in resolved.matched {
                if seen_hide.insert(id) {
                    outcome.hide.push(id);
                }
            }
        }
    }

    if !category.is_page_block() {
        return;
    }

    let entry = match last_entry {
        Some(entry) => entry,
        None => return,
    };

    outcome.block.push(BlockCandidate {
        domain: host.to_string(),
        category,
        silent: entry.silent,
        aggressive: entry.aggressive,
        source: entry.selector.clone(),
        id: entry.id,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(selector: &str) -> SelectorEntry {
        SelectorEntry {
            selector: selector.to_string(),
            silent: false,
            aggressive: false,
            id: 7,
        }
    }

    fn rules_with(category: ThreatCategory, domain: &str, chain: Chain) -> ProcessedRules {
        let mut rules = ProcessedRules::default();
        rules
            .category_mut(category)
            .chains_mut(HidingScope::Extended, domain)
            .push(chain);
        rules
    }

    const PAGE: &str = r#"
        <html><body>
            <div id="ad1" class="promo">Sponsored content</div>
            <div id="content"><p>verify your account</p></div>
        </body></html>
    "#;

    #[test]
    fn domain_pattern_regex_and_fallback() {
        assert!(domain_applies("example\\.(com|net)", "https://example.net/x"));
        assert!(!domain_applies("example\\.(com|net)", "https://example.org/x"));
        // "*" fails regex compilation and falls back to match-everything.
        assert!(domain_applies("*", "https://anything.test/"));
        assert!(domain_applies("", "https://anything.test/"));
        assert!(domain_applies("EXAMPLE.com", "https://example.com/"));
    }

    #[test]
    fn select_chains_keeps_insertion_order() {
        let entries = vec![
            DomainChains {
                domain: "example.com".to_string(),
                chains: vec![vec![entry("div")], vec![entry("span")]],
            },
            DomainChains {
                domain: "other.test".to_string(),
                chains: vec![vec![entry("p")]],
            },
            DomainChains {
                domain: "*".to_string(),
                chains: vec![vec![entry("body")]],
            },
        ];

        let selected = select_chains(&entries, "https://example.com/page");
        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0][0].selector, "div");
        assert_eq!(selected[1][0].selector, "span");
        assert_eq!(selected[2][0].selector, "body");
    }

    #[test]
    fn adserver_entries_commit_hides_as_they_match() {
        let doc = Document::parse(PAGE);

        let rules = rules_with(
            ThreatCategory::Adserver,
            "example.com",
            vec![entry("div.promo"), entry("div:contains(sponsored)")],
        );
        let outcome = process_rules(&rules, &doc, "https://example.com/page");
        assert_eq!(outcome.hide.len(), 1);
        assert!(outcome.block.is_empty());

        // A later entry that resolves empty stops the chain but keeps the
        // hides earlier entries earned.
        let rules = rules_with(
            ThreatCategory::Adserver,
            "example.com",
            vec![entry("div.promo"), entry("div:contains(missing text)"), entry("p")],
        );
        let outcome = process_rules(&rules, &doc, "https://example.com/page");
        assert_eq!(outcome.hide.len(), 1);
    }

    #[test]
    fn page_block_chain_produces_candidate() {
        let doc = Document::parse(PAGE);
        let rules = rules_with(
            ThreatCategory::Phishing,
            "*",
            vec![entry("body:contains(verify your account)")],
        );

        let outcome = process_rules(&rules, &doc, "https://bad.example/login");
        assert!(outcome.hide.is_empty());
        assert_eq!(outcome.block.len(), 1);
        let candidate = &outcome.block[0];
        assert_eq!(candidate.domain, "bad.example");
        assert_eq!(candidate.category, ThreatCategory::Phishing);
        assert_eq!(candidate.id, 7);
    }

    #[test]
    fn unparsable_selector_stops_the_chain() {
        let doc = Document::parse(PAGE);

        // A block chain with an unparsable entry never produces a candidate.
        let rules = rules_with(
            ThreatCategory::Phishing,
            "*",
            vec![entry("body"), entry("div:has(span")],
        );
        let outcome = process_rules(&rules, &doc, "https://example.com/");
        assert!(outcome.block.is_empty());

        // An unparsable first entry means nothing is ever hidden.
        let rules = rules_with(
            ThreatCategory::Adserver,
            "*",
            vec![entry("div:has(span"), entry("div.promo")],
        );
        let outcome = process_rules(&rules, &doc, "https://example.com/");
        assert!(outcome.hide.is_empty());
    }

    #[test]
    fn hides_are_deduplicated_across_chains() {
        let doc = Document::parse(PAGE);
        let mut rules = ProcessedRules::default();
        let chains = rules
            .adserver
            .chains_mut(HidingScope::Extended, "*");
        chains.push(vec![entry("div.promo")]);
        chains.push(vec![entry("#ad1")]);

        let outcome = process_rules(&rules, &doc, "https://example.com/");
        assert_eq!(outcome.hide.len(), 1);
    }

    #[test]
    fn invalid_url_yields_empty_outcome() {
        let doc = Document::parse(PAGE);
        let rules = rules_with(ThreatCategory::Adserver, "*", vec![entry("div.promo")]);
        let outcome = process_rules(&rules, &doc, "not a url");
        assert!(outcome.hide.is_empty() && outcome.block.is_empty());
    }

    #[test]
    fn non_matching_domain_is_skipped() {
        let doc = Document::parse(PAGE);
        let rules = rules_with(
            ThreatCategory::Adserver,
            "only-this\\.example",
            vec![entry("div.promo")],
        );
        let outcome = process_rules(&rules, &doc, "https://elsewhere.example/");
        assert!(outcome.hide.is_empty());
    }

    #[test]
    fn scam_rules_never_hide_elements() {
        let doc = Document::parse(PAGE);
        let rules = rules_with(ThreatCategory::Scam, "*", vec![entry("div.promo")]);
        let outcome = process_rules(&rules, &doc, "https://scam.example/");
        assert!(outcome.hide.is_empty());
        assert_eq!(outcome.block.len(), 1);
        assert_eq!(outcome.block[0].category, ThreatCategory::Scam);
    }
}
