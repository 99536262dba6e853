//! Core type definitions for HeurBlock
//!
//! These types describe the compiled heuristic rule database and are shared
//! between the compiler and the matching engine. The database is held
//! immutable for the duration of a page evaluation and replaced wholesale on
//! the next rule-source refresh.

use serde::{Deserialize, Serialize};

// =============================================================================
// Threat Categories
// =============================================================================

/// Threat category a rule belongs to. `Adserver` rules hide matched
/// elements; `Scam` and `Phishing` rules block the whole page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatCategory {
    Adserver,
    Scam,
    Phishing,
}

impl ThreatCategory {
    /// Parse from the wire name used in raw rule records (`t` field).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "adserver" => Some(Self::Adserver),
            "scam" => Some(Self::Scam),
            "phishing" => Some(Self::Phishing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adserver => "adserver",
            Self::Scam => "scam",
            Self::Phishing => "phishing",
        }
    }

    /// Whether a full chain match blocks the page instead of hiding elements.
    pub fn is_page_block(&self) -> bool {
        matches!(self, Self::Scam | Self::Phishing)
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Hiding Scopes
// =============================================================================

/// Which selector family a rule hides through. `Basic` rules use the `##`
/// marker, `Extended` rules use `#?#` and may carry pseudo-operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HidingScope {
    Basic,
    Extended,
}

impl HidingScope {
    /// Parse from the separator marker found in rule text.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "##" => Some(Self::Basic),
            "#?#" => Some(Self::Extended),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Self::Basic => "##",
            Self::Extended => "#?#",
        }
    }
}

// =============================================================================
// Element Actions
// =============================================================================

/// Action operators a plain selector may carry (`:click(...)` / `:remove(...)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementAction {
    Click,
    Remove,
}

impl ElementAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "click" => Some(Self::Click),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

// =============================================================================
// Compiled Rule Database
// =============================================================================

/// One selector entry inside a chain. The selector text is stored raw;
/// parsing is deferred to evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub selector: String,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub aggressive: bool,
    #[serde(default)]
    pub id: u32,
}

/// An ordered selector chain. The first entry seeds a candidate set, every
/// later entry must also resolve to a non-empty set for the chain to match.
pub type Chain = Vec<SelectorEntry>;

/// All chains registered for one domain pattern, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainChains {
    pub domain: String,
    pub chains: Vec<Chain>,
}

/// Per-category rule set: one insertion-ordered domain table per hiding
/// scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRules {
    #[serde(rename = "basic_selectors", default, skip_serializing_if = "Vec::is_empty")]
    pub basic: Vec<DomainChains>,
    #[serde(rename = "extended_selectors", default, skip_serializing_if = "Vec::is_empty")]
    pub extended: Vec<DomainChains>,
}

impl CategoryRules {
    pub fn scope(&self, scope: HidingScope) -> &[DomainChains] {
        match scope {
            HidingScope::Basic => &self.basic,
            HidingScope::Extended => &self.extended,
        }
    }

    /// Find or create the chain list for `(scope, domain)`. New domains are
    /// appended, preserving compilation order.
    pub fn chains_mut(&mut self, scope: HidingScope, domain: &str) -> &mut Vec<Chain> {
        let entries = match scope {
            HidingScope::Basic => &mut self.basic,
            HidingScope::Extended => &mut self.extended,
        };
        if let Some(pos) = entries.iter().position(|e| e.domain == domain) {
            return &mut entries[pos].chains;
        }
        entries.push(DomainChains {
            domain: domain.to_string(),
            chains: Vec::new(),
        });
        &mut entries.last_mut().unwrap().chains
    }

    pub fn is_empty(&self) -> bool {
        self.basic.is_empty() && self.extended.is_empty()
    }

    pub fn chain_count(&self) -> usize {
        self.basic
            .iter()
            .chain(self.extended.iter())
            .map(|e| e.chains.len())
            .sum()
    }
}

/// The compiled rule database: one rule set per threat category plus
/// bookkeeping fields. The `action`/`title`/`description` fields are part of
/// the database wire format but unused by this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedRules {
    pub adserver: CategoryRules,
    pub scam: CategoryRules,
    pub phishing: CategoryRules,
    #[serde(default)]
    pub action: Vec<String>,
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(rename = "cleanName")]
    pub clean_name: String,
    pub version: String,
    pub name: String,
}

impl Default for ProcessedRules {
    fn default() -> Self {
        Self {
            adserver: CategoryRules::default(),
            scam: CategoryRules::default(),
            phishing: CategoryRules::default(),
            action: Vec::new(),
            title: Vec::new(),
            description: Vec::new(),
            clean_name: "heuristics".to_string(),
            version: "3.0.0".to_string(),
            name: "heuristics.db.json".to_string(),
        }
    }
}

impl ProcessedRules {
    pub fn category(&self, category: ThreatCategory) -> &CategoryRules {
        match category {
            ThreatCategory::Adserver => &self.adserver,
            ThreatCategory::Scam => &self.scam,
            ThreatCategory::Phishing => &self.phishing,
        }
    }

    pub fn category_mut(&mut self, category: ThreatCategory) -> &mut CategoryRules {
        match category {
            ThreatCategory::Adserver => &mut self.adserver,
            ThreatCategory::Scam => &mut self.scam,
            ThreatCategory::Phishing => &mut self.phishing,
        }
    }

    pub fn chain_count(&self) -> usize {
        self.adserver.chain_count() + self.scam.chain_count() + self.phishing.chain_count()
    }
}

// =============================================================================
// Block Candidates
// =============================================================================

/// A page-block candidate produced by a fully matched scam/phishing chain.
/// Surfaced to the decision arbiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockCandidate {
    /// Host of the page the chain matched on.
    pub domain: String,
    pub category: ThreatCategory,
    pub silent: bool,
    pub aggressive: bool,
    /// Selector text that completed the chain, for diagnostics.
    pub source: String,
    pub id: u32,
}

/// Payload handed to the navigation sink when a page is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub tab_id: i32,
    pub tab_url: String,
    pub url: String,
    pub category: ThreatCategory,
    pub subtype: String,
    pub rule: String,
    pub message: String,
    pub silent: bool,
}

/// Navigation sink response: where to send the blocked tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAction {
    pub redirect_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trips_wire_names() {
        for name in ["adserver", "scam", "phishing"] {
            let cat = ThreatCategory::parse(name).unwrap();
            assert_eq!(cat.as_str(), name);
        }
        assert_eq!(ThreatCategory::parse("action"), None);
    }

    #[test]
    fn scope_markers() {
        assert_eq!(HidingScope::from_marker("##"), Some(HidingScope::Basic));
        assert_eq!(HidingScope::from_marker("#?#"), Some(HidingScope::Extended));
        assert_eq!(HidingScope::from_marker("#@#"), None);
    }

    #[test]
    fn chains_mut_preserves_insertion_order() {
        let mut rules = CategoryRules::default();
        rules
            .chains_mut(HidingScope::Extended, "b.com")
            .push(vec![SelectorEntry {
                selector: "div".to_string(),
                silent: false,
                aggressive: false,
                id: 1,
            }]);
        rules
            .chains_mut(HidingScope::Extended, "a.com")
            .push(Vec::new());
        rules
            .chains_mut(HidingScope::Extended, "b.com")
            .push(Vec::new());

        let domains: Vec<&str> = rules.extended.iter().map(|e| e.domain.as_str()).collect();
        assert_eq!(domains, ["b.com", "a.com"]);
        assert_eq!(rules.extended[0].chains.len(), 2);
        assert_eq!(rules.chain_count(), 3);
    }

    #[test]
    fn page_block_categories() {
        assert!(!ThreatCategory::Adserver.is_page_block());
        assert!(ThreatCategory::Scam.is_page_block());
        assert!(ThreatCategory::Phishing.is_page_block());
    }
}
