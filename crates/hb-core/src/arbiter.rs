//! Decision arbiter
//!
//! Turns page-block candidates into actual hide/block decisions through
//! three external collaborators: the allowlist store, the protection/tab
//! state, and the navigation sink. The arbiter only side-effects through
//! those collaborators and the document handle it is given.
//!
//! A failed allowlist lookup never excludes a scam/phishing candidate
//! (fail-closed): a block page is recoverable for the user, a missed
//! phishing block is not.

use log::warn;

use crate::dom::Document;
use crate::error::CollaboratorError;
use crate::matcher::PageOutcome;
use crate::types::{BlockAction, BlockCandidate, BlockRequest, ElementAction, ThreatCategory};
use crate::url::{extract_host, walk_host_suffixes};

/// Domains that are never blocked by heuristic rules, whatever the
/// databases say. Consulted for the source host and every parent suffix.
pub const ALWAYS_ALLOW: &[&str] = &[
    "google.com",
    "youtube.com",
    "microsoft.com",
    "office.com",
    "live.com",
    "apple.com",
    "amazon.com",
    "paypal.com",
    "wikipedia.org",
    "mozilla.org",
    "github.com",
    "cloudflare.com",
];

/// Allowlist databases the store can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowlistDatabase {
    /// Manually curated scam allowlist.
    ScamsManual,
    /// Popularity allowlist; skipped for aggressive-mode rules.
    TopDomains,
}

impl AllowlistDatabase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScamsManual => "scams_manual",
            Self::TopDomains => "top_domains",
        }
    }
}

/// Allowlist lookups backed by downloadable databases.
pub trait AllowlistStore {
    fn is_allowlisted(
        &self,
        domain: &str,
        database: AllowlistDatabase,
        label: &str,
    ) -> Result<bool, CollaboratorError>;

    fn is_allowlisted_by_pattern(&self, domain: &str) -> Result<bool, CollaboratorError>;
}

/// Per-category protection toggles, scoped to a tab.
pub trait ProtectionState {
    fn is_protection_active(&self, category: ThreatCategory, url: &str, tab_id: i32) -> bool;
}

/// Records block decisions and drives tab navigation.
pub trait NavigationSink {
    fn record_block(&self, request: &BlockRequest) -> Result<BlockAction, CollaboratorError>;

    fn navigate(&self, tab_id: i32, url: &str) -> Result<(), CollaboratorError>;
}

/// The block decision issued for a batch, for telemetry and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub rule: String,
    pub category: ThreatCategory,
    pub redirect_url: String,
}

/// What one arbiter pass did to the page.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    /// Elements newly hidden.
    pub hidden: usize,
    /// Element actions applied.
    pub actions: usize,
    pub blocked: Option<BlockEvent>,
}

pub struct DecisionArbiter<'a> {
    allowlist: &'a dyn AllowlistStore,
    protection: &'a dyn ProtectionState,
    navigation: &'a dyn NavigationSink,
}

impl<'a> DecisionArbiter<'a> {
    pub fn new(
        allowlist: &'a dyn AllowlistStore,
        protection: &'a dyn ProtectionState,
        navigation: &'a dyn NavigationSink,
    ) -> Self {
        Self {
            allowlist,
            protection,
            navigation,
        }
    }

    /// Apply a page outcome: hide and act on elements when ad protection is
    /// active, then arbitrate the block candidates.
    pub fn apply(
        &self,
        doc: &mut Document,
        outcome: &PageOutcome,
        source_url: &str,
        tab_id: i32,
    ) -> ScanSummary {
        let mut summary = ScanSummary::default();

        if self
            .protection
            .is_protection_active(ThreatCategory::Adserver, source_url, tab_id)
        {
            for request in &outcome.actions {
                for &target in &request.targets {
                    match request.action {
                        ElementAction::Click => doc.click_node(target),
                        ElementAction::Remove => {
                            doc.remove_node(target);
                        }
                    }
                }
                summary.actions += 1;
            }

            for &id in &outcome.hide {
                if doc.hide_node(id) {
                    summary.hidden += 1;
                }
            }
        }

        summary.blocked = self.evaluate(&outcome.block, source_url, tab_id);
        summary
    }

    /// Arbitrate block candidates. At most one block action is issued per
    /// batch; the navigation is terminal for the page, so remaining
    /// candidates are dropped once one lands.
    pub fn evaluate(
        &self,
        candidates: &[BlockCandidate],
        source_url: &str,
        tab_id: i32,
    ) -> Option<BlockEvent> {
        if source_url.is_empty() || candidates.is_empty() {
            return None;
        }

        let source_host = extract_host(source_url).unwrap_or_default();

        for candidate in candidates {
            if !self
                .protection
                .is_protection_active(candidate.category, source_url, tab_id)
            {
                continue;
            }

            // Containment check: the candidate must still describe the page
            // we are looking at.
            if !source_url.contains(&candidate.domain) {
                continue;
            }

            if self.should_exclude(source_host, candidate.aggressive, candidate.category) {
                continue;
            }

            let rule = format!("heuristic_{}", candidate.id);
            let request = BlockRequest {
                tab_id,
                tab_url: source_url.to_string(),
                url: source_url.to_string(),
                category: candidate.category,
                subtype: format!("{}_heuristic", candidate.category),
                rule: rule.clone(),
                message: format!(
                    "heuristic {} match on {source_host}",
                    candidate.category
                ),
                silent: candidate.silent,
            };

            let action = match self.navigation.record_block(&request) {
                Ok(action) => action,
                Err(e) => {
                    warn!("block sink rejected {rule}: {e}");
                    continue;
                }
            };

            if let Err(e) = self.navigation.navigate(tab_id, &action.redirect_url) {
                warn!("navigation failed for {rule}: {e}");
            }

            return Some(BlockEvent {
                rule,
                category: candidate.category,
                redirect_url: action.redirect_url,
            });
        }

        None
    }

    /// Three-tier exclusion check for scam/phishing candidates. The
    /// built-in set is consulted first and short-circuits every database
    /// lookup. Other categories are never excluded here.
    fn should_exclude(&self, domain: &str, aggressive: bool, category: ThreatCategory) -> bool {
        if !category.is_page_block() {
            return false;
        }

        if walk_host_suffixes(domain).any(|suffix| ALWAYS_ALLOW.contains(&suffix)) {
            return true;
        }

        let label = "Scams";
        if self.lookup(
            self.allowlist
                .is_allowlisted(domain, AllowlistDatabase::ScamsManual, label),
        ) {
            return true;
        }
        if self.lookup(self.allowlist.is_allowlisted_by_pattern(domain)) {
            return true;
        }
        if !aggressive
            && self.lookup(
                self.allowlist
                    .is_allowlisted(domain, AllowlistDatabase::TopDomains, label),
            )
        {
            return true;
        }

        false
    }

    fn lookup(&self, result: Result<bool, CollaboratorError>) -> bool {
        match result {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("allowlist lookup failed, not excluding: {e}");
                false
            }
        }
    }
}
