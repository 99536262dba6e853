//! Raw rule record parsing
//!
//! Heuristic rules arrive as a JSON array of records. Each record carries a
//! `#@#`-joined rule text whose first segment holds the domain pattern, the
//! hiding-scope marker and the first selector; later segments are additional
//! selectors sharing the same domain and scope. One record compiles into
//! exactly one selector chain.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use hb_core::types::{HidingScope, ThreatCategory};

lazy_static! {
    /// `(domain)(scope marker)(selector)` split for the first rule segment.
    static ref RULE_HEAD: Regex = Regex::new(r"(?s)^(.*?)(#\?#|##)(.+)$").unwrap();
}

/// One raw heuristic rule record, field names as on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRule {
    pub id: u32,
    /// `#@#`-joined rule text.
    pub r: String,
    /// Silent flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<bool>,
    /// Threat category name.
    pub t: String,
    /// Aggressive-mode flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<bool>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
}

impl RawRule {
    /// The record's threat category, if it names a known one.
    pub fn category(&self) -> Option<ThreatCategory> {
        ThreatCategory::parse(&self.t)
    }
}

/// Parse a JSON rule source. The top level must be an array; records that
/// fail to deserialize are dropped with a diagnostic rather than failing
/// the whole source.
pub fn parse_rule_records(text: &str) -> Result<Vec<RawRule>, serde_json::Error> {
    let values: Vec<serde_json::Value> = serde_json::from_str(text)?;

    let mut records = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<RawRule>(value) {
            Ok(record) => records.push(record),
            Err(e) => debug!("dropping malformed rule record: {e}"),
        }
    }

    Ok(records)
}

/// The dissected components of one rule text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleParts {
    pub domain: String,
    pub scope: HidingScope,
    pub selectors: Vec<String>,
}

/// Split a rule text into domain, scope and selector list. The domain and
/// scope come from the first `#@#` segment only; later segments inherit
/// them. Returns `None` when the first segment has no scope marker.
pub fn split_rule(rule_text: &str) -> Option<RuleParts> {
    let mut segments = rule_text.split("#@#");

    let head = segments.next()?;
    let caps = RULE_HEAD.captures(head)?;

    let domain = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let scope = HidingScope::from_marker(caps.get(2)?.as_str())?;
    let first = caps.get(3)?.as_str();

    let mut selectors = vec![first.to_string()];
    selectors.extend(segments.map(str::to_string));

    Some(RuleParts {
        domain: domain.to_string(),
        scope,
        selectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_head_segment_into_components() {
        let parts = split_rule("example.com#?#div.ad").unwrap();
        assert_eq!(parts.domain, "example.com");
        assert_eq!(parts.scope, HidingScope::Extended);
        assert_eq!(parts.selectors, ["div.ad"]);
    }

    #[test]
    fn later_segments_inherit_domain_and_scope() {
        let parts = split_rule("example.com#?#div.ad#@#span:contains(Ad)#@#p").unwrap();
        assert_eq!(parts.domain, "example.com");
        assert_eq!(parts.scope, HidingScope::Extended);
        assert_eq!(parts.selectors, ["div.ad", "span:contains(Ad)", "p"]);
    }

    #[test]
    fn empty_domain_and_basic_scope() {
        let parts = split_rule("##div").unwrap();
        assert_eq!(parts.domain, "");
        assert_eq!(parts.scope, HidingScope::Basic);
        assert_eq!(parts.selectors, ["div"]);
    }

    #[test]
    fn rejects_rule_without_scope_marker() {
        assert!(split_rule("just a selector").is_none());
        assert!(split_rule("").is_none());
        assert!(split_rule("example.com##").is_none());
    }

    #[test]
    fn malformed_records_are_dropped_not_fatal() {
        let json = r###"[
            {"id": 1, "r": "##div", "t": "adserver"},
            {"id": 2, "r": "##span"},
            "not an object",
            {"id": 3, "r": "*##body:contains(x)", "s": false, "t": "phishing", "a": true}
        ]"###;

        let records = parse_rule_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 3);
        assert_eq!(records[1].a, Some(true));
    }

    #[test]
    fn non_array_source_is_an_error() {
        assert!(parse_rule_records(r#"{"id": 1}"#).is_err());
        assert!(parse_rule_records("nonsense").is_err());
    }

    #[test]
    fn unknown_category_is_detected() {
        let record = RawRule {
            id: 1,
            r: "##div".to_string(),
            s: None,
            t: "action".to_string(),
            a: None,
            d: None,
        };
        assert_eq!(record.category(), None);
    }
}
