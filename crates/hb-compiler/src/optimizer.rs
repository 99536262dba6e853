//! Record-level optimizer
//!
//! Rule sources accumulate duplicates across refreshes. Exact duplicate
//! records compile to identical chains, so they are dropped before
//! compilation; the first occurrence wins, preserving insertion order.

use std::collections::HashSet;

use crate::parser::RawRule;

pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
}

pub fn optimize_records(records: &mut Vec<RawRule>) -> OptimizeStats {
    let before = records.len();

    let mut seen: HashSet<RecordKey> = HashSet::new();
    let mut deduped = 0usize;
    records.retain(|record| {
        let key = RecordKey::from(record);
        if seen.contains(&key) {
            deduped += 1;
            false
        } else {
            seen.insert(key);
            true
        }
    });

    let after = records.len();

    OptimizeStats {
        before,
        after,
        deduped,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    rule_text: String,
    category: String,
    silent: bool,
    aggressive: bool,
}

impl From<&RawRule> for RecordKey {
    fn from(record: &RawRule) -> Self {
        Self {
            rule_text: record.r.clone(),
            category: record.t.clone(),
            silent: record.s.unwrap_or(false),
            aggressive: record.a.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: u32, r: &str, t: &str) -> RawRule {
        RawRule {
            id,
            r: r.to_string(),
            s: None,
            t: t.to_string(),
            a: None,
            d: None,
        }
    }

    #[test]
    fn drops_exact_duplicates_keeping_first() {
        let mut records = vec![
            raw(1, "##div", "adserver"),
            raw(2, "##div", "adserver"),
            raw(3, "##div", "scam"),
        ];

        let stats = optimize_records(&mut records);
        assert_eq!(stats.before, 3);
        assert_eq!(stats.after, 2);
        assert_eq!(stats.deduped, 1);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 3);
    }

    #[test]
    fn differing_flags_are_not_duplicates() {
        let mut records = vec![
            raw(1, "##div", "scam"),
            RawRule {
                a: Some(true),
                ..raw(2, "##div", "scam")
            },
        ];

        let stats = optimize_records(&mut records);
        assert_eq!(stats.deduped, 0);
        assert_eq!(records.len(), 2);
    }
}
