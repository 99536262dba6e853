//! HeurBlock Rule Compiler
//!
//! This crate compiles raw heuristic rule records into the compiled
//! `ProcessedRules` database consumed by the `hb-core` engine.

pub mod builder;
pub mod optimizer;
pub mod parser;

pub use builder::compile_rules;
pub use optimizer::{optimize_records, OptimizeStats};
pub use parser::{parse_rule_records, split_rule, RawRule, RuleParts};
