//! HeurBlock CLI
//!
//! CLI tool for compiling heuristic rule databases and scanning saved
//! pages against them.

use std::fs;
use std::time::Instant;

use clap::{Parser, Subcommand};

use hb_core::arbiter::{
    AllowlistDatabase, AllowlistStore, DecisionArbiter, NavigationSink, ProtectionState,
};
use hb_core::dom::Document;
use hb_core::error::CollaboratorError;
use hb_core::matcher::process_rules;
use hb_core::types::{BlockAction, BlockRequest, ProcessedRules, ThreatCategory};
use hb_compiler::{compile_rules, optimize_records, parse_rule_records};

#[derive(Parser)]
#[command(name = "hb-cli")]
#[command(about = "HeurBlock rule database compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a raw rules JSON into a rule database
    Compile {
        /// Input rules JSON file
        #[arg(short, long)]
        input: String,

        /// Output database file
        #[arg(short, long, default_value = "heuristics.db.json")]
        output: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Scan a saved HTML document against a compiled database
    Scan {
        /// Compiled database file
        #[arg(short, long)]
        database: String,

        /// HTML document to scan
        #[arg(long)]
        html: String,

        /// Page URL the document was loaded from
        #[arg(short, long)]
        url: String,

        /// Tab id to report in block decisions
        #[arg(long, default_value_t = 0)]
        tab_id: i32,
    },

    /// Dump database info
    Info {
        /// Database file to inspect
        #[arg(short, long)]
        input: String,
    },

    /// Download a raw rules JSON
    Fetch {
        /// Rules source URL
        #[arg(short, long)]
        url: String,

        /// Output file
        #[arg(short, long, default_value = "rules.json")]
        output: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            verbose,
        } => cmd_compile(&input, &output, verbose),
        Commands::Scan {
            database,
            html,
            url,
            tab_id,
        } => cmd_scan(&database, &html, &url, tab_id),
        Commands::Info { input } => cmd_info(&input),
        Commands::Fetch { url, output } => cmd_fetch(&url, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_compile(input: &str, output: &str, verbose: bool) -> Result<(), String> {
    let start = Instant::now();

    let content =
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{input}': {e}"))?;
    let mut records = parse_rule_records(&content)
        .map_err(|e| format!("Failed to parse '{input}': {e}"))?;

    let stats = optimize_records(&mut records);
    let rules = compile_rules(&records);

    let json = serde_json::to_string_pretty(&rules)
        .map_err(|e| format!("Failed to serialize database: {e}"))?;
    fs::write(output, json).map_err(|e| format!("Failed to write '{output}': {e}"))?;

    if verbose {
        println!(
            "Parsed {} records ({} duplicates dropped)",
            stats.before, stats.deduped
        );
        for category in [
            ThreatCategory::Adserver,
            ThreatCategory::Scam,
            ThreatCategory::Phishing,
        ] {
            println!(
                "  {category}: {} chains",
                rules.category(category).chain_count()
            );
        }
    }
    println!(
        "Compiled {} chains to {output} in {:?}",
        rules.chain_count(),
        start.elapsed()
    );

    Ok(())
}

/// Allowlist store with no databases behind it: only the engine's built-in
/// always-allow set applies.
struct NoDatabases;

impl AllowlistStore for NoDatabases {
    fn is_allowlisted(
        &self,
        _domain: &str,
        _database: AllowlistDatabase,
        _label: &str,
    ) -> Result<bool, CollaboratorError> {
        Ok(false)
    }

    fn is_allowlisted_by_pattern(&self, _domain: &str) -> Result<bool, CollaboratorError> {
        Ok(false)
    }
}

struct AllProtectionsOn;

impl ProtectionState for AllProtectionsOn {
    fn is_protection_active(&self, _: ThreatCategory, _: &str, _: i32) -> bool {
        true
    }
}

/// Prints block decisions instead of driving a browser tab.
struct StdoutSink;

impl NavigationSink for StdoutSink {
    fn record_block(&self, request: &BlockRequest) -> Result<BlockAction, CollaboratorError> {
        println!("BLOCK {} ({}): {}", request.rule, request.subtype, request.message);
        Ok(BlockAction {
            redirect_url: "about:blank#blocked".to_string(),
        })
    }

    fn navigate(&self, tab_id: i32, url: &str) -> Result<(), CollaboratorError> {
        println!("NAVIGATE tab {tab_id} -> {url}");
        Ok(())
    }
}

fn cmd_scan(database: &str, html: &str, url: &str, tab_id: i32) -> Result<(), String> {
    let db_content =
        fs::read_to_string(database).map_err(|e| format!("Failed to read '{database}': {e}"))?;
    let rules: ProcessedRules = serde_json::from_str(&db_content)
        .map_err(|e| format!("Failed to parse '{database}': {e}"))?;

    let page =
        fs::read_to_string(html).map_err(|e| format!("Failed to read '{html}': {e}"))?;
    let mut doc = Document::parse(&page);

    let outcome = process_rules(&rules, &doc, url);

    let arbiter = DecisionArbiter::new(&NoDatabases, &AllProtectionsOn, &StdoutSink);
    let summary = arbiter.apply(&mut doc, &outcome, url, tab_id);

    let report = serde_json::json!({
        "url": url,
        "candidates": outcome.block,
        "hidden": summary.hidden,
        "actions": summary.actions,
        "blocked": summary.blocked.map(|event| serde_json::json!({
            "rule": event.rule,
            "category": event.category,
            "redirectUrl": event.redirect_url,
        })),
    });
    println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());

    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let content =
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{input}': {e}"))?;
    let rules: ProcessedRules = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse '{input}': {e}"))?;

    println!("Database: {} (version {})", rules.name, rules.version);
    for category in [
        ThreatCategory::Adserver,
        ThreatCategory::Scam,
        ThreatCategory::Phishing,
    ] {
        let set = rules.category(category);
        println!(
            "  {category}: {} domains basic, {} domains extended, {} chains",
            set.basic.len(),
            set.extended.len(),
            set.chain_count()
        );
    }

    Ok(())
}

fn cmd_fetch(url: &str, output: &str) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start runtime: {e}"))?;

    let body = runtime.block_on(async {
        let response = reqwest::get(url)
            .await
            .map_err(|e| format!("Failed to fetch '{url}': {e}"))?;
        response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {e}"))
    })?;

    let records = parse_rule_records(&body)
        .map_err(|e| format!("Fetched rules do not parse: {e}"))?;

    fs::write(output, &body).map_err(|e| format!("Failed to write '{output}': {e}"))?;
    println!("Fetched {} records to {output}", records.len());

    Ok(())
}
