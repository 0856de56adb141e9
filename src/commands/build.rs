//! Build command - embed JSON Lines records and persist the store

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use shelfsense::core::records::{append_records, parse_records};
use shelfsense::{Config, KnowledgeBase, KnowledgeStore};

/// Run build command
pub fn run(config: &Config, input: &Path, parallel: bool, json: bool) -> Result<()> {
    let file = File::open(input).with_context(|| format!("cannot open {}", input.display()))?;
    let records = parse_records(BufReader::new(file))?;

    let mut store = KnowledgeStore::new();
    let ingest = append_records(&mut store, records)?;

    if let Some(parent) = config.store_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if !json {
        println!(
            "{} Embedding {} items with {}...",
            "→".dimmed(),
            store.len().to_string().cyan(),
            config.model_id()
        );
    }

    let mut kb = KnowledgeBase::open(config)?;
    let report = kb.build(store, parallel)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "appended": ingest.appended,
                "skipped_lines": ingest.skipped_lines,
                "embedded": report.embedded,
                "failed": report.failed,
                "duration_ms": report.duration_ms,
                "store_path": config.store_path.display().to_string(),
            })
        );
        return Ok(());
    }

    println!();
    println!(
        "{} Embedded {} items in {:.2}s",
        "✓".green().bold(),
        report.embedded.to_string().cyan(),
        report.duration_ms as f64 / 1000.0
    );
    if !ingest.skipped_lines.is_empty() {
        println!(
            "  {} {} records skipped (empty content)",
            "→".dimmed(),
            ingest.skipped_lines.len()
        );
    }
    if !report.failed.is_empty() {
        println!(
            "  {} {} items got the zero fallback vector: {}",
            "✗".red(),
            report.failed.len(),
            report.summary()
        );
    }
    println!(
        "  {} Store saved to: {}",
        "→".dimmed(),
        config.store_path.display()
    );

    Ok(())
}
