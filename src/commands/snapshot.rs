//! Export / import of the portable store snapshot

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use shelfsense::{Config, KnowledgeBase, KnowledgeStore};

pub fn export(config: &Config, output: &Path) -> Result<()> {
    super::ensure_store_exists(config)?;
    let (store, bytes) = KnowledgeBase::open(config)?.export()?;
    std::fs::write(output, &bytes).with_context(|| format!("cannot write {}", output.display()))?;

    println!(
        "{} Exported {} items to {}",
        "✓".green().bold(),
        store.len().to_string().cyan(),
        output.display()
    );
    Ok(())
}

pub fn import(config: &Config, input: &Path) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("cannot read {}", input.display()))?;
    let (store, info) = KnowledgeStore::deserialize_with_info(&bytes)?;
    let total = store.len();
    let pending = store.pending_count();

    let mut kb = KnowledgeBase::open(config)?;
    if pending > 0 {
        tracing::info!(pending, "snapshot has items without embedding, embedding them now");
        let report = kb.build(store, false)?;
        if !report.failed.is_empty() {
            println!("  {} {}", "✗".red(), report.summary());
        }
    } else {
        kb.import(&store, &info)?;
    }

    println!(
        "{} Imported {} items into {}",
        "✓".green().bold(),
        total.to_string().cyan(),
        config.store_path.display()
    );
    Ok(())
}
