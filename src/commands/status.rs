//! Status command - persisted store statistics

use anyhow::Result;
use colored::Colorize;

use shelfsense::search::storage::KnowledgeDb;
use shelfsense::Config;

pub fn run(config: &Config, json: bool) -> Result<()> {
    let db_path = &config.store_path;

    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "error": "Knowledge base not found"
                })
            );
        } else {
            println!(
                "{} Knowledge base not found. Run {} first.",
                "!".yellow().bold(),
                "shelf build".cyan()
            );
        }
        return Ok(());
    }

    let db = KnowledgeDb::open(db_path)?;
    let stats = db.stats()?;
    let file_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "item_count": stats.item_count,
                "embedded_count": stats.embedded_count,
                "degraded_count": stats.degraded_count,
                "embedding_model": stats.embedding_model,
                "embedding_dim": stats.embedding_dim,
                "last_built": stats.last_built,
                "file_size_bytes": file_size,
            })
        );
        return Ok(());
    }

    println!("{}", "Knowledge Base Status".bold());
    println!();
    println!(
        "  {} {} items ({} embedded)",
        "→".dimmed(),
        stats.item_count.to_string().cyan(),
        stats.embedded_count
    );
    if stats.degraded_count > 0 {
        println!(
            "  {} {} items carry the zero fallback vector",
            "!".yellow(),
            stats.degraded_count
        );
    }
    if let (Some(model), Some(dim)) = (&stats.embedding_model, stats.embedding_dim) {
        println!("  {} Model: {} ({} dims)", "→".dimmed(), model, dim);
    }
    println!(
        "  {} Size: {:.2} KB",
        "→".dimmed(),
        file_size as f64 / 1024.0
    );
    if let Some(ts) = stats.last_built {
        let dt = chrono::DateTime::from_timestamp(ts, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        println!("  {} Last built: {}", "→".dimmed(), dt);
    }

    Ok(())
}
