//! Search command - ranked results with scores

use anyhow::Result;
use colored::Colorize;

use shelfsense::{Config, KnowledgeBase};

/// Run search command
pub fn run(config: &Config, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let top_k = top_k.unwrap_or(config.top_k);

    super::ensure_store_exists(config)?;
    let kb = KnowledgeBase::open(config)?;
    let results = kb.search(query, top_k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        query.cyan()
    );
    println!();

    for (i, result) in results.iter().enumerate() {
        let score_str = format!("{:.3}", result.score);
        let score_colored = if result.score > 0.8 {
            score_str.green()
        } else if result.score > 0.6 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        let first_line = result.content.lines().next().unwrap_or("");
        println!(
            "{}. [{}] {}",
            (i + 1).to_string().bold(),
            score_colored,
            first_line.cyan()
        );

        // Truncate for display (char-aware for Unicode)
        let rest: String = result.content.lines().skip(1).collect::<Vec<_>>().join(" ");
        if !rest.is_empty() {
            let display = if rest.chars().count() > 100 {
                format!("{}...", rest.chars().take(100).collect::<String>())
            } else {
                rest
            };
            println!("   {}", display.dimmed());
        }

        if !result.metadata.is_empty() {
            let meta: Vec<String> = result
                .metadata
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("   {}", meta.join(" | "));
        }
        println!();
    }

    Ok(())
}
