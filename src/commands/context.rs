//! Context command - print the joined context for a question

use anyhow::Result;

use shelfsense::{answer_context_at, Config};

pub fn run(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(config.top_k);
    let context = answer_context_at(config, query, top_k)?;
    println!("{}", context);
    Ok(())
}
