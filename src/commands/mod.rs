pub mod build;
pub mod context;
pub mod search;
pub mod snapshot;
pub mod status;

use anyhow::{bail, Result};
use shelfsense::Config;

fn ensure_store_exists(config: &Config) -> Result<()> {
    if !config.store_path.exists() {
        bail!(
            "knowledge base not found at {} (run `shelf build` first)",
            config.store_path.display()
        );
    }
    Ok(())
}
