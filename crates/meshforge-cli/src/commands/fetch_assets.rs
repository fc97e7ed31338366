//! Fetch-assets command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use meshforge_pipeline::AssetStore;

/// Run the fetch-assets command.
///
/// # Returns
/// Exit code: 0 on success
pub fn run(viewer_cdn: &str, cache_root: &str) -> Result<ExitCode> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(async move {
        let store = AssetStore::with_cdn(Path::new(cache_root).join("js"), viewer_cdn);
        let fetched = store
            .ensure_viewer_assets()
            .await
            .context("failed to fetch viewer assets")?;

        if fetched > 0 {
            println!("{} {} viewer asset(s)", "Fetched:".green().bold(), fetched);
        } else {
            println!("{}", "All viewer assets already cached".green());
        }
        Ok(ExitCode::SUCCESS)
    })
}
