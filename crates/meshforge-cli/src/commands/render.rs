//! Render command implementation.
//!
//! Runs one pipeline invocation and prints the host event stream as it
//! arrives.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::process::ExitCode;
use std::time::Duration;

use meshforge_core::{
    Conversation, DisplayBackend, EventSink, HostEvent, PipelineConfig,
};
use meshforge_pipeline::{AssetStore, Pipeline, PipelineOutcome};
use tokio::sync::mpsc::UnboundedReceiver;

/// Run the render command.
///
/// # Returns
/// Exit code: 0 success or no model code, 2 pipeline failure
#[allow(clippy::too_many_arguments)]
pub fn run(
    message_file: Option<&str>,
    conversation: Option<&str>,
    chat_id: &str,
    message_id: &str,
    render_url: &str,
    host_url: &str,
    viewer_cdn: &str,
    cache_root: &str,
    backend_name: &str,
    convert: bool,
    skip_assets: bool,
    timeout_secs: u64,
) -> Result<ExitCode> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(run_async(
        message_file,
        conversation,
        chat_id,
        message_id,
        render_url,
        host_url,
        viewer_cdn,
        cache_root,
        backend_name,
        convert,
        skip_assets,
        timeout_secs,
    ))
}

#[allow(clippy::too_many_arguments)]
async fn run_async(
    message_file: Option<&str>,
    conversation: Option<&str>,
    chat_id: &str,
    message_id: &str,
    render_url: &str,
    host_url: &str,
    viewer_cdn: &str,
    cache_root: &str,
    backend_name: &str,
    convert: bool,
    skip_assets: bool,
    timeout_secs: u64,
) -> Result<ExitCode> {
    let backend = DisplayBackend::from_name(backend_name)
        .with_context(|| format!("unknown display backend: {}", backend_name))?;

    let config = PipelineConfig::new(render_url)
        .context("invalid render service URL")?
        .host_base_url(host_url)
        .context("invalid host base URL")?
        .viewer_cdn_url(viewer_cdn)
        .context("invalid viewer CDN URL")?
        .cache_root(cache_root)
        .display_backend(backend)
        .convert_to_obj(convert)
        .request_timeout(Duration::from_secs(timeout_secs));

    println!("{} {}", "Render service:".cyan().bold(), config.render_base_url);
    println!("{} {}", "Cache root:".cyan().bold(), config.cache_root.display());
    if convert {
        println!("{} enabled", "OBJ conversion:".cyan().bold());
    }

    if !skip_assets && backend == DisplayBackend::StlViewer {
        let store = AssetStore::new(&config);
        let fetched = store
            .ensure_viewer_assets()
            .await
            .context("failed to prepare viewer assets")?;
        if fetched > 0 {
            println!("{} {} viewer asset(s)", "Fetched:".dimmed(), fetched);
        }
    }

    let (events, rx) = EventSink::channel();
    let printer = tokio::spawn(print_events(rx));

    let pipeline = Pipeline::new(config, events)?;

    let outcome = match (conversation, message_file) {
        (Some(path), None) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read conversation file: {}", path))?;
            let conversation: Conversation =
                serde_json::from_str(&text).context("invalid conversation JSON")?;
            pipeline.run(&conversation, chat_id, message_id).await
        }
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read message file: {}", path))?;
            pipeline.run_content(&content, chat_id, message_id).await
        }
        _ => bail!("exactly one of --conversation or --message-file is required"),
    };

    // Close the event channel so the printer drains and exits.
    drop(pipeline);
    let _ = printer.await;

    match outcome {
        Ok(PipelineOutcome::NoCode) => {
            println!("\n{} no model code found in message", "DONE".yellow().bold());
            Ok(ExitCode::SUCCESS)
        }
        Ok(PipelineOutcome::Completed {
            artifact,
            converted,
            ..
        }) => {
            println!("\n{} artifact {}", "DONE".green().bold(), artifact.filename);
            if let Some(path) = converted {
                println!("{} {}", "Converted:".dimmed(), path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("\n{} {}", "FAILED".red().bold(), err);
            Ok(ExitCode::from(2))
        }
    }
}

/// Prints host events as they arrive.
async fn print_events(mut rx: UnboundedReceiver<HostEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            HostEvent::Status { description, done } => {
                if done {
                    println!("  {} {}", "ok".green(), description);
                } else {
                    println!("  {} {}", "..".dimmed(), description);
                }
            }
            HostEvent::Message {
                description,
                content,
            } => {
                println!("\n{} {}", "Message:".cyan().bold(), description);
                println!("{}", content);
            }
        }
    }
}
