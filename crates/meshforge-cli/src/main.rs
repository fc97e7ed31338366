//! Meshforge CLI - drive the render pipeline against a chat message
//!
//! This binary reads a message (raw content or a conversation JSON file),
//! runs the extraction → render → cache → display pipeline against the
//! configured render service, and prints the host event stream.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;

mod commands;

/// Meshforge - chat-driven 3d model rendering pipeline
#[derive(Parser)]
#[command(name = "meshforge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the model code in a chat message and emit the display document
    Render {
        /// Path to a file holding raw message content
        #[arg(long)]
        message_file: Option<String>,

        /// Path to a conversation JSON file ({"messages": [{"id": ..., "content": ...}]})
        #[arg(long)]
        conversation: Option<String>,

        /// Chat id used for cache partitioning
        #[arg(long)]
        chat_id: String,

        /// Message id used for cache partitioning and conversation lookup
        #[arg(long)]
        message_id: String,

        /// Render service base URL
        #[arg(long, env = "MESHFORGE_RENDER_URL")]
        render_url: String,

        /// Hosting application base URL (empty: reference artifacts by relative path)
        #[arg(long, env = "MESHFORGE_HOST_URL", default_value = "")]
        host_url: String,

        /// Viewer CDN base URL
        #[arg(long, env = "MESHFORGE_VIEWER_CDN", default_value = meshforge_core::DEFAULT_VIEWER_CDN_URL)]
        viewer_cdn: String,

        /// Cache root directory
        #[arg(long, default_value = "data/cache/meshforge")]
        cache_root: String,

        /// Display backend
        #[arg(long, default_value = "stl_viewer", value_parser = ["stl_viewer", "model_viewer"])]
        backend: String,

        /// Derive an OBJ download from the artifact in the background
        #[arg(long)]
        convert: bool,

        /// Skip the one-time viewer asset fetch
        #[arg(long)]
        skip_assets: bool,

        /// Render request timeout in seconds
        #[arg(long, default_value_t = meshforge_core::DEFAULT_REQUEST_TIMEOUT_SECS)]
        timeout_secs: u64,
    },

    /// Fetch the viewer JavaScript files into the cache
    FetchAssets {
        /// Viewer CDN base URL
        #[arg(long, env = "MESHFORGE_VIEWER_CDN", default_value = meshforge_core::DEFAULT_VIEWER_CDN_URL)]
        viewer_cdn: String,

        /// Cache root directory
        #[arg(long, default_value = "data/cache/meshforge")]
        cache_root: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            message_file,
            conversation,
            chat_id,
            message_id,
            render_url,
            host_url,
            viewer_cdn,
            cache_root,
            backend,
            convert,
            skip_assets,
            timeout_secs,
        } => commands::render::run(
            message_file.as_deref(),
            conversation.as_deref(),
            &chat_id,
            &message_id,
            &render_url,
            &host_url,
            &viewer_cdn,
            &cache_root,
            &backend,
            convert,
            skip_assets,
            timeout_secs,
        ),
        Commands::FetchAssets {
            viewer_cdn,
            cache_root,
        } => commands::fetch_assets::run(&viewer_cdn, &cache_root),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(1)
        }
    }
}
