//! Pipeline orchestration.
//!
//! One invocation moves linearly: extract model code, render it remotely,
//! then persist and template in parallel, deliver the display document, and
//! optionally derive a secondary download format in the background.
//!
//! The display document can reach the host while the artifact write is still
//! in flight; only successful completion of the invocation guarantees the
//! referenced file is durable.

use std::path::PathBuf;

use meshforge_core::{
    extract_model_code, Conversation, EventSink, MessageError, PipelineConfig,
};
use meshforge_render::{RenderClient, RenderError};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::cache::{ArtifactCache, CacheError, CachedArtifact};
use crate::convert::{convert_stl_to_obj, ConvertError};
use crate::display::{DisplayDocument, DisplayError, DisplayRenderer};

/// The extraction → render → cache → display pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    client: RenderClient,
    cache: ArtifactCache,
    display: DisplayRenderer,
    events: EventSink,
}

/// Terminal result of one pipeline invocation.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The message carried no usable model code. Benign.
    NoCode,
    /// The full pipeline ran and the artifact is durable on disk.
    Completed {
        /// The persisted artifact.
        artifact: CachedArtifact,
        /// The document delivered to the host.
        document: DisplayDocument,
        /// Path of the derived OBJ when conversion was enabled and
        /// succeeded.
        converted: Option<PathBuf>,
    },
}

/// Errors that abort a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The targeted message is not in the conversation.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// The render service call failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The artifact could not be persisted.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The display document could not be templated.
    #[error(transparent)]
    Display(#[from] DisplayError),

    /// The cache write task was cancelled or panicked.
    #[error("cache write task aborted before completion")]
    WriteTaskAborted,
}

impl Pipeline {
    /// Creates a pipeline for the given deployment configuration.
    pub fn new(config: PipelineConfig, events: EventSink) -> Result<Self, PipelineError> {
        let client = RenderClient::from_config(&config)?;
        let cache = ArtifactCache::new(&config.cache_root, config.artifact_format);
        let display = DisplayRenderer::new(&config);
        Ok(Self {
            config,
            client,
            cache,
            display,
            events,
        })
    }

    /// Runs one invocation against a message drawn from the conversation.
    pub async fn run(
        &self,
        conversation: &Conversation,
        chat_id: &str,
        message_id: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        let message = conversation.find_message(message_id)?;
        self.run_content(&message.content, chat_id, message_id).await
    }

    /// Runs one invocation against raw message content.
    pub async fn run_content(
        &self,
        content: &str,
        chat_id: &str,
        message_id: &str,
    ) -> Result<PipelineOutcome, PipelineError> {
        tracing::info!(chat_id, message_id, "starting render pipeline");

        self.events.status("Writing 3d model code...", false);
        let block = match extract_model_code(content) {
            Ok(Some(block)) => {
                self.events.status("Writing 3d model code...", true);
                block
            }
            Ok(None) => {
                self.events.status("No model code found!", true);
                tracing::info!("message content is empty");
                return Ok(PipelineOutcome::NoCode);
            }
            Err(err) => {
                // Malformed or exhausted input reads as "nothing to render".
                self.events.status("No model code found!", true);
                tracing::info!(error = %err, "no usable model code in message");
                return Ok(PipelineOutcome::NoCode);
            }
        };

        self.events.status("Rendering 3d model...", false);
        let bytes = match self.client.render(&block.source).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.events.status("Rendering 3d model...", true);
                self.events
                    .message("Model rendering failed.", render_failure_content(&err));
                return Err(PipelineError::Render(err));
            }
        };
        self.events.status("Rendering 3d model...", true);

        self.events.status("Displaying 3d model...", false);
        let artifact = self.cache.reserve(chat_id, message_id)?;

        // Cache write and display templating are independent: templating
        // needs only the reserved filename, not the written bytes.
        let (durable_tx, durable_rx) = oneshot::channel::<PathBuf>();
        let write_cache = self.cache.clone();
        let write_artifact = artifact.clone();
        let write_handle = tokio::task::spawn_blocking(move || {
            let result = write_cache.write(&write_artifact, &bytes);
            if result.is_ok() {
                let _ = durable_tx.send(write_cache.absolute_path(&write_artifact));
            }
            result
        });

        // Conversion starts now but waits internally for the write to land.
        let convert_handle = if self.config.convert_to_obj {
            Some(tokio::spawn(async move {
                match durable_rx.await {
                    Ok(path) => convert_stl_to_obj(&path),
                    Err(_) => Err(ConvertError::SourceUnavailable),
                }
            }))
        } else {
            None
        };

        let document = self.display.render(&artifact)?;
        let download_href = self.display.artifact_ref(&artifact)?;

        self.events.message(
            "A 3d model rendered from the provided code.",
            primary_message_content(&document, &download_href),
        );
        self.events.status("Displaying 3d model...", true);

        // The document is already delivered, but the invocation only
        // succeeds once the artifact is durable.
        match write_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(PipelineError::Cache(err)),
            Err(_) => return Err(PipelineError::WriteTaskAborted),
        }
        tracing::debug!(filename = %artifact.filename, "artifact durable");

        let converted = match convert_handle {
            None => None,
            Some(handle) => {
                self.events.status("Converting model for download...", false);
                match handle.await {
                    Ok(Ok(path)) => {
                        let filename = path
                            .file_name()
                            .map(|f| f.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        let href = self.display.model_file_ref(&filename)?;
                        self.events.message(
                            "A download link for the converted model.",
                            format!("\n[Download OBJ]({})\n", href),
                        );
                        self.events.status("Converting model for download...", true);
                        Some(path)
                    }
                    Ok(Err(err)) => {
                        // Isolated: the primary document stands.
                        tracing::warn!(error = %err, "format conversion failed");
                        self.events
                            .status(format!("Model conversion failed: {}", err), true);
                        None
                    }
                    Err(_) => {
                        tracing::warn!("format conversion task aborted");
                        self.events.status("Model conversion failed.", true);
                        None
                    }
                }
            }
        };

        tracing::info!(filename = %artifact.filename, "render pipeline complete");
        Ok(PipelineOutcome::Completed {
            artifact,
            document,
            converted,
        })
    }
}

/// The host-visible content for a successful render.
fn primary_message_content(document: &DisplayDocument, download_href: &str) -> String {
    format!(
        "\n\n```html\n{}\n```\n\n[Download model]({})\n",
        document.html, download_href
    )
}

/// The host-visible content for a render failure.
///
/// Deliberately carries the service's full diagnostics so the user can
/// correct the submitted code.
fn render_failure_content(err: &RenderError) -> String {
    let mut content = format!("**Model rendering failed:** {}\n", err.message());
    if !err.details().is_empty() {
        content.push_str(&format!("\n{}\n", err.details()));
    }
    if !err.log().is_empty() {
        content.push_str(&format!("\n```\n{}\n```\n", err.log()));
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshforge_core::HostEvent;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primary_message_content_shape() {
        let document = DisplayDocument {
            html: "<div>viewer</div>".to_string(),
        };
        let content = primary_message_content(&document, "http://chat.local/cache/m.stl");

        assert!(content.contains("```html\n<div>viewer</div>\n```"));
        assert!(content.contains("[Download model](http://chat.local/cache/m.stl)"));
    }

    #[test]
    fn test_render_failure_content_includes_diagnostics() {
        let err = RenderError::Server {
            message: "E".to_string(),
            details: "D".to_string(),
            log: "L".to_string(),
        };
        let content = render_failure_content(&err);

        assert!(content.contains("E"));
        assert!(content.contains("D"));
        assert!(content.contains("```\nL\n```"));
    }

    #[test]
    fn test_render_failure_content_omits_empty_log() {
        let err = RenderError::Network {
            message: "refused".to_string(),
            details: "guidance".to_string(),
        };
        let content = render_failure_content(&err);

        assert!(content.contains("refused"));
        assert!(content.contains("guidance"));
        assert!(!content.contains("```"));
    }

    #[tokio::test]
    async fn test_no_code_outcome_and_events() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (events, mut rx) = EventSink::channel();
        let config = PipelineConfig::new("http://127.0.0.1:1/")
            .unwrap()
            .cache_root(tmp.path());
        let pipeline = Pipeline::new(config, events).unwrap();

        let outcome = pipeline
            .run_content("no code in here", "c1", "m1")
            .await
            .unwrap();
        assert!(matches!(outcome, PipelineOutcome::NoCode));

        let first = rx.try_recv().unwrap();
        assert_eq!(
            first,
            HostEvent::Status {
                description: "Writing 3d model code...".to_string(),
                done: false
            }
        );
        let second = rx.try_recv().unwrap();
        assert_eq!(
            second,
            HostEvent::Status {
                description: "No model code found!".to_string(),
                done: true
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_message_lookup_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = PipelineConfig::new("http://127.0.0.1:1/")
            .unwrap()
            .cache_root(tmp.path());
        let pipeline = Pipeline::new(config, EventSink::disconnected()).unwrap();

        let err = pipeline
            .run(&Conversation::default(), "c1", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Message(_)));
    }

    #[tokio::test]
    async fn test_render_failure_aborts_and_reports() {
        // Nothing listens on this port: the render call fails at transport
        // level and the pipeline surfaces a structured failure message.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let tmp = tempfile::TempDir::new().unwrap();
        let (events, mut rx) = EventSink::channel();
        let config = PipelineConfig::new(format!("http://{}/", addr))
            .unwrap()
            .cache_root(tmp.path());
        let pipeline = Pipeline::new(config, events).unwrap();

        let err = pipeline
            .run_content("```python\ndef model():\n    pass\n```", "c1", "m1")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Render(RenderError::Network { .. })));

        // No cache entry may be reserved for a failed render.
        assert!(!tmp.path().join("models").exists());

        let mut saw_failure_message = false;
        while let Ok(event) = rx.try_recv() {
            if let HostEvent::Message { content, .. } = event {
                assert!(content.contains("Model rendering failed"));
                saw_failure_message = true;
            }
        }
        assert!(saw_failure_message);
    }
}
