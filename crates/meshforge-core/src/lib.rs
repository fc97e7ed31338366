//! Meshforge Core Library
//!
//! This crate provides the shared vocabulary for the meshforge pipeline:
//! chat message types, model-code extraction, pipeline configuration, and
//! the host event protocol.
//!
//! # Overview
//!
//! A meshforge invocation starts from a host-supplied [`Conversation`] and a
//! `(chat_id, message_id)` pair. The targeted [`Message`] is scanned for a
//! fenced Python block declaring the `model()` entry point; the extracted
//! [`CodeBlock`] is what the render client ships to the render service.
//!
//! # Example
//!
//! ```
//! use meshforge_core::extract::extract_model_code;
//!
//! let content = "Here you go:\n```python\ndef model():\n    pass\n```";
//! let block = extract_model_code(content).unwrap().unwrap();
//! assert!(block.source.contains("def model("));
//! ```
//!
//! # Modules
//!
//! - [`message`]: Host-supplied conversation and message types
//! - [`extract`]: Fenced code-block scanning with backtracking
//! - [`config`]: Pipeline configuration, validated once at construction
//! - [`event`]: Host event protocol and the event sink
//! - [`error`]: The `StageError` trait shared by all stage error types

pub mod config;
pub mod error;
pub mod event;
pub mod extract;
pub mod message;

// Re-export commonly used types at the crate root
pub use config::{
    ArtifactFormat, ConfigError, DisplayBackend, PipelineConfig, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_VIEWER_CDN_URL,
};
pub use error::StageError;
pub use event::{EventSink, HostEvent};
pub use extract::{extract_model_code, CodeBlock, ExtractError, ENTRY_POINT_MARKER};
pub use message::{Conversation, Message, MessageError};
