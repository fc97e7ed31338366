//! Meshforge Pipeline
//!
//! This crate owns everything between a rendered mesh and the host: the
//! artifact cache, the viewer asset store, display-document templating, the
//! optional STL-to-OBJ conversion stage, and the orchestrating
//! [`Pipeline`] itself.
//!
//! # Overview
//!
//! One invocation moves linearly through extraction, the render call, and
//! then a pair of independent steps (persisting the artifact and templating
//! the display document) before delivering the document to the host. A
//! deployment can additionally derive an OBJ download in the background.
//!
//! # Modules
//!
//! - [`cache`]: Collision-free artifact filenames and atomic writes
//! - [`assets`]: One-time viewer JavaScript fetches from the CDN
//! - [`display`]: HTML document templating and artifact references
//! - [`convert`]: STL to OBJ derivation for the secondary download
//! - [`pipeline`]: The orchestrator and its outcome/error types

pub mod assets;
pub mod cache;
pub mod convert;
pub mod display;
pub mod pipeline;

// Re-export commonly used types at the crate root
pub use assets::{AssetError, AssetStore, VIEWER_ASSET_FILES};
pub use cache::{ArtifactCache, CacheError, CachedArtifact};
pub use convert::{convert_stl_to_obj, ConvertError};
pub use display::{DisplayDocument, DisplayError, DisplayRenderer};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome};
