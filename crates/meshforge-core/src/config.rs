//! Pipeline configuration.
//!
//! Configuration is an explicit value constructed by the host (or the CLI),
//! validated once, and never re-read: base URLs are parse-checked and
//! trailing-slash-normalized at construction time.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::error::StageError;

/// Default CDN base for the embedded STL viewer widget files.
pub const DEFAULT_VIEWER_CDN_URL: &str =
    "https://cdn.jsdelivr.net/gh/omrips/viewstl@v1.13/build/";

/// Default timeout for the render request (5 minutes).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Display backend for the generated document.
///
/// Selected once per deployment, not per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBackend {
    /// Embedded viewer widget bootstrapped from cached JavaScript files.
    StlViewer,
    /// External `<model-viewer>` custom element loaded from a CDN.
    ModelViewer,
}

impl DisplayBackend {
    /// Returns the string identifier for this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayBackend::StlViewer => "stl_viewer",
            DisplayBackend::ModelViewer => "model_viewer",
        }
    }

    /// Parses a backend from its string identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stl_viewer" => Some(DisplayBackend::StlViewer),
            "model_viewer" => Some(DisplayBackend::ModelViewer),
            _ => None,
        }
    }
}

/// File format of the primary cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// Stereolithography mesh.
    Stl,
    /// Binary glTF mesh.
    Glb,
}

impl ArtifactFormat {
    /// Returns the expected file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Stl => "stl",
            ArtifactFormat::Glb => "glb",
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Configuration for one pipeline deployment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL of the hosting application. Empty means artifacts are
    /// referenced by relative path instead of URL.
    pub host_base_url: String,
    /// Base URL of the render service.
    pub render_base_url: String,
    /// CDN base the viewer widget files are fetched from.
    pub viewer_cdn_url: String,
    /// On-disk root of the artifact cache.
    pub cache_root: PathBuf,
    /// URL route under `host_base_url` where the cache is served.
    pub cache_route: String,
    /// Serving root used when computing relative artifact references.
    pub doc_root: PathBuf,
    /// Display backend for generated documents.
    pub display_backend: DisplayBackend,
    /// Format of the primary artifact returned by the render service.
    pub artifact_format: ArtifactFormat,
    /// Whether to derive a secondary OBJ download in the background.
    pub convert_to_obj: bool,
    /// Timeout applied to the render request.
    pub request_timeout: Duration,
}

impl PipelineConfig {
    /// Creates a configuration for the given render service URL, with
    /// defaults for everything else.
    pub fn new(render_base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let render_base_url = ensure_trailing_slash(render_base_url.into());
        if render_base_url.is_empty() {
            return Err(ConfigError::MissingRenderUrl);
        }
        validate_url("render_base_url", &render_base_url)?;

        Ok(Self {
            host_base_url: String::new(),
            render_base_url,
            viewer_cdn_url: DEFAULT_VIEWER_CDN_URL.to_string(),
            cache_root: PathBuf::from("data/cache/meshforge"),
            cache_route: "cache/meshforge/".to_string(),
            doc_root: PathBuf::from("."),
            display_backend: DisplayBackend::StlViewer,
            artifact_format: ArtifactFormat::Stl,
            convert_to_obj: false,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Sets the hosting application base URL.
    pub fn host_base_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = ensure_trailing_slash(url.into());
        if !url.is_empty() {
            validate_url("host_base_url", &url)?;
        }
        self.host_base_url = url;
        Ok(self)
    }

    /// Sets the viewer CDN base URL.
    pub fn viewer_cdn_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = ensure_trailing_slash(url.into());
        validate_url("viewer_cdn_url", &url)?;
        self.viewer_cdn_url = url;
        Ok(self)
    }

    /// Sets the on-disk cache root.
    pub fn cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = path.into();
        self
    }

    /// Sets the URL route under which the cache is served.
    pub fn cache_route(mut self, route: impl Into<String>) -> Self {
        self.cache_route = ensure_trailing_slash(route.into());
        self
    }

    /// Sets the serving root for relative artifact references.
    pub fn doc_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.doc_root = path.into();
        self
    }

    /// Sets the display backend.
    pub fn display_backend(mut self, backend: DisplayBackend) -> Self {
        self.display_backend = backend;
        self
    }

    /// Sets the primary artifact format.
    pub fn artifact_format(mut self, format: ArtifactFormat) -> Self {
        self.artifact_format = format;
        self
    }

    /// Enables or disables the background OBJ conversion stage.
    pub fn convert_to_obj(mut self, enabled: bool) -> Self {
        self.convert_to_obj = enabled;
        self
    }

    /// Sets the render request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Directory where model artifacts are written.
    pub fn models_dir(&self) -> PathBuf {
        self.cache_root.join("models")
    }

    /// Directory where viewer JavaScript assets are cached.
    pub fn js_dir(&self) -> PathBuf {
        self.cache_root.join("js")
    }
}

/// Errors raised while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No render service URL was provided.
    #[error("render service base URL is required")]
    MissingRenderUrl,

    /// A configured URL does not parse.
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

impl StageError for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            ConfigError::MissingRenderUrl => "CONFIG_001",
            ConfigError::InvalidUrl { .. } => "CONFIG_002",
        }
    }

    fn category(&self) -> &'static str {
        "config"
    }
}

/// Ensures a non-empty string ends in a trailing forward slash.
fn ensure_trailing_slash(s: String) -> String {
    if !s.is_empty() && !s.ends_with('/') {
        format!("{}/", s)
    } else {
        s
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })
}
