//! Display-document templating.
//!
//! A display document is a pure function of the artifact reference and the
//! deployment's display backend. With a host base URL configured, artifacts
//! are referenced by URL; without one, by a relative path computed against
//! the document serving root. A reference that would step outside that root
//! is a configuration error and fails hard.

use std::path::{Component, Path, PathBuf};

use meshforge_core::{DisplayBackend, PipelineConfig, StageError};
use thiserror::Error;

use crate::cache::CachedArtifact;

/// A rendered display document.
///
/// Derived purely from its inputs; regenerable at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayDocument {
    /// The HTML handed to the host for display.
    pub html: String,
}

/// Templates display documents for cached artifacts.
#[derive(Debug, Clone)]
pub struct DisplayRenderer {
    backend: DisplayBackend,
    host_base_url: String,
    cache_route: String,
    viewer_cdn_url: String,
    cache_root: PathBuf,
    doc_root: PathBuf,
}

impl DisplayRenderer {
    /// Creates a renderer from pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            backend: config.display_backend,
            host_base_url: config.host_base_url.clone(),
            cache_route: config.cache_route.clone(),
            viewer_cdn_url: config.viewer_cdn_url.clone(),
            cache_root: config.cache_root.clone(),
            doc_root: config.doc_root.clone(),
        }
    }

    /// Builds the display document for a reserved artifact.
    ///
    /// Only the planned filename is needed; the artifact may still be in
    /// flight to disk.
    pub fn render(&self, artifact: &CachedArtifact) -> Result<DisplayDocument, DisplayError> {
        let model_ref = self.artifact_ref(artifact)?;
        let html = match self.backend {
            DisplayBackend::StlViewer => self.stl_viewer_html(&model_ref)?,
            DisplayBackend::ModelViewer => self.model_viewer_html(&model_ref),
        };
        Ok(DisplayDocument { html })
    }

    /// Public reference (URL or relative path) for a cached artifact.
    pub fn artifact_ref(&self, artifact: &CachedArtifact) -> Result<String, DisplayError> {
        self.model_file_ref(&artifact.filename)
    }

    /// Public reference for a file in the model cache directory.
    pub fn model_file_ref(&self, filename: &str) -> Result<String, DisplayError> {
        if !self.host_base_url.is_empty() {
            Ok(format!(
                "{}{}models/{}",
                self.host_base_url, self.cache_route, filename
            ))
        } else {
            self.relative_ref(&self.cache_root.join("models").join(filename))
        }
    }

    /// Public reference for a cached viewer asset.
    fn asset_ref(&self, filename: &str) -> Result<String, DisplayError> {
        if !self.host_base_url.is_empty() {
            Ok(format!(
                "{}{}js/{}",
                self.host_base_url, self.cache_route, filename
            ))
        } else {
            self.relative_ref(&self.cache_root.join("js").join(filename))
        }
    }

    /// Computes `target` relative to the document serving root.
    ///
    /// Fails with [`DisplayError::RootEscape`] when the normalized target
    /// does not sit under the root, which indicates a cache/asset
    /// misconfiguration rather than a data error.
    fn relative_ref(&self, target: &Path) -> Result<String, DisplayError> {
        let escape = || DisplayError::RootEscape {
            root: self.doc_root.clone(),
            target: target.to_path_buf(),
        };

        let root = normalize(&self.doc_root).ok_or_else(escape)?;
        let normalized = normalize(target).ok_or_else(escape)?;
        if normalized.is_absolute() != self.doc_root.is_absolute() {
            return Err(escape());
        }
        let relative = normalized.strip_prefix(&root).map_err(|_| escape())?;

        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"))
    }

    fn stl_viewer_html(&self, model_ref: &str) -> Result<String, DisplayError> {
        let viewer_js = self.asset_ref("stl_viewer.min.js")?;
        Ok(format!(
            r##"<script src="{viewer_js}"></script>
<script>
    var stl_viewer = new StlViewer(
        document.getElementById("stl_cont"),
        {{
            models: [
                {{
                    filename: "{model_ref}",
                    rotation: {{x: 0, y: 0, z: 0}},
                    position: {{x: 0, y: 0, z: 0}},
                    scale: 1.0
                }}
            ],
            background: {{color: "#FFFFFF"}},
        }}
    );
</script>
<div id="stl_cont" style="width: 500px; height: 500px;"></div>"##
        ))
    }

    fn model_viewer_html(&self, model_ref: &str) -> String {
        let module_src = format!("{}model-viewer.min.js", self.viewer_cdn_url);
        format!(
            r#"<script type="module" src="{module_src}"></script>
<model-viewer src="{model_ref}" alt="Rendered 3d model" camera-controls auto-rotate style="width: 500px; height: 500px;"></model-viewer>"#
        )
    }
}

/// Lexically folds `.` and `..` components. Returns `None` when `..` would
/// climb past the start of the path.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0u32;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Errors raised while templating display documents.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The artifact reference would leave the document serving root.
    #[error("artifact path {target} escapes the document root {root}")]
    RootEscape { root: PathBuf, target: PathBuf },
}

impl StageError for DisplayError {
    fn code(&self) -> &'static str {
        match self {
            DisplayError::RootEscape { .. } => "DISPLAY_001",
        }
    }

    fn category(&self) -> &'static str {
        "display"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshforge_core::PipelineConfig;
    use pretty_assertions::assert_eq;

    fn artifact() -> CachedArtifact {
        CachedArtifact {
            filename: "c1-model-m1-0.stl".to_string(),
            relative_path: PathBuf::from("models/c1-model-m1-0.stl"),
            sequence: 0,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new("http://render.local/").unwrap()
    }

    #[test]
    fn test_url_reference() {
        let config = config()
            .host_base_url("http://chat.local")
            .unwrap()
            .cache_route("cache/meshforge");
        let renderer = DisplayRenderer::new(&config);

        let href = renderer.artifact_ref(&artifact()).unwrap();
        assert_eq!(href, "http://chat.local/cache/meshforge/models/c1-model-m1-0.stl");
    }

    #[test]
    fn test_relative_reference() {
        let config = config().cache_root("data/cache/meshforge").doc_root(".");
        let renderer = DisplayRenderer::new(&config);

        let href = renderer.artifact_ref(&artifact()).unwrap();
        assert_eq!(href, "data/cache/meshforge/models/c1-model-m1-0.stl");
    }

    #[test]
    fn test_relative_reference_under_deeper_root() {
        let config = config()
            .cache_root("data/cache/meshforge")
            .doc_root("data/cache");
        let renderer = DisplayRenderer::new(&config);

        let href = renderer.artifact_ref(&artifact()).unwrap();
        assert_eq!(href, "meshforge/models/c1-model-m1-0.stl");
    }

    #[test]
    fn test_root_escape_is_fatal() {
        // The cache sits outside the serving root.
        let config = config()
            .cache_root("../shared/cache")
            .doc_root("data");
        let renderer = DisplayRenderer::new(&config);

        let err = renderer.render(&artifact()).unwrap_err();
        assert!(matches!(err, DisplayError::RootEscape { .. }));
        assert_eq!(err.code(), "DISPLAY_001");
    }

    #[test]
    fn test_root_escape_on_absolute_cache_relative_root() {
        let config = config().cache_root("/var/cache/meshforge").doc_root(".");
        let renderer = DisplayRenderer::new(&config);

        let err = renderer.artifact_ref(&artifact()).unwrap_err();
        assert!(matches!(err, DisplayError::RootEscape { .. }));
    }

    #[test]
    fn test_stl_viewer_document_references_artifact_and_widget() {
        let config = config().host_base_url("http://chat.local").unwrap();
        let renderer = DisplayRenderer::new(&config);

        let document = renderer.render(&artifact()).unwrap();
        assert!(document
            .html
            .contains("http://chat.local/cache/meshforge/models/c1-model-m1-0.stl"));
        assert!(document.html.contains("stl_viewer.min.js"));
        assert!(document.html.contains("new StlViewer"));
    }

    #[test]
    fn test_model_viewer_document() {
        let config = config()
            .host_base_url("http://chat.local")
            .unwrap()
            .display_backend(DisplayBackend::ModelViewer);
        let renderer = DisplayRenderer::new(&config);

        let document = renderer.render(&artifact()).unwrap();
        assert!(document.html.contains("<model-viewer"));
        assert!(document.html.contains("model-viewer.min.js"));
        assert!(document
            .html
            .contains("http://chat.local/cache/meshforge/models/c1-model-m1-0.stl"));
    }

    #[test]
    fn test_normalize_folds_components() {
        assert_eq!(
            normalize(Path::new("a/./b/../c")).unwrap(),
            PathBuf::from("a/c")
        );
        assert_eq!(normalize(Path::new(".")).unwrap(), PathBuf::new());
        assert_eq!(normalize(Path::new("../x")), None);
    }
}
