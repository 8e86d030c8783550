//! View loading and HTML/JSON rendering.
//!
//! The template engine itself is a collaborator behind [`ViewEngine`]; the
//! bundled [`PlainViewEngine`] only substitutes `{{key}}` placeholders.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::http::response::ApiResponse;
use crate::http::Exchange;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read view {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render {}: {reason}", view.display())]
    Render { view: PathBuf, reason: String },
}

/// Template engine contract.
pub trait ViewEngine: Send + Sync {
    /// Render `view` with `data`, optionally wrapped in `layout`.
    fn render(&self, view: &Path, data: &Value, layout: Option<&Path>) -> Result<String, ViewError>;

    /// Raw source of a view.
    fn load(&self, view: &Path) -> Result<String, ViewError>;
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("placeholder pattern"));

/// File-backed engine with `{{key}}` substitution. Layouts receive the
/// rendered view as `{{body}}`.
#[derive(Debug, Clone)]
pub struct PlainViewEngine {
    extension: String,
}

impl PlainViewEngine {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    fn file_for(&self, view: &Path) -> PathBuf {
        if view.extension().is_some_and(|ext| ext == self.extension.as_str()) {
            return view.to_path_buf();
        }
        let mut file = OsString::from(view.as_os_str());
        file.push(".");
        file.push(&self.extension);
        PathBuf::from(file)
    }

    fn substitute(template: &str, data: &Value) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let pointer = format!("/{}", caps[1].replace('.', "/"));
                match data.pointer(&pointer) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                }
            })
            .into_owned()
    }
}

impl Default for PlainViewEngine {
    fn default() -> Self {
        Self::new("html")
    }
}

impl ViewEngine for PlainViewEngine {
    fn render(&self, view: &Path, data: &Value, layout: Option<&Path>) -> Result<String, ViewError> {
        let body = Self::substitute(&self.load(view)?, data);
        let Some(layout) = layout else {
            return Ok(body);
        };
        let mut layout_data = data.clone();
        match layout_data.as_object_mut() {
            Some(map) => {
                map.insert("body".to_string(), Value::String(body));
            }
            None => layout_data = serde_json::json!({ "body": body }),
        }
        Ok(Self::substitute(&self.load(layout)?, &layout_data))
    }

    fn load(&self, view: &Path) -> Result<String, ViewError> {
        let file = self.file_for(view);
        if !file.is_file() {
            return Err(ViewError::NotFound(file));
        }
        fs::read_to_string(&file).map_err(|source| ViewError::Io { path: file, source })
    }
}

/// Writes rendered views and API responses into an exchange.
#[derive(Clone)]
pub struct Renderer {
    engine: Arc<dyn ViewEngine>,
    views_dir: PathBuf,
}

impl Renderer {
    pub fn new(engine: Arc<dyn ViewEngine>, views_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            views_dir: views_dir.into(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ViewEngine> {
        &self.engine
    }

    /// Absolute view paths are used as-is, relative ones resolve against the
    /// application views directory.
    pub fn resolve(&self, view_path: &str) -> PathBuf {
        let path = Path::new(view_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.views_dir.join(view_path.trim_start_matches('/'))
        }
    }

    pub fn html_render(
        &self,
        ex: &Exchange,
        data: &Value,
        layout: Option<&Path>,
        view_path: &str,
    ) -> Result<(), ViewError> {
        let view = self.resolve(view_path);
        let layout = layout.map(|l| self.resolve(&l.to_string_lossy()));
        let html = self.engine.render(&view, data, layout.as_deref())?;
        ex.send_html(html);
        Ok(())
    }

    pub fn api_render(&self, ex: &Exchange, response: &ApiResponse) {
        ex.send_json(&response.to_value());
    }

    /// JSON for ajax requests, HTML otherwise.
    pub fn auto_render(
        &self,
        ex: &Exchange,
        data: &Value,
        layout: Option<&Path>,
        view_path: &str,
    ) -> Result<(), ViewError> {
        if ex.is_ajax() {
            ex.send_json(data);
            Ok(())
        } else {
            self.html_render(ex, data, layout, view_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_with_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("blog/post")).unwrap();
        fs::write(dir.path().join("blog/post/show.html"), "<h1>{{ title }}</h1>{{meta.author}}").unwrap();
        fs::write(dir.path().join("layout.html"), "<main>{{body}}</main>").unwrap();

        let renderer = Renderer::new(Arc::new(PlainViewEngine::default()), dir.path());
        let ex = Exchange::get("/blog/post/show");
        renderer
            .html_render(
                &ex,
                &json!({"title": "Hi", "meta": {"author": "ann"}}),
                Some(Path::new("layout")),
                "blog/post/show",
            )
            .unwrap();

        let response = ex.to_response();
        assert_eq!(response.status(), 200);
        assert!(ex.is_finished());
    }

    #[test]
    fn test_missing_view() {
        let renderer = Renderer::new(Arc::new(PlainViewEngine::default()), "/nonexistent");
        let err = renderer
            .html_render(&Exchange::get("/"), &json!({}), None, "index/index")
            .unwrap_err();
        assert!(matches!(err, ViewError::NotFound(p) if p.ends_with("index/index.html")));
    }

    #[test]
    fn test_substitute_missing_and_numbers() {
        let out = PlainViewEngine::substitute("{{a}}-{{b}}-{{c}}", &json!({"a": 1, "b": null}));
        assert_eq!(out, "1--");
    }
}
