//! The seam to whatever produces message bodies from templates.

use std::{collections::HashMap, fmt};

use serde_json::{Map, Value};
use texter_common::TemplateError;

/// Named values an action hands to its template.
pub type Assigns = Map<String, Value>;

/// Everything a renderer is told about the body it should produce.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    /// Registered texter name, e.g. `NotifierTexter`.
    pub texter: &'a str,
    pub action: &'a str,
    /// Directories to search, e.g. `["notifier_texter"]`.
    pub template_paths: &'a [String],
    pub template_name: &'a str,
    pub assigns: &'a Assigns,
}

/// Produces a message body, or fails with a [`TemplateError`] that is
/// propagated unchanged.
pub trait Renderer: Send + Sync {
    ///
    /// Render the body for `request`
    ///
    /// # Errors
    /// [`TemplateError::NotFound`] when no template matches, or
    /// [`TemplateError::Render`] when one does but fails to render.
    ///
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, TemplateError>;
}

impl<F> Renderer for F
where
    F: Fn(&RenderRequest<'_>) -> Result<String, TemplateError> + Send + Sync,
{
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, TemplateError> {
        self(request)
    }
}

/// A renderer that knows no templates. Actions must pass a body.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTemplates;

impl Renderer for NoTemplates {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, TemplateError> {
        Err(not_found(request))
    }
}

fn not_found(request: &RenderRequest<'_>) -> TemplateError {
    TemplateError::NotFound {
        name: request.template_name.to_string(),
        paths: request.template_paths.to_vec(),
    }
}

/// Fixed bodies keyed by `path/name`, searched in path order.
#[derive(Clone, Default)]
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl fmt::Debug for StaticTemplates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.templates.keys().collect();
        keys.sort();
        f.debug_struct("StaticTemplates")
            .field("templates", &keys)
            .finish()
    }
}

impl StaticTemplates {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, path: &str, name: &str, body: impl Into<String>) -> Self {
        self.insert(path, name, body);
        self
    }

    pub fn insert(&mut self, path: &str, name: &str, body: impl Into<String>) {
        self.templates.insert(format!("{path}/{name}"), body.into());
    }
}

impl Renderer for StaticTemplates {
    fn render(&self, request: &RenderRequest<'_>) -> Result<String, TemplateError> {
        request
            .template_paths
            .iter()
            .find_map(|path| {
                self.templates
                    .get(&format!("{path}/{}", request.template_name))
            })
            .cloned()
            .ok_or_else(|| not_found(request))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn request<'a>(paths: &'a [String], assigns: &'a Assigns) -> RenderRequest<'a> {
        RenderRequest {
            texter: "NotifierTexter",
            action: "welcome",
            template_paths: paths,
            template_name: "welcome",
            assigns,
        }
    }

    #[test]
    fn test_no_templates_reports_lookup() {
        let paths = vec!["notifier_texter".to_string()];
        let assigns = Assigns::new();

        let error = NoTemplates.render(&request(&paths, &assigns)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Missing template welcome in [\"notifier_texter\"]"
        );
    }

    #[test]
    fn test_static_templates_search_paths_in_order() {
        let templates = StaticTemplates::new()
            .with("shared", "welcome", "shared body")
            .with("notifier_texter", "welcome", "own body");
        let assigns = Assigns::new();

        let paths = vec!["notifier_texter".to_string(), "shared".to_string()];
        assert_eq!(templates.render(&request(&paths, &assigns)).unwrap(), "own body");

        let paths = vec!["elsewhere".to_string(), "shared".to_string()];
        assert_eq!(
            templates.render(&request(&paths, &assigns)).unwrap(),
            "shared body"
        );
    }

    #[test]
    fn test_closure_renderer_sees_assigns() {
        let renderer = |request: &RenderRequest<'_>| -> Result<String, TemplateError> {
            Ok(format!(
                "Hi {}",
                request.assigns["name"].as_str().unwrap_or_default()
            ))
        };

        let paths = Vec::new();
        let mut assigns = Assigns::new();
        assigns.insert("name".to_string(), Value::from("Ada"));

        assert_eq!(renderer.render(&request(&paths, &assigns)).unwrap(), "Hi Ada");
    }
}
