//! Host page for rendered diagrams
//!
//! The page template must contain the `<svg>` element the diagram is drawn
//! into, identified by the diagram's container id. That element is replaced
//! wholesale by the rendered diagram. The page also carries the stylesheet, the
//! hover script and the serialized interaction index, all embedded from
//! `web-assets/`.

use std::fs;
use std::path::PathBuf;

use rust_embed::RustEmbed;
use thiserror::Error;
use tracing::debug;

use crate::config::PageConfig;
use crate::render::Diagram;
use crate::svg::escape;

/// Embedded static assets
#[derive(RustEmbed)]
#[folder = "web-assets/"]
struct Assets;

const TEMPLATE: &str = "index.html";
const STYLESHEET: &str = "dependency-graph.css";
const SCRIPT: &str = "dependency-graph.js";

/// Errors that can occur while writing a page
#[derive(Error, Debug)]
pub enum PageError {
    #[error("render target missing: no <svg id=\"{0}\"> element in page template")]
    TargetMissing(String),

    #[error("embedded asset not found: {0}")]
    AssetMissing(&'static str),

    #[error("embedded asset is not UTF-8: {0}")]
    AssetEncoding(&'static str),

    #[error("Failed to read page template: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to serialize interaction index: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Text of an embedded asset
pub fn asset(name: &'static str) -> Result<String, PageError> {
    let file = Assets::get(name).ok_or(PageError::AssetMissing(name))?;
    String::from_utf8(file.data.into_owned()).map_err(|_| PageError::AssetEncoding(name))
}

/// Writes diagrams into an HTML page
#[derive(Debug, Clone)]
pub struct PageWriter {
    title: String,
    template: Option<PathBuf>,
}

impl Default for PageWriter {
    fn default() -> Self {
        Self::new(&PageConfig::default())
    }
}

impl PageWriter {
    pub fn new(config: &PageConfig) -> Self {
        Self {
            title: config.title.clone(),
            template: config.template.clone(),
        }
    }

    /// Render a page from the configured template (or the built-in one)
    pub fn render(&self, diagram: &Diagram) -> Result<String, PageError> {
        let template = match &self.template {
            Some(path) => {
                debug!(template = %path.display(), "using custom page template");
                fs::read_to_string(path)?
            }
            None => asset(TEMPLATE)?,
        };
        self.render_with_template(&template, diagram)
    }

    pub fn render_with_template(&self, template: &str, diagram: &Diagram) -> Result<String, PageError> {
        let target_id = diagram.hover.index.container.as_str();
        // the diagram writes its id attribute escaped
        let escaped_id = escape(target_id);

        // a script element's content ends at the first "</"
        let index = serde_json::to_string(&diagram.hover)?.replace("</", "<\\/");
        let style = asset(STYLESHEET)?;
        let script = asset(SCRIPT)?;
        let title = escape(&self.title);

        let page = fill_template(
            template,
            &[
                ("title", title.as_str()),
                ("target_id", escaped_id.as_str()),
                ("style", style.as_str()),
                ("script", script.as_str()),
                ("index", index.as_str()),
            ],
        );

        let (start, end) =
            find_svg_element(&page, &escaped_id).ok_or_else(|| PageError::TargetMissing(target_id.to_string()))?;

        let mut out = String::with_capacity(page.len() + diagram.width as usize * 8);
        out.push_str(&page[..start]);
        out.push_str(&diagram.to_svg_string());
        out.push_str(&page[end..]);
        Ok(out)
    }
}

/// Replace `{{name}}` placeholders in one pass; unknown names are left alone
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let name = after[..close].trim();
                match values.iter().find(|(key, _)| *key == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[open..open + 2 + close + 2]),
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte range of the `<svg>` element with the given id, including its closing tag
fn find_svg_element(page: &str, id: &str) -> Option<(usize, usize)> {
    let double = format!("id=\"{}\"", id);
    let single = format!("id='{}'", id);
    let mut offset = 0;

    while let Some(found) = page[offset..].find("<svg") {
        let start = offset + found;
        let tag_end = start + page[start..].find('>')?;
        let open_tag = &page[start..=tag_end];

        if open_tag.contains(&double) || open_tag.contains(&single) {
            if open_tag.ends_with("/>") {
                return Some((start, tag_end + 1));
            }
            let close = tag_end + page[tag_end..].find("</svg>")?;
            return Some((start, close + "</svg>".len()));
        }
        offset = tag_end + 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DuplicateEdgePolicy, Link, ServiceGraph};
    use crate::moments::Moments;
    use crate::render::Renderer;

    fn diagram() -> Diagram {
        let links = [Link::new("web", "db", Moments::new(2.0, 1.0, 1.0, 0.0, 1.0))];
        Renderer::default().render(&ServiceGraph::build(&links, DuplicateEdgePolicy::default()))
    }

    #[test]
    fn test_fill_template() {
        let out = fill_template("<{{a}}|{{ b }}|{{c}}|{{", &[("a", "1"), ("b", "{{a}}")]);
        assert_eq!(out, "<1|{{a}}|{{c}}|{{");
    }

    #[test]
    fn test_find_svg_element() {
        let page = r#"<svg id="icon"></svg><div><svg class="x" id="dependency-graph">old</svg></div>"#;
        let (start, end) = find_svg_element(page, "dependency-graph").unwrap();
        assert_eq!(&page[start..end], r#"<svg class="x" id="dependency-graph">old</svg>"#);

        let page = "<p><svg id='g'/></p>";
        let (start, end) = find_svg_element(page, "g").unwrap();
        assert_eq!(&page[start..end], "<svg id='g'/>");

        assert!(find_svg_element("<div id=\"g\"></div>", "g").is_none());
    }

    #[test]
    fn test_builtin_page() {
        let page = PageWriter::default().render(&diagram()).unwrap();

        assert!(page.contains("<title>Service Dependencies</title>"));
        assert!(page.contains(r#"data-node="web""#));
        assert!(page.contains(r#"data-from="web""#));
        assert!(page.contains(r#""container":"dependency-graph""#));
        assert!(!page.contains("{{"));
        assert_eq!(page.matches("<svg id=\"dependency-graph\"").count(), 1);
    }

    #[test]
    fn test_template_without_target_fails() {
        let result = PageWriter::default().render_with_template("<html><body></body></html>", &diagram());
        assert!(matches!(result, Err(PageError::TargetMissing(id)) if id == "dependency-graph"));
    }

    #[test]
    fn test_custom_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        fs::write(
            &path,
            "<h1>{{title}}</h1><svg id=\"dependency-graph\" class=\"stale\"><g>old</g></svg>",
        )
        .unwrap();

        let config = PageConfig {
            title: "A & B".to_string(),
            template: Some(path),
            ..PageConfig::default()
        };
        let page = PageWriter::new(&config).render(&diagram()).unwrap();

        assert!(page.starts_with("<h1>A &amp; B</h1><svg id=\"dependency-graph\""));
        assert!(!page.contains("old"));
        assert!(!page.contains("stale"));
    }

    #[test]
    fn test_target_id_with_markup_characters() {
        let links = [Link::new("web", "db", Moments::of(1.0))];
        let diagram = Renderer::default()
            .with_target_id("deps<&>'")
            .render(&ServiceGraph::build(&links, DuplicateEdgePolicy::default()));
        let page = PageWriter::default().render(&diagram).unwrap();

        assert_eq!(page.matches("<svg id=\"deps&lt;&amp;&gt;&#39;\"").count(), 1);
        assert!(!page.contains("<svg id=\"deps<"));
    }

    #[test]
    fn test_index_cannot_close_script() {
        let links = [Link::new("</script>", "db", Moments::of(1.0))];
        let diagram = Renderer::default().render(&ServiceGraph::build(&links, DuplicateEdgePolicy::default()));
        let page = PageWriter::default().render(&diagram).unwrap();

        assert_eq!(page.matches("</script>").count(), 2);
    }
}
