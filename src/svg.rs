//! Minimal retained SVG element tree
//!
//! Rendered diagrams are kept as a tree of [`Element`]s so post-draw hooks can
//! tag them and hover handlers can toggle their classes before serialization.

use std::collections::HashMap;

use crate::interaction::ClassTarget;

/// Escape text for use in XML content and attribute values
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    Text(String),
}

/// An SVG element with attributes, an ordered class list and children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
    classes: Vec<String>,
    children: Vec<Content>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            classes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`Element::set_attr`]
    pub fn attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`Element::add_class`]
    pub fn class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    /// Builder form of [`Element::push`]
    pub fn child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Content::Text(text.into()));
        self
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl ToString) {
        let name = name.into();
        let value = value.to_string();
        match self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.get_attr("id")
    }

    /// Add a class; no-op when already present
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    /// Remove a class; no-op when absent
    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Content::Element(child));
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Content::Element(e) => Some(e),
            Content::Text(_) => None,
        })
    }

    /// Concatenated text content of this element and its descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Content::Text(t) => out.push_str(t),
                Content::Element(e) => out.push_str(&e.text_content()),
            }
        }
        out
    }

    pub fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
        }
        if !self.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape(&self.classes.join(" "))));
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in &self.children {
            match child {
                Content::Element(e) => e.write_to(out),
                Content::Text(t) => out.push_str(&escape(t)),
            }
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

/// An element tree with an id lookup table
///
/// Paths are child positions from the root, recorded once when the document
/// is created; the tree's shape does not change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    root: Element,
    paths: HashMap<String, Vec<usize>>,
}

impl SvgDocument {
    pub fn new(root: Element) -> Self {
        let mut paths = HashMap::new();
        let mut path = Vec::new();
        collect_paths(&root, &mut path, &mut paths);
        Self { root, paths }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        let path = self.paths.get(id)?;
        let mut current = &self.root;
        for &i in path {
            current = match current.children.get(i)? {
                Content::Element(e) => e,
                Content::Text(_) => return None,
            };
        }
        Some(current)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        let path = self.paths.get(id)?;
        let mut current = &mut self.root;
        for &i in path {
            current = match current.children.get_mut(i)? {
                Content::Element(e) => e,
                Content::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Ids of every element carrying `class`
    pub fn ids_with_class(&self, class: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .paths
            .keys()
            .filter(|id| self.element(id).is_some_and(|e| e.has_class(class)))
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn to_svg_string(&self) -> String {
        self.root.to_markup()
    }
}

fn collect_paths(element: &Element, path: &mut Vec<usize>, paths: &mut HashMap<String, Vec<usize>>) {
    if let Some(id) = element.id() {
        paths.insert(id.to_string(), path.clone());
    }
    for (i, child) in element.children.iter().enumerate() {
        if let Content::Element(e) = child {
            path.push(i);
            collect_paths(e, path, paths);
            path.pop();
        }
    }
}

impl ClassTarget for SvgDocument {
    fn add_class(&mut self, element_id: &str, class: &str) {
        if let Some(element) = self.element_mut(element_id) {
            element.add_class(class);
        }
    }

    fn remove_class(&mut self, element_id: &str, class: &str) {
        if let Some(element) = self.element_mut(element_id) {
            element.remove_class(class);
        }
    }
}
