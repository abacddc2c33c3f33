//! In-memory XML tree behind the SVG device.
//!
//! Nodes live in an arena and are addressed by `NodeId`; the tree is only
//! ever grown, never pruned, so ids stay valid for the whole rendering pass.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Document,
    Element { name: String, attributes: Vec<(String, String)> },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<Node>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        id
    }

    fn element_kind(name: &str) -> NodeKind {
        NodeKind::Element {
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }

    // ── Structure ───────────────────────────────────────────────────

    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.push(parent, Self::element_kind(name));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn prepend_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = self.push(parent, Self::element_kind(name));
        self.nodes[parent.0].children.insert(0, id);
        id
    }

    /// Insert before `before`, or append when it is not a child of `parent`.
    pub fn insert_element_before(&mut self, parent: NodeId, name: &str, before: NodeId) -> NodeId {
        let id = self.push(parent, Self::element_kind(name));
        let children = &mut self.nodes[parent.0].children;
        match children.iter().position(|&c| c == before) {
            Some(index) => children.insert(index, id),
            None => children.push(id),
        }
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(parent, NodeKind::Text(text.to_string()));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self, node: NodeId) -> String {
        self.children(node)
            .iter()
            .filter_map(|&c| match &self.nodes[c.0].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn first_child_named(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.children(node).iter().copied().find(|&c| self.name(c) == Some(name))
    }

    pub fn children_named<'a>(&'a self, node: NodeId, name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.children(node).iter().copied().filter(move |&c| self.name(c) == Some(name))
    }

    /// Depth-first search of the whole document for an element with the
    /// given name and attribute value.
    pub fn find_element(&self, name: &str, attribute: &str, value: &str) -> Option<NodeId> {
        let mut stack = vec![self.document()];
        while let Some(node) = stack.pop() {
            if self.name(node) == Some(name) && self.attribute(node, attribute) == Some(value) {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        None
    }

    // ── Attributes ──────────────────────────────────────────────────

    fn attributes_mut(&mut self, node: NodeId) -> Option<&mut Vec<(String, String)>> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(attributes) = self.attributes_mut(node) {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = value,
                None => attributes.push((name.to_string(), value)),
            }
        }
    }

    /// Set an attribute as the first one of the element.
    pub fn prepend_attribute(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(attributes) = self.attributes_mut(node) {
            attributes.retain(|(n, _)| n != name);
            attributes.insert(0, (name.to_string(), value));
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            NodeKind::Element { attributes, .. } => {
                attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
            }
            _ => None,
        }
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    // ── Import ──────────────────────────────────────────────────────

    /// Copy a parsed XML element (and its subtree) under `parent`.
    /// `id_suffix` is appended to the copied root's `id`.
    pub fn import(&mut self, parent: NodeId, source: roxmltree::Node, id_suffix: Option<&str>) -> NodeId {
        let copy = self.append_element(parent, source.tag_name().name());
        for attr in source.attributes() {
            let name = qualified_name(attr.namespace(), attr.name());
            let value = match (attr.name(), id_suffix) {
                ("id", Some(suffix)) => format!("{}-{suffix}", attr.value()),
                _ => attr.value().to_string(),
            };
            self.set_attribute(copy, &name, value);
        }
        for child in source.children() {
            if child.is_element() {
                self.import(copy, child, None);
            } else if let Some(text) = child.text().filter(|t| !t.trim().is_empty()) {
                self.append_text(copy, text);
            }
        }
        copy
    }

    // ── Serialization ───────────────────────────────────────────────

    /// Serialize the document. `indent` of `None` writes everything on one line.
    pub fn serialize(&self, indent: Option<&str>, declaration: bool) -> String {
        let mut out = String::new();
        if declaration {
            out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>"#);
            if indent.is_some() {
                out.push('\n');
            }
        }
        for &child in self.children(self.document()) {
            self.write_node(&mut out, child, indent, 0);
        }
        out
    }

    fn write_node(&self, out: &mut String, node: NodeId, indent: Option<&str>, depth: usize) {
        let pad = |out: &mut String| {
            if let Some(unit) = indent {
                for _ in 0..depth {
                    out.push_str(unit);
                }
            }
        };
        let newline = |out: &mut String| {
            if indent.is_some() {
                out.push('\n');
            }
        };

        match &self.nodes[node.0].kind {
            NodeKind::Document => {}
            NodeKind::Text(text) => {
                pad(out);
                out.push_str(&escape_text(text));
                newline(out);
            }
            NodeKind::Element { name, attributes } => {
                pad(out);
                let _ = write!(out, "<{name}");
                for (key, value) in attributes {
                    let _ = write!(out, " {key}=\"{}\"", escape_attribute(value));
                }
                let children = self.children(node);
                if children.is_empty() {
                    out.push_str("/>");
                    newline(out);
                    return;
                }
                out.push('>');
                let mixed = children
                    .iter()
                    .any(|&c| matches!(self.nodes[c.0].kind, NodeKind::Text(_)));
                if mixed {
                    // Text content is written inline so no whitespace is added.
                    for &child in children {
                        self.write_node(out, child, None, 0);
                    }
                } else {
                    newline(out);
                    for &child in children {
                        self.write_node(out, child, indent, depth + 1);
                    }
                    pad(out);
                }
                let _ = write!(out, "</{name}>");
                newline(out);
            }
        }
    }
}

fn qualified_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some("http://www.w3.org/1999/xlink") => format!("xlink:{name}"),
        Some("http://www.w3.org/XML/1998/namespace") => format!("xml:{name}"),
        _ => name.to_string(),
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_with_indentation() {
        let mut scene = Scene::new();
        let svg = scene.append_element(scene.document(), "svg");
        scene.set_attribute(svg, "width", "10px");
        let g = scene.append_element(svg, "g");
        scene.append_element(g, "path");
        let desc = scene.prepend_element(svg, "desc");
        scene.append_text(desc, "a < b");

        assert_eq!(
            scene.serialize(Some("  "), false),
            "<svg width=\"10px\">\n  <desc>a &lt; b</desc>\n  <g>\n    <path/>\n  </g>\n</svg>\n"
        );
        assert_eq!(
            scene.serialize(None, true),
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?><svg width=\"10px\"><desc>a &lt; b</desc><g><path/></g></svg>"
        );
    }

    #[test]
    fn attributes_are_replaced_and_prepended() {
        let mut scene = Scene::new();
        let node = scene.append_element(scene.document(), "text");
        scene.set_attribute(node, "x", "1");
        scene.set_attribute(node, "y", "2");
        scene.set_attribute(node, "x", "3");
        scene.prepend_attribute(node, "width", "4");
        assert_eq!(scene.serialize(None, false), r#"<text width="4" x="3" y="2"/>"#);
    }

    #[test]
    fn insert_before_keeps_leaves_ahead_of_groups() {
        let mut scene = Scene::new();
        let root = scene.append_element(scene.document(), "g");
        let group = scene.append_element(root, "g");
        scene.insert_element_before(root, "rect", group);
        scene.insert_element_before(root, "path", group);
        let names: Vec<_> = scene.children(root).iter().map(|&c| scene.name(c).unwrap_or("")).collect();
        assert_eq!(names, vec!["rect", "path", "g"]);
    }

    #[test]
    fn finds_elements_anywhere() {
        let mut scene = Scene::new();
        let root = scene.append_element(scene.document(), "svg");
        let outer = scene.append_element(root, "g");
        let inner = scene.append_element(outer, "g");
        scene.set_attribute(inner, "id", "n1");
        assert_eq!(scene.find_element("g", "id", "n1"), Some(inner));
        assert_eq!(scene.find_element("g", "id", "n2"), None);
    }

    #[test]
    fn imports_parsed_markup_with_suffixed_id() {
        let xml = r#"<symbol id="E952" viewBox="0 0 1000 1000"><path d="M0 0"/></symbol>"#;
        let doc = roxmltree::Document::parse(xml).expect("valid xml");
        let mut scene = Scene::new();
        let defs = scene.append_element(scene.document(), "defs");
        scene.import(defs, doc.root_element(), Some("abc"));
        assert_eq!(
            scene.serialize(None, false),
            r#"<defs><symbol id="E952-abc" viewBox="0 0 1000 1000"><path d="M0 0"/></symbol></defs>"#
        );
    }
}
