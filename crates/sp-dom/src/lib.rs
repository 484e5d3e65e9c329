//! Arena-backed document tree.
//!
//! Nodes are addressed by [`NodeId`]. Ids are handed out monotonically and never reused, so a
//! stale id held across a patch resolves to nothing instead of some unrelated node.
//! [`Document::remove_children`] frees the removed subtrees; [`Document::detach`] keeps them.

mod serialize;

pub use serialize::is_raw_text_tag;
pub use serialize::is_void;

use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::collections::BTreeMap;

/// ID used to address nodes in the document arena.
pub type NodeId = usize;

const ROOT: NodeId = 0;

/// Payload carried by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

/// Element name plus attributes in source order. Names are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(tag: &str, attrs: Vec<(String, String)>) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|value| value.split_ascii_whitespace().any(|token| token == class))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// Mutable HTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            data: NodeData::Document,
        };
        Self {
            nodes: BTreeMap::from([(ROOT, root)]),
            next_id: ROOT + 1,
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(&id).map(|node| &node.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.data(id) {
            Some(NodeData::Element(element)) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> SpliceResult<&mut Element> {
        match self.nodes.get_mut(&id).map(|node| &mut node.data) {
            Some(NodeData::Element(element)) => Ok(element),
            Some(_) => Err(SpliceError::new(
                "dom.not_an_element",
                format!("node {id} is not an element"),
            )),
            None => Err(unknown_node(id)),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn create_element(&mut self, tag: &str, attrs: Vec<(String, String)>) -> NodeId {
        self.push_node(NodeData::Element(Element::new(tag, attrs)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Comment(text.into()))
    }

    pub fn create_doctype(&mut self, name: impl Into<String>) -> NodeId {
        self.push_node(NodeData::Doctype(name.into()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                parent: None,
                children: Vec::new(),
                data,
            },
        );
        id
    }

    /// Links a fresh, parentless node under `parent` without hierarchy checks.
    fn link_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    /// Appends `child` to `parent`, moving it out of its previous parent if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> SpliceResult<()> {
        let Some(parent_node) = self.nodes.get(&parent) else {
            return Err(unknown_node(parent));
        };
        if !matches!(parent_node.data, NodeData::Document | NodeData::Element(_)) {
            return Err(SpliceError::new(
                "dom.hierarchy_invalid",
                format!("node {parent} cannot have children"),
            ));
        }
        let Some(child_node) = self.nodes.get(&child) else {
            return Err(unknown_node(child));
        };
        // A childless node can only be an inclusive ancestor of itself.
        let may_contain_parent = !child_node.children.is_empty();
        if child == ROOT
            || child == parent
            || (may_contain_parent && self.is_inclusive_ancestor(child, parent))
        {
            return Err(SpliceError::new(
                "dom.hierarchy_invalid",
                format!("appending node {child} under {parent} would create a cycle"),
            ));
        }

        self.detach(child);
        self.link_child(parent, child);
        Ok(())
    }

    /// Removes `id` from its parent. The subtree stays addressable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|candidate| *candidate != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    /// Removes and frees every child subtree of `id`. Ids inside them become unknown.
    pub fn remove_children(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let children = std::mem::take(&mut node.children);
        for child in children {
            self.free_subtree(child);
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let doomed: Vec<NodeId> = std::iter::once(id).chain(self.descendants(id)).collect();
        for node in doomed {
            self.nodes.remove(&node);
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parent(node) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// True when the node is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id) && self.is_inclusive_ancestor(ROOT, id)
    }

    /// Pre-order walk of the subtree below `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants {
            document: self,
            stack,
        }
    }

    pub fn get_element_by_id(&self, id_value: &str) -> Option<NodeId> {
        if id_value.is_empty() {
            return None;
        }

        self.descendants(ROOT).find(|candidate| {
            self.element(*candidate)
                .and_then(|element| element.attr("id"))
                .is_some_and(|value| value == id_value)
        })
    }

    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(ROOT)
            .filter(|candidate| {
                self.tag_name(*candidate)
                    .is_some_and(|name| name.eq_ignore_ascii_case(tag))
            })
            .collect()
    }

    /// Nearest inclusive ancestor element whose tag is one of `tags`.
    pub fn closest(&self, start: NodeId, tags: &[&str]) -> Option<NodeId> {
        let mut current = Some(start);
        while let Some(id) = current {
            if self
                .tag_name(id)
                .is_some_and(|name| tags.iter().any(|tag| name.eq_ignore_ascii_case(tag)))
            {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|element| element.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> SpliceResult<()> {
        let element = self.element_mut(id)?;
        let name = name.to_ascii_lowercase();
        match element.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => element.attrs.push((name, value.to_owned())),
        }
        Ok(())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> SpliceResult<()> {
        let element = self.element_mut(id)?;
        element
            .attrs
            .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        Ok(())
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .is_some_and(|element| element.has_class(class))
    }

    /// Adds a class token. Returns whether the class list changed.
    pub fn add_class(&mut self, id: NodeId, class: &str) -> SpliceResult<bool> {
        if self.has_class(id, class) {
            return Ok(false);
        }

        let mut tokens = class_tokens(self.attr(id, "class"));
        tokens.push(class.to_owned());
        self.set_attr(id, "class", &tokens.join(" "))?;
        Ok(true)
    }

    /// Removes a class token. Returns whether the class list changed.
    pub fn remove_class(&mut self, id: NodeId, class: &str) -> SpliceResult<bool> {
        if !self.has_class(id, class) {
            return Ok(false);
        }

        let tokens: Vec<String> = class_tokens(self.attr(id, "class"))
            .into_iter()
            .filter(|token| token != class)
            .collect();
        if tokens.is_empty() {
            self.remove_attr(id, "class")?;
        } else {
            self.set_attr(id, "class", &tokens.join(" "))?;
        }
        Ok(true)
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(NodeData::Text(text)) = self.data(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let Some(NodeData::Text(text)) = self.data(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Text of the first `<title>` element, whitespace-collapsed.
    pub fn title(&self) -> String {
        self.elements_by_tag("title")
            .first()
            .map(|title| collapse_whitespace(&self.text_content(*title)))
            .unwrap_or_default()
    }

    /// Replaces the text of the first `<title>`, creating one under `<head>` when absent.
    pub fn set_title(&mut self, title: &str) -> SpliceResult<()> {
        let title_node = match self.elements_by_tag("title").first().copied() {
            Some(existing) => existing,
            None => {
                let head = self.ensure_head()?;
                let created = self.create_element("title", Vec::new());
                self.append_child(head, created)?;
                created
            }
        };

        self.remove_children(title_node);
        if !title.is_empty() {
            let text = self.create_text(title);
            self.append_child(title_node, text)?;
        }
        Ok(())
    }

    fn ensure_head(&mut self) -> SpliceResult<NodeId> {
        if let Some(head) = self.elements_by_tag("head").first().copied() {
            return Ok(head);
        }

        let parent = match self.elements_by_tag("html").first().copied() {
            Some(html) => html,
            None => ROOT,
        };
        let head = self.create_element("head", Vec::new());
        self.append_child(parent, head)?;
        if let Some(children) = self.nodes.get_mut(&parent).map(|node| &mut node.children) {
            children.retain(|candidate| *candidate != head);
            children.insert(0, head);
        }
        Ok(head)
    }

    /// Deep-copies `source_id` from another document into this arena, detached.
    ///
    /// Walks with an explicit stack, so nesting depth is bounded only by memory.
    pub fn import_subtree(&mut self, source: &Document, source_id: NodeId) -> SpliceResult<NodeId> {
        let copy = self.import_node(source, source_id)?;
        let mut pending = vec![(source_id, copy)];
        while let Some((from, to)) = pending.pop() {
            for child in source.children(from) {
                let imported = match self.import_node(source, *child) {
                    Ok(imported) => imported,
                    Err(error) => {
                        self.free_subtree(copy);
                        return Err(error);
                    }
                };
                self.link_child(to, imported);
                pending.push((*child, imported));
            }
        }
        Ok(copy)
    }

    fn import_node(&mut self, source: &Document, source_id: NodeId) -> SpliceResult<NodeId> {
        match source.data(source_id) {
            Some(NodeData::Document) => Err(SpliceError::new(
                "dom.import_invalid",
                "document nodes cannot be imported",
            )),
            Some(data) => Ok(self.push_node(data.clone())),
            None => Err(unknown_node(source_id)),
        }
    }

    /// Replaces the children of `target` with copies of the children of `source_parent`.
    ///
    /// Returns the number of top-level nodes inserted.
    pub fn replace_children_with(
        &mut self,
        target: NodeId,
        source: &Document,
        source_parent: NodeId,
    ) -> SpliceResult<usize> {
        if self.element(target).is_none() {
            return Err(SpliceError::new(
                "dom.not_an_element",
                format!("patch target {target} is not an element"),
            ));
        }

        let mut imported = Vec::with_capacity(source.children(source_parent).len());
        for child in source.children(source_parent) {
            match self.import_subtree(source, *child) {
                Ok(node) => imported.push(node),
                Err(error) => {
                    for node in imported {
                        self.free_subtree(node);
                    }
                    return Err(error);
                }
            }
        }

        self.remove_children(target);
        for node in &imported {
            self.append_child(target, *node)?;
        }
        Ok(imported.len())
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            serialize::write_node(self, *child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, id, &mut out);
        out
    }

    pub fn to_html(&self) -> String {
        self.inner_html(ROOT)
    }

    /// Number of nodes reachable from the root, root included.
    pub fn connected_node_count(&self) -> usize {
        1 + self.descendants(ROOT).count()
    }

    /// Number of nodes held by the arena, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Iterator returned by [`Document::descendants`].
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack
            .extend(self.document.children(next).iter().rev().copied());
        Some(next)
    }
}

fn unknown_node(id: NodeId) -> SpliceError {
    SpliceError::new("dom.unknown_node", format!("node {id} does not exist"))
}

fn class_tokens(value: Option<&str>) -> Vec<String> {
    value
        .map(|value| {
            value
                .split_ascii_whitespace()
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
