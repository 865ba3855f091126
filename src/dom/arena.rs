//! Arena-allocated document tree.
//!
//! Nodes live in one vector and link to each other by index. Nothing is ever
//! freed: removing a subtree only unlinks it, so an old [`ArenaNodeId`] stays
//! valid to look up and simply reports `is_attached() == false`. That is how
//! the registry notices equations a renderer has thrown away.

use std::collections::HashMap;

use html5ever::{LocalName, Namespace, QualName, ns};

/// Index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaNodeId(pub u32);

impl ArenaNodeId {
    /// Link value meaning "no node".
    pub const NONE: ArenaNodeId = ArenaNodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        *self != Self::NONE
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// An element's name and attributes, with `id` and `class` pre-split for
/// selector matching.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QualName,
    pub attrs: Vec<Attribute>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Element {
    fn new(name: QualName, attrs: Vec<Attribute>) -> Self {
        let mut element = Self {
            name,
            attrs,
            id: None,
            classes: Vec::new(),
        };
        element.reindex();
        element
    }

    fn reindex(&mut self) {
        self.id = self.attr("id").map(str::to_string);
        self.classes = self
            .attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
    }

    /// Value of an attribute by local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.local.as_ref() == local)
            .map(|a| a.value.as_str())
    }

    pub fn local_name(&self) -> &str {
        self.name.local.as_ref()
    }
}

#[derive(Debug, Clone)]
pub enum ArenaNodeData {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node plus its tree links.
#[derive(Debug)]
pub struct ArenaNode {
    pub data: ArenaNodeData,
    pub parent: ArenaNodeId,
    pub first_child: ArenaNodeId,
    pub last_child: ArenaNodeId,
    pub prev_sibling: ArenaNodeId,
    pub next_sibling: ArenaNodeId,
}

impl ArenaNode {
    fn element(&self) -> Option<&Element> {
        match &self.data {
            ArenaNodeData::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// Document tree with a mutation counter.
///
/// [`generation`](ArenaDom::generation) moves on every structural change
/// (append, insert, detach, text merge) and stays put on attribute writes,
/// so the detection scheduler can ignore its own marker attributes.
pub struct ArenaDom {
    nodes: Vec<ArenaNode>,
    by_id: HashMap<String, ArenaNodeId>,
    generation: u64,
}

impl Default for ArenaDom {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaDom {
    /// An empty tree holding only the document node.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            by_id: HashMap::new(),
            generation: 0,
        };
        dom.alloc(ArenaNodeData::Document);
        dom
    }

    fn alloc(&mut self, data: ArenaNodeData) -> ArenaNodeId {
        let id = ArenaNodeId(self.nodes.len() as u32);
        self.nodes.push(ArenaNode {
            data,
            parent: ArenaNodeId::NONE,
            first_child: ArenaNodeId::NONE,
            last_child: ArenaNodeId::NONE,
            prev_sibling: ArenaNodeId::NONE,
            next_sibling: ArenaNodeId::NONE,
        });
        id
    }

    pub fn document(&self) -> ArenaNodeId {
        ArenaNodeId(0)
    }

    /// Number of structural mutations applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, id: ArenaNodeId) -> Option<&ArenaNode> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: ArenaNodeId) -> Option<&mut ArenaNode> {
        self.nodes.get_mut(id.0 as usize)
    }

    /// Nodes ever allocated, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the document node exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> ArenaNodeId {
        let element = Element::new(name, attrs);
        let key = element.id.clone();
        let node = self.alloc(ArenaNodeData::Element(element));
        if let Some(key) = key {
            self.by_id.insert(key, node);
        }
        node
    }

    pub fn create_text(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNodeData::Text(text))
    }

    pub fn create_comment(&mut self, text: String) -> ArenaNodeId {
        self.alloc(ArenaNodeData::Comment(text))
    }

    pub fn create_doctype(&mut self, name: String) -> ArenaNodeId {
        self.alloc(ArenaNodeData::Doctype(name))
    }

    // Structure

    /// Link a detached `node` under `parent` between `prev` and `next`.
    fn splice(&mut self, node: ArenaNodeId, parent: ArenaNodeId, prev: ArenaNodeId, next: ArenaNodeId) {
        if let Some(n) = self.node_mut(node) {
            n.parent = parent;
            n.prev_sibling = prev;
            n.next_sibling = next;
        }
        match self.node_mut(prev) {
            Some(p) => p.next_sibling = node,
            None => {
                if let Some(p) = self.node_mut(parent) {
                    p.first_child = node;
                }
            }
        }
        match self.node_mut(next) {
            Some(n) => n.prev_sibling = node,
            None => {
                if let Some(p) = self.node_mut(parent) {
                    p.last_child = node;
                }
            }
        }
        self.generation += 1;
    }

    /// Remove `node` from its sibling chain. Returns false if it had no parent.
    fn unlink(&mut self, node: ArenaNodeId) -> bool {
        let Some(n) = self.get(node) else {
            return false;
        };
        let (parent, prev, next) = (n.parent, n.prev_sibling, n.next_sibling);
        if parent.is_none() {
            return false;
        }
        match self.node_mut(prev) {
            Some(p) => p.next_sibling = next,
            None => {
                if let Some(p) = self.node_mut(parent) {
                    p.first_child = next;
                }
            }
        }
        match self.node_mut(next) {
            Some(n) => n.prev_sibling = prev,
            None => {
                if let Some(p) = self.node_mut(parent) {
                    p.last_child = prev;
                }
            }
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = ArenaNodeId::NONE;
            n.prev_sibling = ArenaNodeId::NONE;
            n.next_sibling = ArenaNodeId::NONE;
        }
        true
    }

    /// Make `child` the last child of `parent`, moving it if already placed.
    pub fn append(&mut self, parent: ArenaNodeId, child: ArenaNodeId) {
        self.unlink(child);
        let last = self.get(parent).map_or(ArenaNodeId::NONE, |p| p.last_child);
        self.splice(child, parent, last, ArenaNodeId::NONE);
    }

    /// Place `node` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: ArenaNodeId, node: ArenaNodeId) {
        self.unlink(node);
        let Some(s) = self.get(sibling) else {
            return;
        };
        let (parent, prev) = (s.parent, s.prev_sibling);
        self.splice(node, parent, prev, sibling);
    }

    /// Append text, merging into a trailing text node when there is one.
    pub fn append_text(&mut self, parent: ArenaNodeId, text: &str) {
        let last = self.get(parent).map_or(ArenaNodeId::NONE, |p| p.last_child);
        if let Some(ArenaNode {
            data: ArenaNodeData::Text(existing),
            ..
        }) = self.node_mut(last)
        {
            existing.push_str(text);
            self.generation += 1;
            return;
        }
        let node = self.create_text(text.to_string());
        self.append(parent, node);
    }

    /// Unlink a node from its parent. Its own subtree stays intact.
    pub fn detach(&mut self, node: ArenaNodeId) {
        if self.unlink(node) {
            self.generation += 1;
        }
    }

    /// Move every child of `node` under `new_parent`, preserving order.
    pub fn reparent_children(&mut self, node: ArenaNodeId, new_parent: ArenaNodeId) {
        let moving: Vec<_> = self.children(node).collect();
        for child in moving {
            self.append(new_parent, child);
        }
    }

    // Attributes

    fn update_attrs(&mut self, node: ArenaNodeId, edit: impl FnOnce(&mut Vec<Attribute>)) {
        let Some(ArenaNode {
            data: ArenaNodeData::Element(element),
            ..
        }) = self.nodes.get_mut(node.0 as usize)
        else {
            return;
        };
        let old_key = element.id.clone();
        edit(&mut element.attrs);
        element.reindex();
        let new_key = element.id.clone();

        if let Some(old) = old_key
            && self.by_id.get(&old) == Some(&node)
        {
            self.by_id.remove(&old);
        }
        if let Some(new) = new_key {
            self.by_id.insert(new, node);
        }
    }

    /// Set or replace an attribute. Does not count as a structural change.
    pub fn set_attr(&mut self, node: ArenaNodeId, local: &str, value: &str) {
        self.update_attrs(node, |attrs| {
            match attrs.iter_mut().find(|a| a.name.local.as_ref() == local) {
                Some(attr) => attr.value = value.to_string(),
                None => attrs.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(local)),
                    value: value.to_string(),
                }),
            }
        });
    }

    pub fn remove_attr(&mut self, node: ArenaNodeId, local: &str) {
        self.update_attrs(node, |attrs| attrs.retain(|a| a.name.local.as_ref() != local));
    }

    // Navigation

    pub fn get_by_id(&self, id: &str) -> Option<ArenaNodeId> {
        self.by_id.get(id).copied()
    }

    pub fn parent(&self, id: ArenaNodeId) -> ArenaNodeId {
        self.get(id).map_or(ArenaNodeId::NONE, |n| n.parent)
    }

    pub fn children(&self, parent: ArenaNodeId) -> Children<'_> {
        Children {
            dom: self,
            next: self.get(parent).map_or(ArenaNodeId::NONE, |n| n.first_child),
        }
    }

    /// Pre-order walk of the subtree at `root`, root first.
    pub fn subtree(&self, root: ArenaNodeId) -> Subtree<'_> {
        Subtree {
            dom: self,
            root,
            next: if self.get(root).is_some() { root } else { ArenaNodeId::NONE },
        }
    }

    /// Pre-order walk below `root`.
    pub fn descendants(&self, root: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
        self.subtree(root).skip(1)
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self, id: ArenaNodeId) -> impl Iterator<Item = ArenaNodeId> + '_ {
        std::iter::successors(Some(self.parent(id)), |&p| Some(self.parent(p))).take_while(|p| p.is_some())
    }

    /// Reachable from the document node.
    pub fn is_attached(&self, id: ArenaNodeId) -> bool {
        self.get(id).is_some() && self.contains(self.document(), id)
    }

    /// `node` is `ancestor` or lies below it.
    pub fn contains(&self, ancestor: ArenaNodeId, node: ArenaNodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    pub fn find_by_tag(&self, tag: &str) -> Option<ArenaNodeId> {
        self.find_tag_in(self.document(), tag)
    }

    pub fn find_tag_in(&self, root: ArenaNodeId, tag: &str) -> Option<ArenaNodeId> {
        self.subtree(root).find(|&id| self.is_tag(id, tag))
    }

    pub fn find_class_in(&self, root: ArenaNodeId, class: &str) -> Option<ArenaNodeId> {
        self.subtree(root).find(|&id| self.has_class(id, class))
    }

    // Node accessors

    pub fn element(&self, id: ArenaNodeId) -> Option<&Element> {
        self.get(id).and_then(ArenaNode::element)
    }

    pub fn is_element(&self, id: ArenaNodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn element_name(&self, id: ArenaNodeId) -> Option<&LocalName> {
        self.element(id).map(|e| &e.name.local)
    }

    pub fn element_namespace(&self, id: ArenaNodeId) -> Option<&Namespace> {
        self.element(id).map(|e| &e.name.ns)
    }

    pub fn is_tag(&self, id: ArenaNodeId, tag: &str) -> bool {
        self.element(id).is_some_and(|e| e.local_name() == tag)
    }

    pub fn attrs(&self, id: ArenaNodeId) -> &[Attribute] {
        self.element(id).map(|e| e.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn get_attr(&self, id: ArenaNodeId, local: &str) -> Option<&str> {
        self.element(id)?.attr(local)
    }

    pub fn element_id(&self, id: ArenaNodeId) -> Option<&str> {
        self.element(id)?.id.as_deref()
    }

    pub fn element_classes(&self, id: ArenaNodeId) -> &[String] {
        self.element(id).map(|e| e.classes.as_slice()).unwrap_or(&[])
    }

    pub fn has_class(&self, id: ArenaNodeId, class: &str) -> bool {
        self.element_classes(id).iter().any(|c| c == class)
    }

    /// Text of a text node.
    pub fn text_content(&self, id: ArenaNodeId) -> Option<&str> {
        match &self.get(id)?.data {
            ArenaNodeData::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Every text node under `root` concatenated in document order.
    pub fn deep_text(&self, root: ArenaNodeId) -> String {
        self.subtree(root).filter_map(|id| self.text_content(id)).collect()
    }
}

pub struct Children<'a> {
    dom: &'a ArenaDom,
    next: ArenaNodeId,
}

impl Iterator for Children<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<ArenaNodeId> {
        let current = self.next;
        self.next = self.dom.get(current)?.next_sibling;
        Some(current)
    }
}

/// Pre-order iterator driven by the sibling links, no stack.
pub struct Subtree<'a> {
    dom: &'a ArenaDom,
    root: ArenaNodeId,
    next: ArenaNodeId,
}

impl Subtree<'_> {
    /// Next node after `from` once its children are exhausted, bounded by root.
    fn climb(&self, mut from: ArenaNodeId) -> ArenaNodeId {
        while from != self.root {
            let Some(node) = self.dom.get(from) else {
                break;
            };
            if node.next_sibling.is_some() {
                return node.next_sibling;
            }
            from = node.parent;
        }
        ArenaNodeId::NONE
    }
}

impl Iterator for Subtree<'_> {
    type Item = ArenaNodeId;

    fn next(&mut self) -> Option<ArenaNodeId> {
        let current = self.next;
        let node = self.dom.get(current)?;
        self.next = if node.first_child.is_some() {
            node.first_child
        } else {
            self.climb(current)
        };
        Some(current)
    }
}
