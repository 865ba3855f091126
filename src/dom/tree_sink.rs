//! html5ever `TreeSink` that builds an [`ArenaDom`].
//!
//! html5ever drives the sink through `&self`, so the arena sits behind a
//! `RefCell` for the duration of a parse.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};

use html5ever::interface::ElemName;
use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as ParsedAttribute, LocalName, Namespace, QualName, local_name, ns};

use super::arena::{ArenaDom, ArenaNodeId, Attribute};

/// Element name handed back to the tree builder.
///
/// Owned (atoms are refcounted) so no borrow of the arena escapes the
/// `RefCell` guard.
#[derive(Debug)]
pub struct SinkName(QualName);

impl ElemName for SinkName {
    fn ns(&self) -> &Namespace {
        &self.0.ns
    }

    fn local_name(&self) -> &LocalName {
        &self.0.local
    }
}

pub struct ArenaSink {
    dom: RefCell<ArenaDom>,
    recovered: Cell<usize>,
}

impl Default for ArenaSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaSink {
    pub fn new() -> Self {
        Self {
            dom: RefCell::new(ArenaDom::new()),
            recovered: Cell::new(0),
        }
    }

    pub fn into_dom(self) -> ArenaDom {
        let recovered = self.recovered.get();
        if recovered > 0 {
            tracing::trace!(recovered, "html parse recovered from errors");
        }
        self.dom.into_inner()
    }

    fn insert(&self, child: NodeOrText<ArenaNodeId>, place: impl FnOnce(&mut ArenaDom, ArenaNodeId)) {
        let mut dom = self.dom.borrow_mut();
        let node = match child {
            NodeOrText::AppendNode(node) => node,
            NodeOrText::AppendText(text) => dom.create_text(text.to_string()),
        };
        place(&mut dom, node);
    }
}

impl TreeSink for ArenaSink {
    type Handle = ArenaNodeId;
    type Output = Self;
    type ElemName<'a>
        = SinkName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: Cow<'static, str>) {
        // Pages in the wild are malformed; recover like a browser does
        self.recovered.set(self.recovered.get() + 1);
    }

    fn get_document(&self) -> ArenaNodeId {
        self.dom.borrow().document()
    }

    fn elem_name<'a>(&'a self, target: &'a ArenaNodeId) -> SinkName {
        let dom = self.dom.borrow();
        let name = dom.element(*target).map(|e| e.name.clone());
        SinkName(name.unwrap_or_else(|| QualName::new(None, ns!(), local_name!(""))))
    }

    fn create_element(&self, name: QualName, attrs: Vec<ParsedAttribute>, _flags: ElementFlags) -> ArenaNodeId {
        let attrs = attrs
            .into_iter()
            .map(|a| Attribute {
                name: a.name,
                value: a.value.to_string(),
            })
            .collect();
        self.dom.borrow_mut().create_element(name, attrs)
    }

    fn create_comment(&self, text: StrTendril) -> ArenaNodeId {
        self.dom.borrow_mut().create_comment(text.to_string())
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> ArenaNodeId {
        self.dom.borrow_mut().create_comment(String::new())
    }

    fn append(&self, parent: &ArenaNodeId, child: NodeOrText<ArenaNodeId>) {
        match child {
            // Adjacent text merges into the previous text node
            NodeOrText::AppendText(text) => self.dom.borrow_mut().append_text(*parent, &text),
            node => self.insert(node, |dom, n| dom.append(*parent, n)),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &ArenaNodeId,
        prev_element: &ArenaNodeId,
        child: NodeOrText<ArenaNodeId>,
    ) {
        let attached = self.dom.borrow().parent(*element).is_some();
        if attached {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&self, name: StrTendril, _public_id: StrTendril, _system_id: StrTendril) {
        let mut dom = self.dom.borrow_mut();
        let doctype = dom.create_doctype(name.to_string());
        let document = dom.document();
        dom.append(document, doctype);
    }

    fn get_template_contents(&self, target: &ArenaNodeId) -> ArenaNodeId {
        // Template contents stay inline; nothing renders math inside them
        *target
    }

    fn same_node(&self, x: &ArenaNodeId, y: &ArenaNodeId) -> bool {
        x == y
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &ArenaNodeId, new_node: NodeOrText<ArenaNodeId>) {
        self.insert(new_node, |dom, n| dom.insert_before(*sibling, n));
    }

    fn add_attrs_if_missing(&self, target: &ArenaNodeId, attrs: Vec<ParsedAttribute>) {
        let mut dom = self.dom.borrow_mut();
        for attr in attrs {
            let name = attr.name.local.as_ref();
            if dom.get_attr(*target, name).is_none() {
                dom.set_attr(*target, name, &attr.value);
            }
        }
    }

    fn remove_from_parent(&self, target: &ArenaNodeId) {
        self.dom.borrow_mut().detach(*target);
    }

    fn reparent_children(&self, node: &ArenaNodeId, new_parent: &ArenaNodeId) {
        self.dom.borrow_mut().reparent_children(*node, *new_parent);
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::parse_html;

    #[test]
    fn test_mathml_keeps_namespace_and_annotation() {
        let dom = parse_html(
            r#"<p><math xmlns="http://www.w3.org/1998/Math/MathML" display="block"><semantics><mi>x</mi><annotation encoding="application/x-tex">x</annotation></semantics></math></p>"#,
        );

        let math = dom.find_by_tag("math").expect("should find math");
        assert_eq!(
            dom.element_namespace(math).map(|n| n.as_ref()),
            Some("http://www.w3.org/1998/Math/MathML")
        );
        assert_eq!(dom.get_attr(math, "display"), Some("block"));

        let annotation = dom.find_by_tag("annotation").expect("annotation");
        assert_eq!(dom.deep_text(annotation), "x");
    }

    #[test]
    fn test_text_runs_are_merged() {
        let dom = parse_html("<p>a&amp;b</p>");
        let p = dom.find_by_tag("p").unwrap();
        assert_eq!(dom.children(p).count(), 1);
        assert_eq!(dom.deep_text(p), "a&b");
    }

    #[test]
    fn test_misnested_markup_is_recovered() {
        let dom = parse_html("<p><b>bold <i>both</b> italic</i></p>");
        assert!(dom.find_by_tag("i").is_some());
        assert!(dom.deep_text(dom.document()).contains("italic"));
    }

    #[test]
    fn test_table_foster_parenting() {
        let dom = parse_html("<table><math><mi>x</mi></math><tr><td>1</td></tr></table>");
        let math = dom.find_by_tag("math").unwrap();
        let table = dom.find_by_tag("table").unwrap();
        assert!(!dom.contains(table, math));
        assert!(dom.is_attached(math));
    }
}
