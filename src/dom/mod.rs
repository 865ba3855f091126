//! Document tree that equation detection runs against.
//!
//! Pages are parsed with html5ever into an [`ArenaDom`]. The arena is also
//! the mutation surface: renderers that typeset asynchronously are modelled
//! by inserting markup later with [`ArenaDom::insert_html`], and the
//! detection scheduler notices through [`ArenaDom::generation`].
//!
//! # Example
//!
//! ```
//! use mathclip::dom::{parse_html, SelectorSet};
//!
//! let dom = parse_html(r#"<p><span class="katex">x</span></p>"#);
//! let katex = SelectorSet::parse(".katex").unwrap();
//! assert_eq!(katex.select_all(&dom, dom.document()).len(), 1);
//! ```

mod arena;
mod select;
pub mod serialize;
mod tree_sink;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute, Element};
pub use select::SelectorSet;

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

use tree_sink::ArenaSink;

/// Parse an HTML document into an arena DOM.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = ArenaSink::new();
    parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Parse HTML bytes, detecting the encoding first.
pub fn parse_html_bytes(html: &[u8]) -> ArenaDom {
    let hint = crate::util::extract_meta_charset(html);
    let text = crate::util::decode_text(html, hint);
    parse_html(&text)
}

impl ArenaDom {
    /// Parse an HTML fragment and append its nodes under `parent`.
    ///
    /// Returns the top-level nodes that were inserted, in order.
    pub fn insert_html(&mut self, parent: ArenaNodeId, fragment: &str) -> Vec<ArenaNodeId> {
        let parsed = parse_html(fragment);
        let mut inserted = Vec::new();

        // html5ever hoists leading scripts into <head>; keep them in source order
        for section in ["head", "body"] {
            let Some(container) = parsed.find_by_tag(section) else {
                continue;
            };
            for child in parsed.children(container) {
                inserted.push(self.import_node(&parsed, child, parent));
            }
        }
        inserted
    }

    /// Deep-copy a node from another arena and append it under `parent`.
    fn import_node(&mut self, from: &ArenaDom, id: ArenaNodeId, parent: ArenaNodeId) -> ArenaNodeId {
        let copy = match from.get(id).map(|n| &n.data) {
            Some(ArenaNodeData::Element(element)) => {
                self.create_element(element.name.clone(), element.attrs.clone())
            }
            Some(ArenaNodeData::Text(text)) => self.create_text(text.clone()),
            Some(ArenaNodeData::Comment(text)) => self.create_comment(text.clone()),
            _ => return ArenaNodeId::NONE,
        };
        self.append(parent, copy);
        for child in from.children(id) {
            self.import_node(from, child, copy);
        }
        copy
    }

    /// The `<body>` element, if the document has one.
    pub fn body(&self) -> Option<ArenaNodeId> {
        self.find_by_tag("body")
    }
}
