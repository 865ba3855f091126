//! Equation discovery and at-most-once tagging.
//!
//! [`EquationRegistry::discover`] walks a subtree in document order and
//! resolves every rendered equation to exactly one container element.
//! Container subtrees are never entered, so the pieces a renderer nests
//! inside its wrapper (KaTeX's MathML copy, MathJax's assistive markup)
//! cannot surface as second containers. [`EquationRegistry::register`] then
//! tags each container with a marker attribute and records it in a
//! membership table keyed by node.
//!
//! The registry never owns document nodes. Entries hold arena ids, and an
//! entry whose node has been detached is dropped on the next
//! [`reconcile`](EquationRegistry::reconcile) or failed lookup.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::dom::{ArenaDom, ArenaNodeId, SelectorSet};
use crate::error::Result;

/// Attribute written on every tagged container.
pub const TAG_ATTR: &str = "data-mathclip-id";

/// Custom attributes that carry raw LaTeX or MathML source.
pub const DATA_ATTRIBUTES: [&str; 5] = ["data-latex", "data-tex", "data-mathml", "data-math", "data-equation"];

/// Operators, relations and Greek letters that make text look like math.
static MATH_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[=+×÷±∓∑∏∫∮√∞≤≥≠≈≡∂∇∈∉⊂∪∩∀∃→⇒^_α-ωΑ-Ω]").expect("static regex")
});

/// Which renderer produced a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RendererKind {
    #[serde(rename = "katex")]
    KaTeX,
    #[serde(rename = "mathjax-v2")]
    MathJaxV2,
    #[serde(rename = "mathjax-v3")]
    MathJaxV3,
    #[serde(rename = "mathml")]
    NativeMathML,
    #[serde(rename = "data-attribute")]
    DataAttribute,
    #[serde(rename = "generic")]
    Generic,
}

impl RendererKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RendererKind::KaTeX => "katex",
            RendererKind::MathJaxV2 => "mathjax-v2",
            RendererKind::MathJaxV3 => "mathjax-v3",
            RendererKind::NativeMathML => "mathml",
            RendererKind::DataAttribute => "data-attribute",
            RendererKind::Generic => "generic",
        }
    }

    /// Third-party renderers, as opposed to the attribute and heuristic paths.
    pub fn is_renderer(self) -> bool {
        !matches!(self, RendererKind::DataAttribute | RendererKind::Generic)
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier assigned when a container is tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EquationId(pub u32);

impl fmt::Display for EquationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interaction state shown on a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualState {
    #[default]
    Idle,
    Hover,
    Copying,
    Success,
    Error,
}

/// A container found by [`EquationRegistry::discover`], not yet tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub node: ArenaNodeId,
    pub kind: RendererKind,
}

/// One tagged equation.
#[derive(Debug, Clone)]
pub struct EquationContainer {
    pub id: EquationId,
    pub node: ArenaNodeId,
    pub kind: RendererKind,
    pub selected: bool,
    pub visual_state: VisualState,
}

/// Compiled selectors for every renderer's DOM shapes.
struct Detector {
    katex: SelectorSet,
    katex_display: SelectorSet,
    mathjax_v3: SelectorSet,
    mathjax_v2: SelectorSet,
    mathjax_v2_display: SelectorSet,
    mathml: SelectorSet,
    generic: SelectorSet,
}

impl Detector {
    fn new() -> Result<Self> {
        Ok(Self {
            katex: SelectorSet::parse(".katex")?,
            katex_display: SelectorSet::parse(".katex-display")?,
            mathjax_v3: SelectorSet::parse("mjx-container")?,
            mathjax_v2: SelectorSet::parse(
                r#".MathJax, .MathJax_CHTML, .MathJax_SVG, [id^="MathJax-Element-"][id$="-Frame"]"#,
            )?,
            mathjax_v2_display: SelectorSet::parse(
                ".MathJax_Display, .MathJax_SVG_Display, div.MJXc-display",
            )?,
            mathml: SelectorSet::parse("math")?,
            generic: SelectorSet::parse(r#".math, .equation, .formula, [role="math"]"#)?,
        })
    }

    /// Renderer kind of `node` when it is itself a renderer container.
    fn renderer_kind(&self, dom: &ArenaDom, node: ArenaNodeId) -> Option<RendererKind> {
        if self.katex.matches(dom, node) {
            Some(RendererKind::KaTeX)
        } else if self.mathjax_v3.matches(dom, node) {
            Some(RendererKind::MathJaxV3)
        } else if self.mathjax_v2.matches(dom, node) {
            Some(RendererKind::MathJaxV2)
        } else if self.mathml.matches(dom, node) {
            Some(RendererKind::NativeMathML)
        } else {
            None
        }
    }

    /// Nearest renderer container at or above `node`.
    ///
    /// A `<math>` element is only its own container when no other renderer
    /// wraps it: KaTeX and MathJax both embed MathML inside their wrappers.
    fn enclosing(&self, dom: &ArenaDom, node: ArenaNodeId) -> Option<Candidate> {
        let mut mathml = None;
        for a in std::iter::once(node).chain(dom.ancestors(node)) {
            match self.renderer_kind(dom, a) {
                Some(RendererKind::NativeMathML) => {
                    mathml.get_or_insert(Candidate {
                        node: a,
                        kind: RendererKind::NativeMathML,
                    });
                }
                Some(kind) => return Some(Candidate { node: a, kind }),
                None => {}
            }
        }
        mathml
    }

    fn contains_renderer(&self, dom: &ArenaDom, node: ArenaNodeId) -> bool {
        dom.descendants(node)
            .any(|d| self.renderer_kind(dom, d).is_some())
    }

    /// Resolve a node met during the document-order walk.
    ///
    /// The walk never descends into a renderer container, so renderer
    /// matches here are always outermost.
    fn classify(&self, dom: &ArenaDom, node: ArenaNodeId) -> Classification {
        if let Some(kind) = self.renderer_kind(dom, node) {
            return Classification::Container(Candidate { node, kind });
        }
        if self.katex_display.matches(dom, node) {
            return match self.katex.select_first(dom, node) {
                Some(inner) => Classification::Container(Candidate {
                    node: inner,
                    kind: RendererKind::KaTeX,
                }),
                None => Classification::Descend,
            };
        }
        if self.mathjax_v2_display.matches(dom, node) {
            return match self.mathjax_v2.select_first(dom, node) {
                Some(inner) => Classification::Container(Candidate {
                    node: inner,
                    kind: RendererKind::MathJaxV2,
                }),
                None => Classification::Descend,
            };
        }

        let has_data = DATA_ATTRIBUTES
            .iter()
            .any(|attr| dom.get_attr(node, attr).is_some_and(|v| !v.trim().is_empty()));
        let generic = !has_data && self.generic.matches(dom, node);
        if !has_data && !generic {
            return Classification::Descend;
        }
        // A renderer inside the element is more specific than the element
        if self.contains_renderer(dom, node) {
            return Classification::Descend;
        }
        if has_data {
            return Classification::Container(Candidate {
                node,
                kind: RendererKind::DataAttribute,
            });
        }
        if MATH_LIKE.is_match(&dom.deep_text(node)) {
            Classification::Container(Candidate {
                node,
                kind: RendererKind::Generic,
            })
        } else {
            Classification::Skip
        }
    }
}

enum Classification {
    Container(Candidate),
    Descend,
    Skip,
}

/// Registry of tagged equation containers.
pub struct EquationRegistry {
    detector: Detector,
    entries: BTreeMap<EquationId, EquationContainer>,
    by_node: HashMap<ArenaNodeId, EquationId>,
    next_id: u32,
}

impl EquationRegistry {
    pub fn new() -> Result<Self> {
        Ok(Self {
            detector: Detector::new()?,
            entries: BTreeMap::new(),
            by_node: HashMap::new(),
            next_id: 1,
        })
    }

    /// Containers under `root` that are not tagged yet, in document order.
    ///
    /// Pure: nothing is marked. When `root` lies inside a renderer container
    /// the result is that container (if untagged), never a fragment of it.
    pub fn discover(&self, dom: &ArenaDom, root: ArenaNodeId) -> Vec<Candidate> {
        if self.is_within_tagged(dom, root) {
            return Vec::new();
        }
        if root != dom.document()
            && let Some(outer) = self
                .detector
                .enclosing(dom, root)
                .filter(|c| c.node != root)
        {
            return if self.is_tagged(dom, outer.node) {
                Vec::new()
            } else {
                vec![outer]
            };
        }

        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !dom.is_element(node) && node != dom.document() {
                continue;
            }
            if self.is_tagged(dom, node) {
                continue;
            }
            match self.detector.classify(dom, node) {
                Classification::Container(candidate) => {
                    if !self.is_tagged(dom, candidate.node)
                        && !found.iter().any(|c: &Candidate| c.node == candidate.node)
                    {
                        found.push(candidate);
                    }
                }
                Classification::Skip => {}
                Classification::Descend => {
                    let mut kids: Vec<ArenaNodeId> = dom.children(node).collect();
                    kids.reverse();
                    stack.extend(kids);
                }
            }
        }
        found
    }

    /// Tag one discovered container. Returns `None` when it was tagged in the
    /// meantime or is no longer attached.
    pub fn register(&mut self, dom: &mut ArenaDom, candidate: Candidate) -> Option<EquationId> {
        if self.is_tagged(dom, candidate.node) || !dom.is_attached(candidate.node) {
            return None;
        }
        Some(self.mark_tagged(dom, candidate.node, candidate.kind))
    }

    /// Discover and tag everything new under `root`.
    pub fn scan(&mut self, dom: &mut ArenaDom, root: ArenaNodeId) -> Vec<EquationId> {
        let candidates = self.discover(dom, root);
        let tagged: Vec<EquationId> = candidates
            .into_iter()
            .filter_map(|c| self.register(dom, c))
            .collect();
        debug!(count = tagged.len(), "scan tagged containers");
        tagged
    }

    /// [`scan`](Self::scan) from the document root.
    pub fn scan_document(&mut self, dom: &mut ArenaDom) -> Vec<EquationId> {
        let root = dom.document();
        self.scan(dom, root)
    }

    /// Whether `node` itself carries the tag.
    pub fn is_tagged(&self, dom: &ArenaDom, node: ArenaNodeId) -> bool {
        self.by_node.contains_key(&node) || dom.get_attr(node, TAG_ATTR).is_some()
    }

    /// Whether `node` or one of its ancestors is tagged.
    pub fn is_within_tagged(&self, dom: &ArenaDom, node: ArenaNodeId) -> bool {
        std::iter::once(node)
            .chain(dom.ancestors(node))
            .any(|a| self.is_tagged(dom, a))
    }

    /// Tag `node` as a container of `kind` unconditionally.
    pub fn mark_tagged(&mut self, dom: &mut ArenaDom, node: ArenaNodeId, kind: RendererKind) -> EquationId {
        if let Some(&existing) = self.by_node.get(&node) {
            return existing;
        }
        let id = EquationId(self.next_id);
        self.next_id += 1;
        dom.set_attr(node, TAG_ATTR, &id.to_string());
        self.by_node.insert(node, id);
        self.entries.insert(
            id,
            EquationContainer {
                id,
                node,
                kind,
                selected: false,
                visual_state: VisualState::Idle,
            },
        );
        id
    }

    /// Remove every tag and forget every entry. Used on teardown.
    pub fn untag_all(&mut self, dom: &mut ArenaDom) {
        for entry in self.entries.values() {
            dom.remove_attr(entry.node, TAG_ATTR);
        }
        self.entries.clear();
        self.by_node.clear();
    }

    /// Drop entries whose node left the document. Returns how many went.
    pub fn reconcile(&mut self, dom: &ArenaDom) -> usize {
        let gone: Vec<EquationId> = self
            .entries
            .values()
            .filter(|e| !dom.is_attached(e.node))
            .map(|e| e.id)
            .collect();
        for id in &gone {
            self.forget(*id);
        }
        if !gone.is_empty() {
            debug!(dropped = gone.len(), "reconciled detached containers");
        }
        gone.len()
    }

    fn forget(&mut self, id: EquationId) {
        if let Some(entry) = self.entries.remove(&id) {
            self.by_node.remove(&entry.node);
        }
    }

    /// Look up an entry, dropping it if its node has been detached.
    pub fn live(&mut self, dom: &ArenaDom, id: EquationId) -> Option<&mut EquationContainer> {
        let attached = self.entries.get(&id).is_some_and(|e| dom.is_attached(e.node));
        if !attached {
            self.forget(id);
            return None;
        }
        self.entries.get_mut(&id)
    }

    pub fn get(&self, id: EquationId) -> Option<&EquationContainer> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: EquationId) -> Option<&mut EquationContainer> {
        self.entries.get_mut(&id)
    }

    /// The tagged container holding `node`, if any (e.g. a click target).
    pub fn container_of(&self, dom: &ArenaDom, node: ArenaNodeId) -> Option<EquationId> {
        std::iter::once(node)
            .chain(dom.ancestors(node))
            .find_map(|a| self.by_node.get(&a).copied())
    }

    /// Entries in tagging order.
    pub fn iter(&self) -> impl Iterator<Item = &EquationContainer> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<EquationId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn registry() -> EquationRegistry {
        EquationRegistry::new().expect("selectors compile")
    }

    fn kinds(reg: &EquationRegistry, ids: &[EquationId]) -> Vec<RendererKind> {
        ids.iter().map(|id| reg.get(*id).unwrap().kind).collect()
    }

    #[test]
    fn test_sibling_katex_are_separate() {
        let mut dom = parse_html(r#"<p><span class="katex">A</span><span class="katex">B</span></p>"#);
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        assert_eq!(ids.len(), 2);
        let texts: Vec<String> = ids
            .iter()
            .map(|id| dom.deep_text(reg.get(*id).unwrap().node))
            .collect();
        assert_eq!(texts, ["A", "B"]);
    }

    #[test]
    fn test_second_scan_is_empty() {
        let mut dom = parse_html(
            r#"<span class="katex">A</span><mjx-container>B</mjx-container><math><mi>c</mi></math>"#,
        );
        let mut reg = registry();
        assert_eq!(reg.scan_document(&mut dom).len(), 3);
        assert!(reg.scan_document(&mut dom).is_empty());
    }

    #[test]
    fn test_katex_embedded_mathml_is_not_a_second_container() {
        let mut dom = parse_html(
            r#"<span class="katex"><span class="katex-mathml"><math><semantics><mi>x</mi>
               <annotation encoding="application/x-tex">x</annotation></semantics></math></span>
               <span class="katex-html">x</span></span>"#,
        );
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        assert_eq!(kinds(&reg, &ids), [RendererKind::KaTeX]);
    }

    #[test]
    fn test_display_wrappers_resolve_to_inner_container() {
        let mut dom = parse_html(
            r#"<span class="katex-display"><span class="katex" id="k">x</span></span>
               <div class="MathJax_Display"><span class="MathJax" id="MathJax-Element-1-Frame">y</span></div>"#,
        );
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        let nodes: Vec<ArenaNodeId> = ids.iter().map(|id| reg.get(*id).unwrap().node).collect();
        assert_eq!(nodes[0], dom.get_by_id("k").unwrap());
        assert_eq!(nodes[1], dom.get_by_id("MathJax-Element-1-Frame").unwrap());
        assert_eq!(kinds(&reg, &ids), [RendererKind::KaTeX, RendererKind::MathJaxV2]);
    }

    #[test]
    fn test_inner_root_resolves_up_to_container() {
        let mut dom = parse_html(
            r#"<span class="katex" id="k"><span class="katex-html"><span id="inner">x</span></span></span>"#,
        );
        let mut reg = registry();
        let inner = dom.get_by_id("inner").unwrap();
        let found = reg.discover(&dom, inner);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node, dom.get_by_id("k").unwrap());

        reg.scan(&mut dom, inner);
        assert!(reg.discover(&dom, dom.document()).is_empty());
        assert!(reg.discover(&dom, inner).is_empty());
    }

    #[test]
    fn test_renderer_wins_over_data_attribute() {
        let mut dom = parse_html(
            r#"<div data-latex="x^2"><span class="katex">x</span></div>
               <div class="equation" id="g"><math><mi>y</mi></math></div>
               <span data-latex="\alpha" id="d"></span>"#,
        );
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        assert_eq!(
            kinds(&reg, &ids),
            [RendererKind::KaTeX, RendererKind::NativeMathML, RendererKind::DataAttribute]
        );
        assert_eq!(reg.get(ids[2]).unwrap().node, dom.get_by_id("d").unwrap());
    }

    #[test]
    fn test_generic_requires_math_like_text() {
        let mut dom = parse_html(
            r#"<div class="formula">E = mc²</div><div class="formula">see appendix</div>"#,
        );
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        assert_eq!(kinds(&reg, &ids), [RendererKind::Generic]);
    }

    #[test]
    fn test_tag_marker_and_untag_all() {
        let mut dom = parse_html(r#"<span class="katex" id="k">x</span>"#);
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        let k = dom.get_by_id("k").unwrap();
        assert_eq!(dom.get_attr(k, TAG_ATTR), Some(ids[0].to_string().as_str()));
        assert!(reg.is_tagged(&dom, k));

        reg.untag_all(&mut dom);
        assert!(reg.is_empty());
        assert!(dom.get_attr(k, TAG_ATTR).is_none());
        assert_eq!(reg.scan_document(&mut dom).len(), 1);
    }

    #[test]
    fn test_detached_entries_are_dropped() {
        let mut dom = parse_html(r#"<span class="katex" id="a">A</span><span class="katex">B</span>"#);
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        let a = dom.get_by_id("a").unwrap();
        dom.detach(a);

        assert!(reg.live(&dom, ids[0]).is_none());
        assert!(reg.live(&dom, ids[1]).is_some());
        assert_eq!(reg.reconcile(&dom), 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_container_of_click_target() {
        let mut dom = parse_html(
            r#"<mjx-container id="c"><mjx-math><mjx-mi id="leaf">x</mjx-mi></mjx-math></mjx-container>"#,
        );
        let mut reg = registry();
        let ids = reg.scan_document(&mut dom);
        let leaf = dom.get_by_id("leaf").unwrap();
        assert_eq!(reg.container_of(&dom, leaf), Some(ids[0]));
    }
}
