//! CSS selector matching over [`ArenaDom`].
//!
//! Renderer families are described as selector lists (`.katex`,
//! `mjx-container`, `span[id^="MathJax-Element-"]`, ...). Lists are compiled
//! once with `cssparser`/`selectors` and matched against arena elements.

use std::fmt;

use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::{MatchingContext, SelectorCaches};
use selectors::matching::{ElementSelectorFlags, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags};
use selectors::parser::{ParseRelative, Selector, SelectorList, SelectorParseErrorKind};
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{ArenaDom, ArenaNodeId};
use crate::error::{Error, Result};

/// String atom used for every name slot of the selector grammar.
///
/// Detection lists are a handful of short selectors, so interning buys
/// nothing; names are compared as plain strings against the arena's atoms.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct CssStr(String);

impl CssStr {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl precomputed_hash::PrecomputedHash for CssStr {
    fn precomputed_hash(&self) -> u32 {
        // FNV-1a
        self.0
            .bytes()
            .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193))
    }
}

impl AsRef<str> for CssStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for CssStr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'a> From<&'a str> for CssStr {
    fn from(s: &'a str) -> Self {
        Self(s.to_string())
    }
}

impl cssparser::ToCss for CssStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(&self.0)
    }
}

/// Selector grammar for detection lists: no pseudo-classes, no
/// pseudo-elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathSelectors;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Never {}

impl cssparser::ToCss for Never {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for Never {
    type Impl = MathSelectors;
}

impl selectors::parser::NonTSPseudoClass for Never {
    type Impl = MathSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl<'i> selectors::parser::Parser<'i> for MathSelectors {
    type Impl = MathSelectors;
    type Error = SelectorParseErrorKind<'i>;
}

impl SelectorImpl for MathSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssStr;
    type Identifier = CssStr;
    type LocalName = CssStr;
    type NamespaceUrl = CssStr;
    type NamespacePrefix = CssStr;
    type BorrowedLocalName = CssStr;
    type BorrowedNamespaceUrl = CssStr;
    type NonTSPseudoClass = Never;
    type PseudoElement = Never;
}

/// An arena element seen through the `selectors::Element` trait.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    dom: &'a ArenaDom,
    id: ArenaNodeId,
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementRef({:?} <{:?}>)", self.id, self.dom.element_name(self.id))
    }
}

impl ElementRef<'_> {
    fn at(&self, id: ArenaNodeId) -> Self {
        Self { dom: self.dom, id }
    }

    /// Follow a sibling link until the next element node.
    fn sibling_element(&self, step: fn(&super::ArenaNode) -> ArenaNodeId) -> Option<Self> {
        let mut cursor = step(self.dom.get(self.id)?);
        while cursor.is_some() {
            if self.dom.is_element(cursor) {
                return Some(self.at(cursor));
            }
            cursor = step(self.dom.get(cursor)?);
        }
        None
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = MathSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self)
    }

    fn parent_element(&self) -> Option<Self> {
        let parent = self.dom.parent(self.id);
        self.dom.is_element(parent).then(|| self.at(parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.sibling_element(|n| n.prev_sibling)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.sibling_element(|n| n.next_sibling)
    }

    fn first_element_child(&self) -> Option<Self> {
        let child = self.dom.children(self.id).find(|&c| self.dom.is_element(c))?;
        Some(self.at(child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssStr) -> bool {
        self.dom.is_tag(self.id, name.as_str())
    }

    fn has_namespace(&self, ns: &CssStr) -> bool {
        self.dom
            .element_namespace(self.id)
            .is_some_and(|n| n.as_ref() == ns.as_str())
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.dom.element_name(self.id) == other.dom.element_name(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssStr>,
        local_name: &CssStr,
        operation: &AttrSelectorOperation<&CssStr>,
    ) -> bool {
        self.dom.attrs(self.id).iter().any(|attr| {
            let in_ns = match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => attr.name.ns.as_ref() == ns.as_str(),
            };
            in_ns && attr.name.local.as_ref() == local_name.as_str() && operation.eval_str(&attr.value)
        })
    }

    fn match_non_ts_pseudo_class(&self, pc: &Never, _context: &mut MatchingContext<'_, MathSelectors>) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(&self, pe: &Never, _context: &mut MatchingContext<'_, MathSelectors>) -> bool {
        match *pe {}
    }

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_id(self.id)
            .is_some_and(|own| case_sensitivity.eq(own.as_bytes(), id.as_str().as_bytes()))
    }

    fn has_class(&self, name: &CssStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_classes(self.id)
            .iter()
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.as_str().as_bytes()))
    }

    fn imported_part(&self, _name: &CssStr) -> Option<CssStr> {
        None
    }

    fn is_part(&self, _name: &CssStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.dom.children(self.id).all(|child| {
            !self.dom.is_element(child) && self.dom.text_content(child).is_none_or(|t| t.is_empty())
        })
    }

    fn is_root(&self) -> bool {
        self.dom.parent(self.id) == self.dom.document()
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn add_element_unique_hashes(&self, _filter: &mut selectors::bloom::BloomFilter) -> bool {
        false
    }

    fn has_custom_state(&self, _name: &CssStr) -> bool {
        false
    }
}

/// A compiled, comma-separated selector list.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    source: String,
    selectors: Vec<Selector<MathSelectors>>,
}

impl SelectorSet {
    /// Compile a selector list such as `".katex, .katex-display"`.
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&MathSelectors, &mut parser, ParseRelative::No)
            .map_err(|e| Error::Selector(format!("{source}: {:?}", e.kind)))?;

        Ok(Self {
            source: source.to_string(),
            selectors: list.slice().to_vec(),
        })
    }

    /// The selector text this set was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Check whether an element matches any selector in the set.
    pub fn matches(&self, dom: &ArenaDom, id: ArenaNodeId) -> bool {
        if !dom.is_element(id) {
            return false;
        }
        let element = ElementRef { dom, id };
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            selectors::context::QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.selectors
            .iter()
            .any(|s| selectors::matching::matches_selector(s, 0, None, &element, &mut context))
    }

    /// All matching elements inside `root` (root included), in document order.
    pub fn select_all(&self, dom: &ArenaDom, root: ArenaNodeId) -> Vec<ArenaNodeId> {
        dom.subtree(root).filter(|&id| self.matches(dom, id)).collect()
    }

    /// First matching element inside `root` (root included).
    pub fn select_first(&self, dom: &ArenaDom, root: ArenaNodeId) -> Option<ArenaNodeId> {
        dom.subtree(root).find(|&id| self.matches(dom, id))
    }

    /// Nearest ancestor-or-self of `id` matching the set.
    pub fn closest(&self, dom: &ArenaDom, id: ArenaNodeId) -> Option<ArenaNodeId> {
        std::iter::once(id)
            .chain(dom.ancestors(id))
            .find(|&a| self.matches(dom, a))
    }
}
