//! MathJax v2 and v3 containers.
//!
//! The host's introspection answer is always tried first. Without it, v2
//! keeps the original input in a `<script type="math/...">` element next to
//! the rendered frame, and v3 keeps an assistive MathML copy inside the
//! container.

use crate::convert;
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::registry::RendererKind;

use super::{RendererHost, SourceKind, SourceText, Sources, mathml_of, tex_annotation};

pub(super) fn sources_v2(host: &dyn RendererHost, dom: &ArenaDom, frame: ArenaNodeId) -> Sources {
    let original = host
        .original_source(dom, frame, RendererKind::MathJaxV2)
        .or_else(|| source_script(dom, frame).and_then(|script| script_source(dom, script)));

    let attribute = dom
        .get_attr(frame, "data-mathml")
        .filter(|m| convert::is_well_formed(m));
    let assistive = dom
        .find_class_in(frame, "MJX_Assistive_MathML")
        .and_then(|a| dom.find_tag_in(a, "math"));

    let embedded_mathml = attribute
        .map(convert::prepare)
        .or_else(|| assistive.map(|math| mathml_of(dom, math)));
    let embedded_asciimath = attribute
        .map(convert::mathml_to_asciimath)
        .or_else(|| assistive.map(|math| convert::asciimath_from_tree(dom, math)));

    let rendered_text = Some(convert::text_from_tree(dom, frame)).filter(|t| !t.is_empty());
    let latex_fallback = untyped_latex(original.as_ref(), embedded_asciimath.as_deref(), rendered_text.as_deref());

    Sources {
        original,
        embedded_mathml,
        embedded_asciimath,
        rendered_text,
        latex_fallback,
    }
}

/// LaTeX for a container that kept no TeX input.
///
/// AsciiMath input and the AsciiMath of the embedded tree read as TeX for
/// simple expressions; visible text is the last resort.
fn untyped_latex(original: Option<&SourceText>, asciimath: Option<&str>, visible: Option<&str>) -> Option<String> {
    original
        .filter(|s| s.kind == SourceKind::AsciiMath)
        .map(|s| s.text.as_str())
        .or(asciimath)
        .or(visible)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// The script holding a v2 frame's input.
///
/// Frames are named `MathJax-Element-N-Frame` after their script
/// `MathJax-Element-N`. Unnamed frames fall back to the script that follows
/// the frame (or its display wrapper).
fn source_script(dom: &ArenaDom, frame: ArenaNodeId) -> Option<ArenaNodeId> {
    let by_id = dom
        .element_id(frame)
        .and_then(|id| id.strip_suffix("-Frame"))
        .and_then(|id| dom.get_by_id(id))
        .filter(|&s| is_math_script(dom, s));
    if by_id.is_some() {
        return by_id;
    }
    [frame, dom.parent(frame)]
        .into_iter()
        .filter_map(|node| next_element_sibling(dom, node))
        .find(|&s| is_math_script(dom, s))
}

fn next_element_sibling(dom: &ArenaDom, node: ArenaNodeId) -> Option<ArenaNodeId> {
    let mut current = dom.get(node)?.next_sibling;
    while current.is_some() {
        if dom.is_element(current) {
            return Some(current);
        }
        current = dom.get(current)?.next_sibling;
    }
    None
}

fn is_math_script(dom: &ArenaDom, node: ArenaNodeId) -> bool {
    dom.is_tag(node, "script")
        && dom
            .get_attr(node, "type")
            .is_some_and(|t| t.trim_start().starts_with("math/"))
}

fn script_source(dom: &ArenaDom, script: ArenaNodeId) -> Option<SourceText> {
    let kind_attr = dom.get_attr(script, "type")?.to_ascii_lowercase();
    let text = dom.deep_text(script).trim().to_string();
    if text.is_empty() {
        return None;
    }
    let kind = if kind_attr.starts_with("math/tex") {
        SourceKind::TeX
    } else if kind_attr.starts_with("math/asciimath") {
        SourceKind::AsciiMath
    } else if kind_attr.starts_with("math/mml") {
        SourceKind::MathML
    } else {
        return None;
    };
    Some(SourceText::new(text, kind).display(kind_attr.contains("mode=display")))
}

pub(super) fn sources_v3(host: &dyn RendererHost, dom: &ArenaDom, container: ArenaNodeId) -> Sources {
    let display = matches!(dom.get_attr(container, "display"), Some("true" | "block"));
    let assistive = dom
        .find_tag_in(container, "mjx-assistive-mml")
        .and_then(|a| dom.find_tag_in(a, "math"));

    let original = host
        .original_source(dom, container, RendererKind::MathJaxV3)
        .or_else(|| {
            dom.get_attr(container, "data-latex")
                .filter(|t| !t.trim().is_empty())
                .map(|t| SourceText::new(t, SourceKind::TeX).display(display))
        })
        .or_else(|| {
            assistive
                .and_then(|math| tex_annotation(dom, math))
                .map(|t| SourceText::new(t, SourceKind::TeX).display(display))
        });

    let visible = Some(convert::text_from_tree(dom, container))
        .filter(|t| !t.is_empty())
        .or_else(|| assistive.map(|math| convert::text_from_tree(dom, math)))
        .filter(|t| !t.is_empty());
    let embedded_asciimath = assistive.map(|math| convert::asciimath_from_tree(dom, math));
    // aria-label is prose ("x plus 1"), never LaTeX
    let latex_fallback = untyped_latex(original.as_ref(), embedded_asciimath.as_deref(), visible.as_deref());
    let rendered_text = visible.or_else(|| dom.get_attr(container, "aria-label").map(|l| l.trim().to_string()));

    Sources {
        original,
        embedded_mathml: assistive.map(|math| mathml_of(dom, math)),
        embedded_asciimath,
        rendered_text,
        latex_fallback,
    }
}
