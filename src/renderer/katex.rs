//! KaTeX containers.
//!
//! KaTeX renders `.katex > .katex-mathml` (MathML with a TeX annotation)
//! next to `.katex > .katex-html` (the visual layout). LaTeX only ever comes
//! from the annotation or a source attribute: the visual text is not LaTeX
//! and is never passed off as such.

use crate::convert;
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::format::Format;

use super::{mathml_of, tex_annotation};

const SOURCE_ATTRIBUTES: [&str; 2] = ["data-latex", "data-tex"];

pub(super) fn extract(dom: &ArenaDom, katex: ArenaNodeId, format: Format) -> Option<String> {
    match format {
        Format::LaTeX => latex_source(dom, katex),
        Format::MathML => match embedded_math(dom, katex) {
            Some(math) => Some(mathml_of(dom, math)),
            None => latex_source(dom, katex)
                .map(|tex| convert::prepare(&convert::latex_to_mathml(&tex, is_display(dom, katex)))),
        },
        Format::Unicode => {
            let visual = dom.find_class_in(katex, "katex-html").unwrap_or(katex);
            Some(convert::text_from_tree(dom, visual))
        }
        Format::AsciiMath => latex_source(dom, katex)
            .map(|tex| convert::latex_to_asciimath(&tex))
            .or_else(|| embedded_math(dom, katex).map(|math| convert::asciimath_from_tree(dom, math))),
    }
}

/// The TeX annotation, else a source attribute on the container or its
/// display wrapper.
fn latex_source(dom: &ArenaDom, katex: ArenaNodeId) -> Option<String> {
    if let Some(tex) = tex_annotation(dom, katex) {
        return Some(tex);
    }
    [katex, dom.parent(katex)].into_iter().find_map(|node| {
        SOURCE_ATTRIBUTES
            .iter()
            .find_map(|attr| dom.get_attr(node, attr))
            .map(|v| convert::strip_delimiters(v).to_string())
            .filter(|v| !v.is_empty())
    })
}

fn embedded_math(dom: &ArenaDom, katex: ArenaNodeId) -> Option<ArenaNodeId> {
    let host = dom.find_class_in(katex, "katex-mathml")?;
    dom.find_tag_in(host, "math")
}

fn is_display(dom: &ArenaDom, katex: ArenaNodeId) -> bool {
    dom.has_class(dom.parent(katex), "katex-display")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    const RENDERED: &str = r#"<span class="katex"><span class="katex-mathml"><math xmlns="http://www.w3.org/1998/Math/MathML"><semantics><mrow><msup><mi>x</mi><mn>2</mn></msup></mrow><annotation encoding="application/x-tex">x^2</annotation></semantics></math></span><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord"><span class="mord mathnormal">x</span><span class="msupsub"><span class="vlist-t"><span class="vlist-r"><span class="vlist"><span><span class="mord mtight">2</span></span></span></span></span></span></span></span></span></span>"#;

    fn katex(dom: &ArenaDom) -> ArenaNodeId {
        dom.find_class_in(dom.document(), "katex").unwrap()
    }

    #[test]
    fn test_latex_from_annotation() {
        let dom = parse_html(RENDERED);
        assert_eq!(extract(&dom, katex(&dom), Format::LaTeX).as_deref(), Some("x^2"));
    }

    #[test]
    fn test_mathml_keeps_semantics_and_namespace() {
        let dom = parse_html(RENDERED);
        let out = extract(&dom, katex(&dom), Format::MathML).unwrap();
        assert!(out.starts_with(r#"<math xmlns="http://www.w3.org/1998/Math/MathML">"#));
        assert!(out.contains("<msup><mi>x</mi><mn>2</mn></msup>"));
        assert!(convert::is_valid(&out));
    }

    #[test]
    fn test_unicode_reads_visual_layout_only() {
        let dom = parse_html(RENDERED);
        assert_eq!(extract(&dom, katex(&dom), Format::Unicode).as_deref(), Some("x²"));
    }

    #[test]
    fn test_no_annotation_means_no_latex() {
        let dom = parse_html(r#"<span class="katex"><span class="katex-html">x</span></span>"#);
        assert_eq!(extract(&dom, katex(&dom), Format::LaTeX), None);
    }

    #[test]
    fn test_data_attribute_on_display_wrapper() {
        let dom = parse_html(
            r#"<span class="katex-display" data-latex="$$\sum x$$"><span class="katex"><span class="katex-html">x</span></span></span>"#,
        );
        let k = katex(&dom);
        assert_eq!(extract(&dom, k, Format::LaTeX).as_deref(), Some(r"\sum x"));
        let mathml = extract(&dom, k, Format::MathML).unwrap();
        assert!(mathml.contains(r#"display="block""#));
        assert!(mathml.contains("<mo>∑</mo>"));
    }
}
