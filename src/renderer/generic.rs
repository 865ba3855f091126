//! Data-attribute and heuristic containers.

use crate::convert;
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::format::Format;
use crate::registry::DATA_ATTRIBUTES;

use super::{SourceKind, SourceText, Sources};

/// The first populated source attribute, classified as MathML or TeX.
///
/// A value counts as MathML only when it starts like MathML and parses as
/// well-formed XML; everything else is treated as TeX.
pub(super) fn data_attribute_sources(dom: &ArenaDom, node: ArenaNodeId) -> Sources {
    let original = DATA_ATTRIBUTES
        .iter()
        .filter_map(|attr| dom.get_attr(node, attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(|value| {
            if convert::looks_like_mathml(value) && convert::is_well_formed(value) {
                SourceText::new(value, SourceKind::MathML)
            } else {
                let display = value.starts_with("$$") || value.starts_with("\\[");
                SourceText::new(value, SourceKind::TeX).display(display)
            }
        });

    Sources {
        original,
        rendered_text: Some(convert::text_from_tree(dom, node)).filter(|t| !t.is_empty()),
        ..Sources::default()
    }
}

/// Heuristic containers only ever yield their visible text.
pub(super) fn extract(dom: &ArenaDom, node: ArenaNodeId, format: Format) -> Option<String> {
    match format {
        Format::Unicode => Some(convert::text_from_tree(dom, node)),
        Format::LaTeX | Format::MathML | Format::AsciiMath => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_latex_attribute() {
        let dom = parse_html(r#"<span id="d" data-latex="\(\beta^2\)"></span>"#);
        let d = dom.get_by_id("d").unwrap();
        let sources = data_attribute_sources(&dom, d);
        assert_eq!(sources.render(Format::LaTeX).as_deref(), Some(r"\beta^2"));
        assert_eq!(sources.render(Format::Unicode).as_deref(), Some("β²"));
        assert!(sources.render(Format::MathML).unwrap().contains("<mi>β</mi>"));
    }

    #[test]
    fn test_mathml_attribute() {
        let dom = parse_html(
            r#"<span id="d" data-mathml="<math><mfrac><mn>1</mn><mn>3</mn></mfrac></math>"></span>"#,
        );
        let d = dom.get_by_id("d").unwrap();
        let sources = data_attribute_sources(&dom, d);
        assert_eq!(sources.render(Format::LaTeX), None);
        assert_eq!(sources.render(Format::Unicode).as_deref(), Some("1/3"));
        assert_eq!(sources.render(Format::AsciiMath).as_deref(), Some("(1)/(3)"));
    }

    #[test]
    fn test_malformed_markup_is_treated_as_tex() {
        let dom = parse_html(r#"<span id="d" data-math="<math><mi>x</math>"></span>"#);
        let d = dom.get_by_id("d").unwrap();
        let sources = data_attribute_sources(&dom, d);
        assert_eq!(sources.original.unwrap().kind, SourceKind::TeX);
    }

    #[test]
    fn test_sibling_math_roots_are_not_mathml() {
        let dom = parse_html(
            r#"<span id="d" data-mathml="<math><mi>a</mi></math><math><mi>b</mi></math>"></span>"#,
        );
        let d = dom.get_by_id("d").unwrap();
        let sources = data_attribute_sources(&dom, d);
        assert_eq!(sources.original.as_ref().unwrap().kind, SourceKind::TeX);
        let mathml = sources.render(Format::MathML).unwrap();
        assert_eq!(mathml.matches("<math").count(), 1, "{mathml}");
    }

    #[test]
    fn test_generic_never_promoted() {
        let dom = parse_html(r#"<div class="math" id="g">a + b = c</div>"#);
        let g = dom.get_by_id("g").unwrap();
        assert_eq!(extract(&dom, g, Format::Unicode).as_deref(), Some("a + b = c"));
        assert_eq!(extract(&dom, g, Format::LaTeX), None);
        assert_eq!(extract(&dom, g, Format::MathML), None);
    }
}
