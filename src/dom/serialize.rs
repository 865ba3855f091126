//! Subtree serialization as XML.
//!
//! Used to hand MathML elements to downstream consumers as markup strings.
//! html5ever stores a foreign element's `xmlns` as an unprefixed attribute in
//! the XMLNS namespace, so it comes back out as a plain `xmlns="..."`.

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

/// Serialize a node and its descendants as an XML string.
pub fn to_xml(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut output = String::new();
    write_node(dom, id, &mut output);
    output
}

fn write_node(dom: &ArenaDom, id: ArenaNodeId, output: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };
    match &node.data {
        ArenaNodeData::Element(element) => {
            let tag = element.local_name();
            output.push('<');
            output.push_str(tag);
            for attr in &element.attrs {
                output.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    output.push_str(prefix.as_ref());
                    output.push(':');
                }
                output.push_str(attr.name.local.as_ref());
                output.push_str("=\"");
                output.push_str(&escape_xml(&attr.value));
                output.push('"');
            }

            if node.first_child.is_none() {
                output.push_str("/>");
            } else {
                output.push('>');
                for child in dom.children(id) {
                    write_node(dom, child, output);
                }
                output.push_str("</");
                output.push_str(tag);
                output.push('>');
            }
        }
        ArenaNodeData::Text(text) => output.push_str(&escape_text(text)),
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, output);
            }
        }
        ArenaNodeData::Comment(_) | ArenaNodeData::Doctype(_) => {}
    }
}

/// Escape markup characters for an attribute value.
pub fn escape_xml(s: &str) -> String {
    escape(s, true)
}

fn escape_text(s: &str) -> String {
    escape(s, false)
}

fn escape(s: &str, in_attr: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let entity = match c {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' if in_attr => "&quot;",
            _ => {
                out.push(c);
                continue;
            }
        };
        out.push_str(entity);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_mathml_round_trips_structure() {
        let dom = parse_html(
            r#"<p><math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi><mo>&lt;</mo><mn>1</mn></math></p>"#,
        );
        let math = dom.find_by_tag("math").unwrap();

        assert_eq!(
            to_xml(&dom, math),
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi><mo>&lt;</mo><mn>1</mn></math>"#
        );
    }

    #[test]
    fn test_empty_elements_self_close() {
        let dom = parse_html(r#"<p><math><mspace width="1em"></mspace><mi>y</mi></math></p>"#);
        let math = dom.find_by_tag("math").unwrap();

        assert_eq!(to_xml(&dom, math), r#"<math><mspace width="1em"/><mi>y</mi></math>"#);
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        assert_eq!(escape_xml(r#"a "b" & <c>"#), "a &quot;b&quot; &amp; &lt;c&gt;");
    }
}
