//! MathML cleanup and validation.
//!
//! The cleanup here is a targeted heuristic, not general XML processing. Its
//! contract is that the result pastes into word processors without spurious
//! spaces: those consumers render whitespace between tags as a visible gap,
//! which the page's renderer never intended. Spacing elements, zero-width
//! characters and near-zero padding wrappers are removed for the same reason.
//! The transformation is lossy on purpose.

use std::sync::LazyLock;

use memchr::memmem;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::{Captures, Regex};

/// The MathML namespace URI.
pub const MATHML_NS: &str = "http://www.w3.org/1998/Math/MathML";

/// Padding wrappers narrower than this (in em) are unwrapped.
pub const PADDING_THRESHOLD_EM: f64 = 0.05;

/// Upper bound on cleanup passes; real inputs settle in two or three.
const MAX_PASSES: usize = 8;

static MATH_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<math(\s[^>]*)?>").expect("static regex"));
static XMLNS_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sxmlns\s*=\s*("[^"]*"|'[^']*')"#).expect("static regex"));
static MSPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<mspace\b[^>]*/>|<mspace\b[^>]*>.*?</mspace>").expect("static regex")
});
static BLANK_MTEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<mtext\b[^>]*/>|<mtext\b[^>]*>\s*</mtext>").expect("static regex")
});
static MPADDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<mpadded\b([^>]*)>(.*?)</mpadded>").expect("static regex")
});
static PADDING_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:width|lspace)\s*=\s*["']([+-]?(?:\d+\.?\d*|\.\d+))(?:em)?["']"#)
        .expect("static regex")
});
static INTER_TAG_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">[ \t\r\n]+<").expect("static regex"));
static TOKEN_CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(mi|mo|mn)(\s[^>]*)?>([^<]*)</(mi|mo|mn)>").expect("static regex")
});
static TRAILING_AFTER_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(</(?:mo|mi|mn|mfrac|msup|msub|msubsup)>)[ \t\r\n]+").expect("static regex")
});

/// Zero-width and thin spacing characters renderers sprinkle into output.
fn is_invisible_space(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' // zero width space
            | '\u{200C}'
            | '\u{200D}'
            | '\u{2060}' // word joiner
            | '\u{FEFF}'
            | '\u{2009}' // thin space
            | '\u{200A}' // hair space
            | '\u{2006}'
            | '\u{205F}' // medium mathematical space
    )
}

/// Remove zero-width and thin-space characters.
pub fn strip_invisible(text: &str) -> String {
    text.chars().filter(|&c| !is_invisible_space(c)).collect()
}

/// Ensure the root `<math>` carries the MathML namespace declaration.
///
/// Other attributes (notably `display`) are left exactly as they were. A
/// missing declaration is inserted; a wrong one is corrected in place.
pub fn normalize_namespace(markup: &str) -> String {
    let Some(caps) = MATH_OPEN.captures(markup) else {
        return markup.to_string();
    };
    let Some(whole) = caps.get(0) else {
        return markup.to_string();
    };
    let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");

    let new_attrs = match XMLNS_ATTR.find(attrs) {
        Some(existing) => {
            let mut fixed = String::with_capacity(attrs.len());
            fixed.push_str(&attrs[..existing.start()]);
            fixed.push_str(&format!(r#" xmlns="{MATHML_NS}""#));
            fixed.push_str(&attrs[existing.end()..]);
            fixed
        }
        None => format!(r#" xmlns="{MATHML_NS}"{attrs}"#),
    };

    let mut out = String::with_capacity(markup.len() + 48);
    out.push_str(&markup[..whole.start()]);
    out.push_str("<math");
    out.push_str(&new_attrs);
    out.push('>');
    out.push_str(&markup[whole.end()..]);
    out
}

/// Apply the spacing cleanup until the markup stops changing.
///
/// Running to a fixed point makes the function idempotent even when one step
/// exposes work for another (an unwrapped padding element leaving a blank
/// text element behind, nested wrappers, and so on).
pub fn clean_spacing(markup: &str) -> String {
    let mut current = cleanup_pass(markup);
    for _ in 1..MAX_PASSES {
        let next = cleanup_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn cleanup_pass(markup: &str) -> String {
    let text = strip_invisible(markup);
    let text = MSPACE.replace_all(&text, "").into_owned();
    let text = BLANK_MTEXT.replace_all(&text, "").into_owned();
    let text = MPADDED.replace_all(&text, |caps: &Captures| {
        let narrow = PADDING_WIDTH
            .captures(&caps[1])
            .and_then(|w| w[1].parse::<f64>().ok())
            .is_some_and(|w| w.abs() < PADDING_THRESHOLD_EM);
        if narrow {
            caps[2].to_string()
        } else {
            caps[0].to_string()
        }
    })
    .into_owned();
    let text = INTER_TAG_SPACE.replace_all(&text, "><").into_owned();
    let text = TOKEN_CONTENT.replace_all(&text, |caps: &Captures| {
        if caps[1] != caps[4] {
            return caps[0].to_string();
        }
        let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        format!(
            "<{tag}{attrs}>{}</{tag}>",
            caps[3].trim_matches([' ', '\t', '\r', '\n']),
            tag = &caps[1]
        )
    })
    .into_owned();
    let text = TRAILING_AFTER_CLOSE.replace_all(&text, "$1");
    text.trim().to_string()
}

/// Full MathML preparation: wrap bare fragments, clean spacing, then make
/// sure the namespace is declared.
pub fn prepare(markup: &str) -> String {
    let trimmed = markup.trim();
    let wrapped = if MATH_OPEN.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("<math>{trimmed}</math>")
    };
    normalize_namespace(&clean_spacing(&wrapped))
}

/// Structural validity check for a MathML string.
///
/// Valid means: exactly one `<math>` open tag and one `</math>` close tag,
/// and the MathML namespace declaration.
pub fn is_valid(markup: &str) -> bool {
    let opens = MATH_OPEN.find_iter(markup).count();
    let closes = memmem::find_iter(markup.as_bytes(), b"</math>").count();
    let declared = memmem::find(markup.as_bytes(), format!(r#"xmlns="{MATHML_NS}""#).as_bytes())
        .is_some();

    opens == 1 && closes == 1 && declared
}

/// Stricter check that the markup is well-formed XML (balanced and properly
/// nested tags under a single root). Used to decide whether an attribute
/// value really is MathML.
pub fn is_well_formed(markup: &str) -> bool {
    let mut reader = Reader::from_str(markup);
    let mut depth: usize = 0;
    let mut roots = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) if depth == 0 => roots += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return roots == 1 && depth == 0,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_operator_padding_removed() {
        let input = r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mo> ∫ </mo><mi> x </mi></math>"#;
        assert_eq!(
            prepare(input),
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mo>∫</mo><mi>x</mi></math>"#
        );
    }

    #[test]
    fn test_namespace_inserted_without_touching_display() {
        let out = normalize_namespace(r#"<math display="block"><mi>x</mi></math>"#);
        assert_eq!(
            out,
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML" display="block"><mi>x</mi></math>"#
        );
    }

    #[test]
    fn test_wrong_namespace_corrected_in_place() {
        let out = normalize_namespace(r#"<math display="inline" xmlns="urn:wrong"><mi>x</mi></math>"#);
        assert_eq!(
            out,
            r#"<math display="inline" xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi></math>"#
        );
    }

    #[test]
    fn test_spacing_elements_removed() {
        let input = "<math><mi>a</mi><mspace width=\"0.1667em\"/><mtext>\u{a0}</mtext><mi>b</mi>\n  <mspace width=\"1em\"></mspace></math>";
        assert_eq!(clean_spacing(input), "<math><mi>a</mi><mi>b</mi></math>");
    }

    #[test]
    fn test_narrow_padding_unwrapped_wide_kept() {
        let input = r#"<math><mpadded width="+0.03em"><mi>a</mi></mpadded><mpadded width="0.5em"><mi>b</mi></mpadded></math>"#;
        assert_eq!(
            clean_spacing(input),
            r#"<math><mi>a</mi><mpadded width="0.5em"><mi>b</mi></mpadded></math>"#
        );
    }

    #[test]
    fn test_nested_padding_fully_unwrapped() {
        let input = r#"<math><mpadded width="0"><mpadded lspace="-0.01em"><mn>1</mn></mpadded></mpadded></math>"#;
        assert_eq!(clean_spacing(input), "<math><mn>1</mn></math>");
    }

    #[test]
    fn test_zero_width_characters_stripped() {
        let input = "<math><mi>x\u{200B}</mi><mo>\u{2009}=\u{2009}</mo><mn>2</mn></math>";
        assert_eq!(clean_spacing(input), "<math><mi>x</mi><mo>=</mo><mn>2</mn></math>");
    }

    #[test]
    fn test_text_spacing_inside_mtext_preserved() {
        let input = "<math><mtext>for all </mtext><mi>x</mi></math>";
        assert_eq!(clean_spacing(input), input);
    }

    #[test]
    fn test_cleanup_idempotent_on_katex_output() {
        let input = r#"<math xmlns="http://www.w3.org/1998/Math/MathML">
            <semantics><mrow><mfrac><mn>1</mn><mn>2</mn></mfrac> <mo>+</mo>
            <msup><mi>x</mi><mn>2</mn></msup></mrow>
            <annotation encoding="application/x-tex">\frac12 + x^2</annotation></semantics></math>"#;
        let once = clean_spacing(input);
        assert_eq!(clean_spacing(&once), once);
        assert!(!once.contains("> <"));
    }

    #[test]
    fn test_prepare_wraps_fragments() {
        let out = prepare("<mi>y</mi>");
        assert!(is_valid(&out));
        assert_eq!(out, r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>y</mi></math>"#);
    }

    #[test]
    fn test_validity_rules() {
        assert!(is_valid(
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi></math>"#
        ));
        assert!(!is_valid("<math><mi>x</mi></math>"));
        assert!(!is_valid(r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi>"#));
        assert!(!is_valid(
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><math><mi>x</mi></math>"#
        ));
        // Balanced, but two equations glued together
        assert!(!is_valid(
            r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>a</mi></math><math xmlns="http://www.w3.org/1998/Math/MathML"><mi>b</mi></math>"#
        ));
    }

    #[test]
    fn test_well_formedness() {
        assert!(is_well_formed("<math><mi>x</mi></math>"));
        assert!(is_well_formed("<mrow><mspace/></mrow>"));
        assert!(!is_well_formed("<math><mi>x</math>"));
        assert!(!is_well_formed("<math><mi>x</mi>"));
        assert!(!is_well_formed(r"\frac{1}{2}"));
        assert!(!is_well_formed("<math><mi>a</mi></math><math><mi>b</mi></math>"));
        assert!(!is_well_formed("<mi>a</mi><mspace/>"));
    }
}
