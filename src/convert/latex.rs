//! LaTeX source handling: delimiter stripping, the heuristic that tells
//! LaTeX from MathML, and the best-effort LaTeX to MathML conversion.
//!
//! The conversion is text substitution over a fixed table (fractions, roots,
//! the symbols in [`super::symbols`]), not a parser. Anything outside the
//! table passes through unconverted inside the wrapping `<mrow>`. Output is
//! approximate by design and should be treated as such by callers.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::mathml::MATHML_NS;
use super::symbols;
use crate::dom::serialize::escape_xml;

/// Innermost `\frac{a}{b}` (no braces inside either group).
static FRAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").expect("static regex")
});
static SQRT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sqrt\s*\{([^{}]*)\}").expect("static regex"));
static ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sqrt\s*\[([^\[\]]*)\]\s*\{([^{}]*)\}").expect("static regex"));
static LATEX_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+").expect("static regex"));

/// Nesting depth at which the substitution loop gives up.
const MAX_NESTING: usize = 16;

/// Strip one layer of math delimiters: `$..$`, `$$..$$`, `\(..\)`, `\[..\]`.
pub fn strip_delimiters(source: &str) -> &str {
    let s = source.trim();
    let pairs: [(&str, &str); 4] = [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")];
    for (open, close) in pairs {
        if s.len() >= open.len() + close.len()
            && let Some(inner) = s.strip_prefix(open).and_then(|r| r.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    s
}

/// Whether a raw string reads as LaTeX: a backslash command or a dollar
/// delimiter.
pub fn looks_like_latex(source: &str) -> bool {
    let s = source.trim();
    LATEX_COMMAND.is_match(s) || (s.starts_with('$') && s.ends_with('$') && s.len() > 1)
}

/// Whether a raw string reads as MathML markup.
pub fn looks_like_mathml(source: &str) -> bool {
    let s = source.trim_start();
    s.starts_with("<math") || s.starts_with("<mrow") || s.starts_with("<semantics")
}

/// Best-effort LaTeX to MathML.
///
/// ```
/// use mathclip::convert::latex_to_mathml;
///
/// let out = latex_to_mathml(r"\frac{1}{2}", false);
/// assert!(out.contains("<mfrac><mrow>1</mrow><mrow>2</mrow></mfrac>"));
/// ```
pub fn latex_to_mathml(latex: &str, display: bool) -> String {
    let source = strip_delimiters(latex);
    let mut body = escape_xml(source);

    // Innermost groups first, so nested fractions and roots resolve outward
    for _ in 0..MAX_NESTING {
        let step = ROOT
            .replace_all(&body, |c: &Captures| {
                format!("<mroot><mrow>{}</mrow><mrow>{}</mrow></mroot>", &c[2], &c[1])
            })
            .into_owned();
        let step = SQRT
            .replace_all(&step, |c: &Captures| {
                format!("<msqrt><mrow>{}</mrow></msqrt>", &c[1])
            })
            .into_owned();
        let step = FRAC
            .replace_all(&step, |c: &Captures| {
                format!("<mfrac><mrow>{}</mrow><mrow>{}</mrow></mfrac>", &c[1], &c[2])
            })
            .into_owned();
        if step == body {
            break;
        }
        body = step;
    }

    let body = symbols::replace_commands(&body, |s| {
        format!("<{tag}>{}</{tag}>", s.unicode, tag = s.token.tag())
    });

    let display_attr = if display { r#" display="block""# } else { "" };
    format!(r#"<math xmlns="{MATHML_NS}"{display_attr}><mrow>{body}</mrow></math>"#)
}
