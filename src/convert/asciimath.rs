//! AsciiMath output, from LaTeX source or from a MathML tree.
//!
//! Both directions go through the shared symbol table, so a symbol spelled
//! `\leq` in LaTeX and `≤` in MathML both come out as `<=`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::latex::strip_delimiters;
use super::symbols;
use super::unicode::is_hidden_subtree;
use crate::dom::{ArenaDom, ArenaNodeData, ArenaNodeId, parse_html};

static FRAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").expect("static regex")
});
static SQRT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sqrt\s*\{([^{}]*)\}").expect("static regex"));
static ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sqrt\s*\[([^\[\]]*)\]\s*\{([^{}]*)\}").expect("static regex"));
static SCRIPT_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\^_])\{([^{}]*)\}").expect("static regex"));
static SIZING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:left|right|big|Big|bigg|Bigg)\b|\\[,;:! ]").expect("static regex")
});

const MAX_NESTING: usize = 16;

/// Best-effort LaTeX to AsciiMath.
///
/// ```
/// use mathclip::convert::latex_to_asciimath;
///
/// assert_eq!(latex_to_asciimath(r"\frac{1}{2} \leq x^{n+1}"), "(1)/(2) <= x^(n+1)");
/// ```
pub fn latex_to_asciimath(latex: &str) -> String {
    let mut body = strip_delimiters(latex).to_string();

    for _ in 0..MAX_NESTING {
        let step = ROOT
            .replace_all(&body, |c: &Captures| format!("root({})({})", &c[1], &c[2]))
            .into_owned();
        let step = SQRT
            .replace_all(&step, |c: &Captures| format!("sqrt({})", &c[1]))
            .into_owned();
        let step = FRAC
            .replace_all(&step, |c: &Captures| format!("({})/({})", &c[1], &c[2]))
            .into_owned();
        let step = SCRIPT_GROUP
            .replace_all(&step, |c: &Captures| format!("{}({})", &c[1], &c[2]))
            .into_owned();
        if step == body {
            break;
        }
        body = step;
    }

    let body = SIZING.replace_all(&body, " ");
    let body = symbols::replace_commands(&body, |s| format!(" {} ", s.asciimath));
    tidy(&body)
}

/// AsciiMath for a presentation MathML subtree.
pub fn asciimath_from_tree(dom: &ArenaDom, root: ArenaNodeId) -> String {
    let mut out = String::new();
    emit(dom, root, &mut out);
    tidy(&out)
}

/// AsciiMath for a MathML string that is not part of the document.
pub fn mathml_to_asciimath(markup: &str) -> String {
    let dom = parse_html(markup);
    match dom.find_by_tag("math") {
        Some(math) => asciimath_from_tree(&dom, math),
        None => String::new(),
    }
}

fn emit(dom: &ArenaDom, id: ArenaNodeId, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };
    let name = match &node.data {
        ArenaNodeData::Text(text) => {
            for c in text.trim().chars() {
                match symbols::asciimath_for_char(c) {
                    Some(spelling) => {
                        out.push(' ');
                        out.push_str(spelling);
                        out.push(' ');
                    }
                    None => out.push(c),
                }
            }
            return;
        }
        ArenaNodeData::Element(element) => element.local_name(),
        _ => {
            for child in dom.children(id) {
                emit(dom, child, out);
            }
            return;
        }
    };
    if is_hidden_subtree(dom, id) {
        return;
    }

    let kids: Vec<ArenaNodeId> = dom.children(id).filter(|&c| dom.is_element(c)).collect();
    let part = |child: ArenaNodeId| {
        let mut s = String::new();
        emit(dom, child, &mut s);
        tidy(&s)
    };

    match (name, kids.as_slice()) {
        ("mfrac", [num, den, ..]) => {
            out.push_str(&format!("({})/({})", part(*num), part(*den)));
        }
        ("msup", [base, sup, ..]) => {
            out.push_str(&format!("{}^{}", part(*base), script_group(&part(*sup))));
        }
        ("msub", [base, sub, ..]) => {
            out.push_str(&format!("{}_{}", part(*base), script_group(&part(*sub))));
        }
        ("msubsup", [base, sub, sup, ..]) => {
            out.push_str(&format!(
                "{}_{}^{}",
                part(*base),
                script_group(&part(*sub)),
                script_group(&part(*sup))
            ));
        }
        ("msqrt", _) => {
            let mut inner = String::new();
            for child in dom.children(id) {
                emit(dom, child, &mut inner);
            }
            out.push_str(&format!("sqrt({})", tidy(&inner)));
        }
        ("mroot", [base, index, ..]) => {
            out.push_str(&format!("root({})({})", part(*index), part(*base)));
        }
        ("semantics", [presentation, ..]) => emit(dom, *presentation, out),
        _ => {
            for child in dom.children(id) {
                emit(dom, child, out);
            }
        }
    }
}

fn script_group(text: &str) -> String {
    if text.chars().count() <= 1 {
        text.to_string()
    } else {
        format!("({text})")
    }
}

/// Collapse runs of whitespace and drop grouping braces left over from LaTeX.
fn tidy(text: &str) -> String {
    text.replace(['{', '}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latex_roots_and_symbols() {
        assert_eq!(latex_to_asciimath(r"\sqrt[3]{x} \times \pi"), "root(3)(x) xx pi");
        assert_eq!(latex_to_asciimath(r"$\sum_{i=1}^{n} i$"), "sum _(i=1)^(n) i");
    }

    #[test]
    fn test_latex_unknown_commands_survive() {
        assert_eq!(latex_to_asciimath(r"\mathbb{R}"), r"\mathbb R");
    }

    #[test]
    fn test_mathml_tree() {
        let out = mathml_to_asciimath(
            "<math><mfrac><mn>1</mn><mi>n</mi></mfrac><mo>≤</mo>\
             <msup><mi>x</mi><mrow><mn>2</mn><mi>k</mi></mrow></msup></math>",
        );
        assert_eq!(out, "(1)/(n) <= x^(2k)");
    }

    #[test]
    fn test_mathml_sqrt_and_greek() {
        let out = mathml_to_asciimath("<math><msqrt><mi>α</mi></msqrt></math>");
        assert_eq!(out, "sqrt(alpha)");
    }
}
