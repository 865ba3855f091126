//! Plain-text rendering of math with Unicode sub/superscripts.

use std::sync::LazyLock;

use html5ever::ns;
use regex::{Captures, Regex};

use super::latex::strip_delimiters;
use super::symbols;
use crate::dom::{ArenaDom, ArenaNodeData, ArenaNodeId, parse_html};

static FRAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").expect("static regex")
});
static SQRT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\sqrt\s*\{([^{}]*)\}").expect("static regex"));
static SCRIPT_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\^_])\{([^{}]*)\}").expect("static regex"));
static SCRIPT_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\^_])([^\s{}\\])").expect("static regex"));
static SIZING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:left|right|big|Big|bigg|Bigg)\b|\\[,;:! ]").expect("static regex")
});

const MAX_NESTING: usize = 16;

fn superscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' | '−' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        _ => return None,
    })
}

fn subscript_char(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' | '−' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        _ => return None,
    })
}

/// Map digits, signs and parentheses to superscript forms. Other characters
/// are kept as they are.
///
/// ```
/// assert_eq!(mathclip::convert::to_superscript("2n+1"), "²n⁺¹");
/// ```
pub fn to_superscript(text: &str) -> String {
    text.chars().map(|c| superscript_char(c).unwrap_or(c)).collect()
}

/// Map digits, signs and parentheses to subscript forms.
pub fn to_subscript(text: &str) -> String {
    text.chars().map(|c| subscript_char(c).unwrap_or(c)).collect()
}

/// Subtrees that hold non-visual duplicates of the equation.
///
/// Walking into these would print the equation twice (KaTeX ships its MathML
/// next to the HTML rendering, MathJax ships assistive MathML).
pub(crate) fn is_hidden_subtree(dom: &ArenaDom, id: ArenaNodeId) -> bool {
    let Some(name) = dom.element_name(id) else {
        return false;
    };
    matches!(
        name.as_ref(),
        "annotation" | "annotation-xml" | "script" | "style" | "mjx-assistive-mml"
    ) || dom.has_class(id, "katex-mathml")
        || dom.has_class(id, "MJX_Assistive_MathML")
}

fn element_children(dom: &ArenaDom, id: ArenaNodeId) -> Vec<ArenaNodeId> {
    dom.children(id).filter(|&c| dom.is_element(c)).collect()
}

/// Wrap in parentheses unless the text is a single character.
fn group(text: &str) -> String {
    if text.chars().count() <= 1 {
        text.to_string()
    } else {
        format!("({text})")
    }
}

/// Text of a rendered equation subtree, with scripts transliterated.
///
/// Understands presentation MathML (`msup`, `msub`, `msubsup`, `mfrac`,
/// `msqrt`, `mroot`), HTML `sup`/`sub`, and the KaTeX `.msupsub` layout.
pub fn text_from_tree(dom: &ArenaDom, root: ArenaNodeId) -> String {
    let mut out = String::new();
    walk(dom, root, &mut out);
    collapse_whitespace(&out)
}

fn walk(dom: &ArenaDom, id: ArenaNodeId, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };
    match &node.data {
        ArenaNodeData::Text(text) => {
            let in_mathml = dom
                .element_namespace(node.parent)
                .is_some_and(|namespace| *namespace == ns!(mathml));
            if in_mathml {
                out.push_str(text.trim());
            } else {
                out.push_str(text);
            }
        }
        ArenaNodeData::Element(element) => {
            if is_hidden_subtree(dom, id) {
                return;
            }
            if dom.has_class(id, "msupsub") {
                katex_scripts(dom, id, out);
                return;
            }
            let kids = element_children(dom, id);
            match (element.local_name(), kids.as_slice()) {
                ("msup", [base, sup, ..]) => {
                    walk(dom, *base, out);
                    out.push_str(&to_superscript(&inner(dom, *sup)));
                }
                ("msub", [base, sub, ..]) => {
                    walk(dom, *base, out);
                    out.push_str(&to_subscript(&inner(dom, *sub)));
                }
                ("msubsup", [base, sub, sup, ..]) => {
                    walk(dom, *base, out);
                    out.push_str(&to_subscript(&inner(dom, *sub)));
                    out.push_str(&to_superscript(&inner(dom, *sup)));
                }
                ("mfrac", [num, den, ..]) => {
                    out.push_str(&group(&inner(dom, *num)));
                    out.push('/');
                    out.push_str(&group(&inner(dom, *den)));
                }
                ("msqrt", _) => {
                    out.push('√');
                    out.push_str(&group(&inner(dom, id)));
                }
                ("mroot", [base, index, ..]) => {
                    out.push_str(&to_superscript(&inner(dom, *index)));
                    out.push('√');
                    out.push_str(&group(&inner(dom, *base)));
                }
                ("sup", _) => out.push_str(&to_superscript(&inner(dom, id))),
                ("sub", _) => out.push_str(&to_subscript(&inner(dom, id))),
                ("semantics", [presentation, ..]) => walk(dom, *presentation, out),
                _ => {
                    for child in dom.children(id) {
                        walk(dom, child, out);
                    }
                }
            }
        }
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                walk(dom, child, out);
            }
        }
        ArenaNodeData::Comment(_) | ArenaNodeData::Doctype(_) => {}
    }
}

/// Text of the children of `id`, walked the same way.
fn inner(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    for child in dom.children(id) {
        walk(dom, child, &mut out);
    }
    out.trim().to_string()
}

/// KaTeX lays scripts out in a `.vlist`; a `vlist-t2` table means a
/// subscript is present, and when both scripts exist the subscript comes
/// first in document order.
fn katex_scripts(dom: &ArenaDom, msupsub: ArenaNodeId, out: &mut String) {
    let has_sub = dom.find_class_in(msupsub, "vlist-t2").is_some();
    let scripts: Vec<String> = dom
        .find_class_in(msupsub, "vlist")
        .map(|vlist| {
            dom.children(vlist)
                .map(|item| inner(dom, item))
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();

    match (has_sub, scripts.as_slice()) {
        (true, [sub, sup, ..]) => {
            out.push_str(&to_subscript(sub));
            out.push_str(&to_superscript(sup));
        }
        (true, [sub]) => out.push_str(&to_subscript(sub)),
        (false, [sup, ..]) => out.push_str(&to_superscript(sup)),
        _ => out.push_str(&to_superscript(&inner(dom, msupsub))),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain text of a MathML string that is not part of the document.
pub fn mathml_to_text(markup: &str) -> String {
    let dom = parse_html(markup);
    let root = dom
        .find_by_tag("math")
        .or_else(|| dom.body())
        .unwrap_or(dom.document());
    text_from_tree(&dom, root)
}

/// Best-effort LaTeX to Unicode text.
///
/// ```
/// use mathclip::convert::latex_to_unicode;
///
/// assert_eq!(latex_to_unicode(r"$x^2 + \alpha_{1}$"), "x² + α₁");
/// ```
pub fn latex_to_unicode(latex: &str) -> String {
    let mut body = strip_delimiters(latex).to_string();

    for _ in 0..MAX_NESTING {
        let step = SQRT
            .replace_all(&body, |c: &Captures| format!("√{}", group(&c[1])))
            .into_owned();
        let step = FRAC
            .replace_all(&step, |c: &Captures| {
                format!("{}/{}", group(&c[1]), group(&c[2]))
            })
            .into_owned();
        if step == body {
            break;
        }
        body = step;
    }

    let body = SIZING.replace_all(&body, " ");
    let body = symbols::replace_commands(&body, |s| s.unicode.to_string());
    let body = SCRIPT_GROUP.replace_all(&body, |c: &Captures| script(&c[1], &c[2]));
    let body = SCRIPT_CHAR.replace_all(&body, |c: &Captures| script(&c[1], &c[2]));
    let body: String = body.chars().filter(|&c| c != '{' && c != '}').collect();
    collapse_whitespace(&body)
}

fn script(marker: &str, text: &str) -> String {
    if marker == "^" {
        to_superscript(text)
    } else {
        to_subscript(text)
    }
}
