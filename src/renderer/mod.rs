//! Per-renderer extraction.
//!
//! Each tagged container is dispatched on its stored [`RendererKind`]. The
//! adapters locate the renderer's source-of-truth nodes and return raw
//! content; [`RendererAdapter::extract`] then applies the MathML fallback,
//! the content bounds and the session error budget. Failures never escape
//! as errors: they are logged and become `None`.

mod generic;
mod katex;
mod mathjax;
mod mathml;

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::convert;
use crate::dom::{ArenaDom, ArenaNodeId, SelectorSet, serialize};
use crate::error::{Error, Result};
use crate::format::{ExtractionResult, Format};
use crate::registry::RendererKind;

/// Math engine detected on a page, most capable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Engine {
    #[serde(rename = "mathjax-v3")]
    MathJaxV3,
    #[serde(rename = "mathjax-v2")]
    MathJaxV2,
    #[serde(rename = "katex")]
    KaTeX,
    #[serde(rename = "mathml")]
    MathML,
    #[default]
    #[serde(rename = "none")]
    None,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::MathJaxV3 => "mathjax-v3",
            Engine::MathJaxV2 => "mathjax-v2",
            Engine::KaTeX => "katex",
            Engine::MathML => "mathml",
            Engine::None => "none",
        }
    }

    /// Engines that typeset asynchronously and expose a completion signal.
    pub fn is_async(self) -> bool {
        matches!(self, Engine::MathJaxV2 | Engine::MathJaxV3)
    }
}

/// Progress of an engine's typesetting pass, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypesetState {
    /// The engine exposes no completion signal.
    Unknown,
    Pending,
    Done,
    Failed,
}

/// Input language of a recovered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    TeX,
    MathML,
    AsciiMath,
}

/// Original equation source recovered from a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub text: String,
    pub kind: SourceKind,
    /// Display (block) rather than inline math.
    pub display: bool,
}

impl SourceText {
    pub fn new(text: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            text: text.into(),
            kind,
            display: false,
        }
    }

    pub fn display(mut self, display: bool) -> Self {
        self.display = display;
        self
    }
}

/// The page-side renderer APIs the core may consult.
///
/// Every method is optional: a host without access to the engines keeps
/// the defaults and extraction degrades to DOM-only paths.
pub trait RendererHost {
    /// Completion state of `engine`'s current typesetting pass.
    fn typeset_state(&self, _engine: Engine) -> TypesetState {
        TypesetState::Unknown
    }

    /// Original input MathJax recorded for `container`.
    fn original_source(&self, _dom: &ArenaDom, _container: ArenaNodeId, _kind: RendererKind) -> Option<SourceText> {
        None
    }
}

/// Host with no engine access.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHost;

impl RendererHost for NoHost {}

/// Host backed by recorded answers, keyed by container node.
#[derive(Debug, Default, Clone)]
pub struct RecordedHost {
    sources: HashMap<ArenaNodeId, SourceText>,
    states: HashMap<Engine, TypesetState>,
}

impl RecordedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, container: ArenaNodeId, source: SourceText) -> Self {
        self.sources.insert(container, source);
        self
    }

    pub fn set_state(&mut self, engine: Engine, state: TypesetState) {
        self.states.insert(engine, state);
    }
}

impl RendererHost for RecordedHost {
    fn typeset_state(&self, engine: Engine) -> TypesetState {
        self.states.get(&engine).copied().unwrap_or(TypesetState::Unknown)
    }

    fn original_source(&self, _dom: &ArenaDom, container: ArenaNodeId, _kind: RendererKind) -> Option<SourceText> {
        self.sources.get(&container).cloned()
    }
}

/// Everything an adapter could recover for one container.
///
/// The fallback order lives in [`Sources::render`]: original source first,
/// then embedded MathML, then rendered text.
#[derive(Debug, Default)]
pub(crate) struct Sources {
    pub original: Option<SourceText>,
    /// Serialized MathML the renderer embedded next to its output.
    pub embedded_mathml: Option<String>,
    /// AsciiMath computed from the embedded MathML tree.
    pub embedded_asciimath: Option<String>,
    /// Visible text with scripts transliterated.
    pub rendered_text: Option<String>,
    /// Last-resort LaTeX when the page kept no TeX source.
    pub latex_fallback: Option<String>,
}

impl Sources {
    fn render(&self, format: Format) -> Option<String> {
        let original = self.original.as_ref();
        let of_kind = |kind: SourceKind| original.filter(|s| s.kind == kind);

        match format {
            Format::LaTeX => of_kind(SourceKind::TeX)
                .map(|s| convert::strip_delimiters(&s.text).to_string())
                .or_else(|| self.latex_fallback.clone()),
            Format::MathML => of_kind(SourceKind::MathML)
                .map(|s| s.text.clone())
                .or_else(|| self.embedded_mathml.clone())
                .or_else(|| of_kind(SourceKind::TeX).map(|s| convert::latex_to_mathml(&s.text, s.display)))
                .map(|m| convert::prepare(&m)),
            Format::Unicode => original
                .map(|s| match s.kind {
                    SourceKind::TeX => convert::latex_to_unicode(&s.text),
                    SourceKind::MathML => convert::mathml_to_text(&s.text),
                    SourceKind::AsciiMath => s.text.clone(),
                })
                .filter(|t| !t.trim().is_empty())
                .or_else(|| self.rendered_text.clone()),
            Format::AsciiMath => original
                .map(|s| match s.kind {
                    SourceKind::TeX => convert::latex_to_asciimath(&s.text),
                    SourceKind::MathML => convert::mathml_to_asciimath(&s.text),
                    SourceKind::AsciiMath => s.text.clone(),
                })
                .or_else(|| self.embedded_asciimath.clone()),
        }
    }
}

/// Serialized, cleaned MathML for an element in the document.
pub(crate) fn mathml_of(dom: &ArenaDom, math: ArenaNodeId) -> String {
    convert::prepare(&serialize::to_xml(dom, math))
}

/// TeX annotation inside a MathML `semantics` block, if any.
pub(crate) fn tex_annotation(dom: &ArenaDom, root: ArenaNodeId) -> Option<String> {
    dom.subtree(root)
        .filter(|&n| dom.is_tag(n, "annotation"))
        .find(|&n| {
            dom.get_attr(n, "encoding")
                .is_some_and(|e| e.eq_ignore_ascii_case("application/x-tex") || e.eq_ignore_ascii_case("tex"))
        })
        .map(|n| dom.deep_text(n).trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Counts extraction failures and switches extraction off past the limit.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    errors: u32,
    max_errors: u32,
}

impl ErrorBudget {
    pub fn new(max_errors: u32) -> Self {
        Self { errors: 0, max_errors }
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn max_errors(&self) -> u32 {
        self.max_errors
    }

    pub fn exhausted(&self) -> bool {
        self.errors >= self.max_errors
    }

    fn record(&mut self) {
        self.errors += 1;
        if self.errors == self.max_errors {
            warn!(errors = self.errors, "extraction error budget exhausted; extraction disabled");
        }
    }

    pub fn reset(&mut self) {
        self.errors = 0;
    }
}

/// Extraction dispatch over renderer kinds.
pub struct RendererAdapter {
    host: Box<dyn RendererHost>,
    budget: ErrorBudget,
}

impl RendererAdapter {
    pub fn new(host: Box<dyn RendererHost>, max_errors: u32) -> Self {
        Self {
            host,
            budget: ErrorBudget::new(max_errors),
        }
    }

    pub fn host(&self) -> &dyn RendererHost {
        self.host.as_ref()
    }

    pub fn budget(&self) -> &ErrorBudget {
        &self.budget
    }

    pub fn budget_mut(&mut self) -> &mut ErrorBudget {
        &mut self.budget
    }

    /// Extract `container` in `format`.
    ///
    /// Returns `None` on any failure, and immediately once the error budget
    /// is spent. A container with no source for `format` is not a failure
    /// and leaves the budget alone.
    pub fn extract(
        &mut self,
        dom: &ArenaDom,
        container: ArenaNodeId,
        kind: RendererKind,
        format: Format,
    ) -> Option<ExtractionResult> {
        if self.budget.exhausted() {
            debug!(%kind, "extraction skipped: error budget spent");
            return None;
        }
        match self.try_extract(dom, container, kind, format) {
            Ok(result) => Some(result),
            Err(e @ Error::NoSource { .. }) => {
                debug!(%kind, node = container.0, error = %e, "nothing to extract");
                None
            }
            Err(e) => {
                warn!(%kind, %format, node = container.0, error = %e, "extraction failed");
                self.budget.record();
                None
            }
        }
    }

    fn try_extract(
        &self,
        dom: &ArenaDom,
        container: ArenaNodeId,
        kind: RendererKind,
        format: Format,
    ) -> Result<ExtractionResult> {
        if !dom.is_element(container) {
            return Err(Error::InvalidElement(container.0));
        }
        let primary = extract_raw(self.host.as_ref(), dom, container, kind, format);
        let content = match (primary, format) {
            (Some(content), _) => Some(content),
            (None, Format::MathML) => dom.find_tag_in(container, "math").map(|m| mathml_of(dom, m)),
            (None, _) => None,
        }
        .ok_or(Error::NoSource { format })?;

        if format == Format::MathML && !convert::is_valid(&content) {
            return Err(Error::InvalidMathML);
        }
        ExtractionResult::new(content, format)
    }
}

/// Primary path for one renderer kind, without fallbacks or bounds.
fn extract_raw(
    host: &dyn RendererHost,
    dom: &ArenaDom,
    container: ArenaNodeId,
    kind: RendererKind,
    format: Format,
) -> Option<String> {
    let raw = match kind {
        RendererKind::KaTeX => katex::extract(dom, container, format),
        RendererKind::MathJaxV2 => mathjax::sources_v2(host, dom, container).render(format),
        RendererKind::MathJaxV3 => mathjax::sources_v3(host, dom, container).render(format),
        RendererKind::NativeMathML => mathml::extract(dom, container, format),
        RendererKind::DataAttribute => generic::data_attribute_sources(dom, container).render(format),
        RendererKind::Generic => generic::extract(dom, container, format),
    };
    raw.filter(|s| !s.trim().is_empty())
}

/// Detect which math engine rendered the page.
pub fn detect_engine(dom: &ArenaDom) -> Result<Engine> {
    let engines = [
        (
            Engine::MathJaxV3,
            r#"mjx-container, script[src*="mathjax@3"], script[src*="mathjax/3"], script[src*="tex-mml-chtml"], script[src*="tex-chtml"], script[src*="tex-svg"]"#,
        ),
        (
            Engine::MathJaxV2,
            r#".MathJax, .MathJax_Preview, script[type^="math/tex"], script[type="math/asciimath"], script[type="math/mml"], script[src*="MathJax.js"]"#,
        ),
        (
            Engine::KaTeX,
            r#".katex, link[href*="katex"], script[src*="katex"]"#,
        ),
        (Engine::MathML, "math"),
    ];
    for (engine, selector) in engines {
        if SelectorSet::parse(selector)?.select_first(dom, dom.document()).is_some() {
            return Ok(engine);
        }
    }
    Ok(Engine::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn adapter() -> RendererAdapter {
        RendererAdapter::new(Box::new(NoHost), 10)
    }

    #[test]
    fn test_detect_engine() {
        let cases = [
            ("<mjx-container>x</mjx-container>", Engine::MathJaxV3),
            (r#"<script type="math/tex">x</script>"#, Engine::MathJaxV2),
            (r#"<link rel="stylesheet" href="/katex.min.css">"#, Engine::KaTeX),
            ("<math><mi>x</mi></math>", Engine::MathML),
            ("<p>plain</p>", Engine::None),
        ];
        for (html, expected) in cases {
            assert_eq!(detect_engine(&parse_html(html)).unwrap(), expected, "{html}");
        }
    }

    #[test]
    fn test_non_element_is_rejected() {
        let dom = parse_html("<p>text</p>");
        let p = dom.find_by_tag("p").unwrap();
        let text = dom.children(p).next().unwrap();
        let mut a = adapter();
        assert!(a.extract(&dom, text, RendererKind::Generic, Format::Unicode).is_none());
        assert_eq!(a.budget().errors(), 1);
    }

    #[test]
    fn test_mathml_fallback_finds_nested_math() {
        let dom = parse_html(r#"<div id="g" class="formula">x = 1 <math><mi>x</mi></math></div>"#);
        let g = dom.get_by_id("g").unwrap();
        let mut a = adapter();
        let r = a.extract(&dom, g, RendererKind::Generic, Format::MathML).unwrap();
        assert_eq!(r.content(), r#"<math xmlns="http://www.w3.org/1998/Math/MathML"><mi>x</mi></math>"#);
    }

    #[test]
    fn test_missing_source_is_not_charged() {
        let dom = parse_html(
            r#"<span class="katex" id="k"><span class="katex-html">x</span></span><math id="m"><mi>a</mi></math>"#,
        );
        let k = dom.get_by_id("k").unwrap();
        let m = dom.get_by_id("m").unwrap();
        let mut a = RendererAdapter::new(Box::new(NoHost), 2);
        for _ in 0..5 {
            assert!(a.extract(&dom, k, RendererKind::KaTeX, Format::LaTeX).is_none());
            assert!(a.extract(&dom, m, RendererKind::NativeMathML, Format::LaTeX).is_none());
        }
        assert_eq!(a.budget().errors(), 0);
        assert_eq!(
            a.extract(&dom, k, RendererKind::KaTeX, Format::Unicode).unwrap().content(),
            "x"
        );
    }

    #[test]
    fn test_budget_short_circuits() {
        let dom = parse_html(r#"<p id="p">text <span class="katex" id="k"><span class="katex-html">x</span></span></p>"#);
        let p = dom.get_by_id("p").unwrap();
        let text = dom.children(p).next().unwrap();
        let k = dom.get_by_id("k").unwrap();
        let mut a = RendererAdapter::new(Box::new(NoHost), 2);
        for _ in 0..3 {
            assert!(a.extract(&dom, text, RendererKind::Generic, Format::Unicode).is_none());
        }
        assert_eq!(a.budget().errors(), 2);
        assert!(a.budget().exhausted());
        assert!(a.extract(&dom, k, RendererKind::KaTeX, Format::Unicode).is_none());
    }

    #[test]
    fn test_sources_fallback_order() {
        let sources = Sources {
            original: Some(SourceText::new(r"\frac{1}{2}", SourceKind::TeX)),
            embedded_mathml: Some("<math><mn>0.5</mn></math>".into()),
            embedded_asciimath: None,
            rendered_text: Some("½".into()),
            latex_fallback: Some("1/2".into()),
        };
        assert_eq!(sources.render(Format::LaTeX).as_deref(), Some(r"\frac{1}{2}"));
        assert!(sources.render(Format::MathML).unwrap().contains("<mn>0.5</mn>"));
        assert_eq!(sources.render(Format::Unicode).as_deref(), Some("1/2"));
        assert_eq!(sources.render(Format::AsciiMath).as_deref(), Some("(1)/(2)"));

        let untyped = Sources {
            latex_fallback: Some("y".into()),
            ..Sources::default()
        };
        assert_eq!(untyped.render(Format::LaTeX).as_deref(), Some("y"));
    }
}
