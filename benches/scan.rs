//! Benchmarks for detection and extraction.
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use mathclip::convert::{clean_spacing, latex_to_mathml};
use mathclip::{EquationRegistry, Format, SchedulerConfig, Session, Settings, parse_html};

const KATEX: &str = r#"<span class="katex"><span class="katex-mathml"><math xmlns="http://www.w3.org/1998/Math/MathML"><semantics><mrow><msup><mi>x</mi><mn>2</mn></msup><mo>+</mo><mfrac><mn>1</mn><mi>n</mi></mfrac></mrow><annotation encoding="application/x-tex">x^2 + \frac{1}{n}</annotation></semantics></math></span><span class="katex-html" aria-hidden="true"><span class="base"><span class="mord"><span class="mord mathnormal">x</span><span class="msupsub"><span class="vlist-t"><span class="vlist-r"><span class="vlist"><span><span class="mord mtight">2</span></span></span></span></span></span></span><span class="mbin">+</span><span class="mord"><span class="mfrac">1n</span></span></span></span></span>"#;

/// A page of paragraphs with `n` inline KaTeX equations.
fn page(n: usize) -> String {
    let mut html = String::from("<!DOCTYPE html><html><body>");
    for i in 0..n {
        html.push_str(&format!("<p>Paragraph {i} discusses {KATEX} at some length.</p>"));
    }
    html.push_str("</body></html>");
    html
}

// ============================================================================
// Detection Benchmarks
// ============================================================================

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    for n in [50, 500] {
        let html = page(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &html, |b, html| {
            b.iter_batched(
                || parse_html(html),
                |mut dom| {
                    let mut registry = EquationRegistry::new().unwrap();
                    registry.scan_document(&mut dom).len()
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_session_pass(c: &mut Criterion) {
    let html = page(200);
    c.bench_function("session_pass_200", |b| {
        b.iter(|| {
            let mut session =
                Session::new(parse_html(&html), Settings::default(), SchedulerConfig::default()).unwrap();
            session.run_until_idle(0);
            session.extract_all(Format::LaTeX).len()
        });
    });
}

// ============================================================================
// Conversion Benchmarks
// ============================================================================

fn bench_extract(c: &mut Criterion) {
    let html = page(100);
    let mut session = Session::new(parse_html(&html), Settings::default(), SchedulerConfig::default()).unwrap();
    session.run_until_idle(0);

    let mut group = c.benchmark_group("extract_100");
    for format in Format::ALL {
        group.bench_function(format.as_str(), |b| {
            b.iter(|| session.extract_all(format).len());
        });
    }
    group.finish();
}

fn bench_clean_spacing(c: &mut Criterion) {
    let noisy = latex_to_mathml(r"\frac{\alpha + \beta}{\sqrt{x}} \leq \sum \infty", true)
        .replace("><", ">\n    <");
    c.bench_function("clean_spacing", |b| {
        b.iter(|| clean_spacing(&noisy));
    });
}

criterion_group!(
    benches,
    bench_scan,
    bench_session_pass,
    bench_extract,
    bench_clean_spacing
);
criterion_main!(benches);
