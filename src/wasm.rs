//! WASM bindings for in-page extraction.
//!
//! This module exposes detection and the string conversions to JavaScript
//! via wasm-bindgen.

use wasm_bindgen::prelude::*;

use crate::config::{SchedulerConfig, Settings};
use crate::convert;
use crate::dom::parse_html;
use crate::format::Format;
use crate::session::Session;

/// Initialize panic hook for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Detect every equation in `html` and extract it as `format`.
///
/// Equations with no source for the format are left out. Unknown format
/// names fall back to MathML.
#[wasm_bindgen]
pub fn extract_all(html: &str, format: &str) -> Result<Vec<String>, JsValue> {
    let format = Format::parse_lenient(format);
    let settings = Settings {
        format,
        ..Settings::default()
    };
    let mut session = Session::new(parse_html(html), settings, SchedulerConfig::default())
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    session.run_until_idle(0);
    Ok(session
        .extract_all(format)
        .into_iter()
        .filter_map(|e| e.content)
        .collect())
}

/// Clean a MathML string for pasting (spacing removed, namespace fixed).
#[wasm_bindgen]
pub fn clean_mathml(markup: &str) -> String {
    convert::prepare(markup)
}

/// Best-effort LaTeX to MathML.
#[wasm_bindgen]
pub fn latex_to_mathml(latex: &str, display: bool) -> String {
    convert::latex_to_mathml(latex, display)
}

/// Superscript (`sup = true`) or subscript transliteration.
#[wasm_bindgen]
pub fn to_unicode_script(text: &str, sup: bool) -> String {
    if sup {
        convert::to_superscript(text)
    } else {
        convert::to_subscript(text)
    }
}
