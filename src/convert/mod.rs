//! Pure conversions between math representations.
//!
//! Nothing in here touches a live document: functions take strings, or a
//! read-only view of a subtree, and return strings. Every conversion other
//! than MathML cleanup is approximate.

pub mod asciimath;
pub mod latex;
pub mod mathml;
pub mod symbols;
pub mod unicode;

pub use asciimath::{asciimath_from_tree, latex_to_asciimath, mathml_to_asciimath};
pub use latex::{latex_to_mathml, looks_like_latex, looks_like_mathml, strip_delimiters};
pub use mathml::{MATHML_NS, clean_spacing, is_valid, is_well_formed, normalize_namespace, prepare};
pub use unicode::{latex_to_unicode, mathml_to_text, text_from_tree, to_subscript, to_superscript};
