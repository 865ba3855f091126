//! Native `<math>` containers.

use crate::convert;
use crate::dom::{ArenaDom, ArenaNodeId};
use crate::format::Format;

use super::{mathml_of, tex_annotation};

pub(super) fn extract(dom: &ArenaDom, math: ArenaNodeId, format: Format) -> Option<String> {
    match format {
        Format::MathML => Some(mathml_of(dom, math)),
        Format::LaTeX => tex_annotation(dom, math),
        Format::Unicode => Some(convert::text_from_tree(dom, math)),
        Format::AsciiMath => Some(convert::asciimath_from_tree(dom, math)),
    }
}
