//! Property tests for MathML cleanup.

use mathclip::convert::{MATHML_NS, clean_spacing, is_valid, prepare};
use proptest::prelude::*;

/// Token elements with arbitrary padding around their content.
fn token() -> impl Strategy<Value = String> {
    let pad = prop::sample::select(vec!["", " ", "  ", "\n", "\t ", "\u{200B}", "\u{2009}"]);
    (
        prop::sample::select(vec!["mi", "mn", "mo"]),
        "[a-z0-9+=-]{1,3}",
        pad.clone(),
        pad,
    )
        .prop_map(|(tag, text, before, after)| format!("<{tag}>{before}{text}{after}</{tag}>"))
}

/// Small presentation trees with spacing noise between nodes.
fn tree() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        4 => token(),
        1 => Just(r#"<mspace width="0.2em"/>"#.to_string()),
        1 => Just("<mtext> </mtext>".to_string()),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            prop::sample::select(vec!["mrow", "msup", "mfrac"]),
            prop::collection::vec(inner, 1..4),
            prop::sample::select(vec!["", " ", "\n  "]),
        )
            .prop_map(|(tag, kids, gap)| format!("<{tag}>{gap}{}{gap}</{tag}>", kids.join(gap)))
    })
}

proptest! {
    #[test]
    fn prop_clean_spacing_is_idempotent(body in tree()) {
        let markup = format!("<math>{body}</math>");
        let once = clean_spacing(&markup);
        prop_assert_eq!(clean_spacing(&once), once);
    }

    #[test]
    fn prop_prepared_mathml_has_one_namespaced_root(body in tree(), declared in any::<bool>()) {
        let markup = if declared {
            format!(r#"<math xmlns="{MATHML_NS}">{body}</math>"#)
        } else {
            body
        };
        let out = prepare(&markup);
        prop_assert!(is_valid(&out), "{}", out);
        prop_assert_eq!(out.matches("<math").count(), 1);
        prop_assert_eq!(out.matches("</math>").count(), 1);
        prop_assert_eq!(out.matches("xmlns=").count(), 1);
    }

    #[test]
    fn prop_no_whitespace_between_tags(body in tree()) {
        let out = prepare(&body);
        prop_assert!(!out.contains("> "), "{}", out);
        prop_assert!(!out.contains(">\n"), "{}", out);
    }
}
