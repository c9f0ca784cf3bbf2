//! Segment codec properties

use domain_accumulation::{Delimiters, Segment, SegmentCodec};
use proptest::prelude::*;

/// Distinct printable delimiter triples plus an optional line ending
fn delimiters() -> impl Strategy<Value = Delimiters> {
    let pool = vec!['~', '*', ':', '|', '^', '\n', ';', '!'];
    (
        proptest::sample::subsequence(pool, 3).prop_shuffle(),
        proptest::option::of(prop_oneof![Just("\n".to_string()), Just("\r\n".to_string())]),
    )
        .prop_map(|(chars, line_ending)| {
            let line_ending = line_ending.filter(|token| !token.chars().any(|c| chars.contains(&c)));
            Delimiters {
                segment_terminator: chars[0],
                element_separator: chars[1],
                component_separator: chars[2],
                line_ending,
            }
        })
}

fn segments_for(delimiters: Delimiters) -> impl Strategy<Value = (Delimiters, Vec<Segment>)> {
    let field = "[A-Za-z0-9 .,_-]{0,8}";
    let segment = (field, proptest::collection::vec(field, 0..6))
        .prop_map(|(id, elements)| Segment { id, elements });
    proptest::collection::vec(segment, 0..12)
        .prop_map(move |segments| (delimiters.clone(), segments))
}

proptest! {
    #[test]
    fn render_then_parse_is_identity((delimiters, segments) in delimiters().prop_flat_map(segments_for)) {
        let codec = SegmentCodec::new(delimiters).unwrap();
        let rendered = codec.render(&segments);
        let reparsed = codec.parse(&rendered);
        prop_assert_eq!(codec.render(&reparsed), rendered);
    }

    #[test]
    fn parse_never_panics(content in ".{0,200}") {
        let codec = SegmentCodec::new(Delimiters::x12()).unwrap();
        let _ = codec.parse(&content);
    }
}

#[test]
fn test_x12_round_trip_preserves_segments() {
    let codec = SegmentCodec::new(Delimiters::x12()).unwrap();
    let segments = vec![
        Segment::new("HDR").element("ANTHEM").element("20250101"),
        Segment::new("DTL").element("ABC").element("").element("12.00"),
        Segment::new("TRL").element("1"),
    ];
    let rendered = codec.render(&segments);
    assert_eq!(rendered, "HDR*ANTHEM*20250101~\nDTL*ABC**12.00~\nTRL*1~\n");
    assert_eq!(codec.parse(&rendered), segments);
}
