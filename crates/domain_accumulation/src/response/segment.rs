use crate::codec::SegmentCodec;
use super::{line_from_fields, ParsedResponse, ResponseParseError, ResponseParser};

/// Reads `RSP*<txn>*<code>*<deductible>*<oop>*<message>~` lines framed by
/// HDR and TRL segments
#[derive(Debug, Clone)]
pub struct SegmentResponseParser {
    codec: SegmentCodec,
}

impl SegmentResponseParser {
    pub fn new(codec: SegmentCodec) -> Self {
        Self { codec }
    }
}

impl ResponseParser for SegmentResponseParser {
    fn parse(&self, content: &str) -> ParsedResponse {
        let mut parsed = ParsedResponse::default();
        let mut detail_count = 0usize;
        let mut trailer_count = None;

        for (index, segment) in self.codec.parse(content).iter().enumerate() {
            let line_number = index + 1;
            match segment.id.trim() {
                "HDR" => {}
                "RSP" => {
                    detail_count += 1;
                    let fields: Vec<&str> = segment.elements.iter().map(String::as_str).collect();
                    parsed.lines.push(line_from_fields(line_number, &fields));
                }
                "TRL" => {
                    trailer_count = Some(segment.get(0).unwrap_or_default().trim().to_string());
                }
                "" if segment.elements.is_empty() => {}
                other => parsed.lines.push(Err(ResponseParseError::new(
                    line_number,
                    None,
                    format!("unexpected segment {other}"),
                ))),
            }
        }

        match trailer_count {
            Some(count) if count.parse::<usize>().ok() != Some(detail_count) => {
                parsed.anomalies.push(format!(
                    "trailer count {count} does not match {detail_count} response lines"
                ));
            }
            None if detail_count > 0 => parsed.anomalies.push("missing trailer segment".to_string()),
            _ => {}
        }
        parsed
    }
}
