use crate::codec::SegmentCodec;
use super::{line_from_fields, ParsedResponse, ResponseParser};

/// Reads `transaction_id|status|deductible|oop|message` rows; the header
/// row is optional
#[derive(Debug, Clone)]
pub struct DelimitedResponseParser {
    codec: SegmentCodec,
}

impl DelimitedResponseParser {
    pub fn new(codec: SegmentCodec) -> Self {
        Self { codec }
    }
}

impl ResponseParser for DelimitedResponseParser {
    fn parse(&self, content: &str) -> ParsedResponse {
        let mut parsed = ParsedResponse::default();
        for (index, row) in self.codec.parse(content).iter().enumerate() {
            let fields: Vec<&str> = row.fields().map(|f| f.trim_end_matches('\r')).collect();
            if fields.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if index == 0 && fields[0].trim().eq_ignore_ascii_case("transaction_id") {
                continue;
            }
            parsed.lines.push(line_from_fields(index + 1, &fields));
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Delimiters;

    #[test]
    fn test_parse_rows_with_header() {
        let parser = DelimitedResponseParser::new(SegmentCodec::new(Delimiters::pipe()).unwrap());
        let parsed = parser.parse("transaction_id|status|deductible|oop|message\nABC|PROCESSED|1.00|2.00|\n\nDEF|||\n");
        assert_eq!(parsed.lines.len(), 2);
        assert!(parsed.lines[0].is_ok());
        let error = parsed.lines[1].as_ref().unwrap_err();
        assert_eq!(error.transaction_id.as_deref(), Some("DEF"));
        assert_eq!(error.line_number, 4);
    }
}
