use tracing::debug;

use crate::codec::{Segment, SegmentCodec};
use super::{validate_line, BatchHeader, BuiltFile, OutboundLine, PayerFileBuilder};

/// Column header of the delimited outbound layout
pub const OUTBOUND_COLUMNS: [&str; 9] = [
    "transaction_id",
    "member_plan_id",
    "claim_id",
    "date_of_service",
    "deductible",
    "oop",
    "last_name",
    "first_name",
    "date_of_birth",
];

/// CSV-like layout: a header row and one row per record
///
/// Rows go through the segment codec with the first column standing in as
/// the segment id.
#[derive(Debug, Clone)]
pub struct DelimitedFileBuilder {
    codec: SegmentCodec,
    require_member: bool,
}

impl DelimitedFileBuilder {
    pub fn new(codec: SegmentCodec, require_member: bool) -> Self {
        Self { codec, require_member }
    }
}

impl PayerFileBuilder for DelimitedFileBuilder {
    fn build(&self, header: &BatchHeader, lines: &[OutboundLine<'_>]) -> BuiltFile {
        let mut built = BuiltFile {
            filename: header.filename.clone(),
            ..Default::default()
        };
        let mut rows = vec![Segment::from_fields(OUTBOUND_COLUMNS)];

        for line in lines {
            match validate_line(line, self.codec.delimiters(), self.require_member) {
                Ok(fields) => {
                    let (last, first, dob) = match fields.member {
                        Some(member) => (
                            member.last_name.trim().to_string(),
                            member.first_name.trim().to_string(),
                            member.date_of_birth.format("%Y%m%d").to_string(),
                        ),
                        None => Default::default(),
                    };
                    rows.push(Segment::from_fields([
                        line.transaction_id.to_string(),
                        fields.member_plan_id,
                        fields.claim_id,
                        fields.date_of_service,
                        fields.deductible.to_dollars_string(),
                        fields.oop.to_dollars_string(),
                        last,
                        first,
                        dob,
                    ]));
                    built.rendered.push(line.mapping_id);
                }
                Err(error) => {
                    debug!(transaction_id = line.transaction_id, %error, "Record excluded from delimited file");
                    built.rejected.push((line.mapping_id, error));
                }
            }
        }

        built.body = self.codec.render(&rows);
        built
    }
}
