use tracing::debug;

use core_kernel::Cents;
use crate::codec::{Segment, SegmentCodec};
use super::{validate_line, BatchHeader, BuiltFile, OutboundLine, PayerFileBuilder};

/// HDR/DTL/TRL segment layout
///
/// ```text
/// HDR*<payer_code>*<sender_id>*<YYYYMMDD>*<filename>~
/// DTL*<txn_id>*<member_plan_id>*<claim_uuid>*<dos>*<deductible>*<oop>~
/// TRL*<count>*<total deductible>*<total oop>~
/// ```
#[derive(Debug, Clone)]
pub struct SegmentFileBuilder {
    codec: SegmentCodec,
    sender_id: String,
    require_member: bool,
}

impl SegmentFileBuilder {
    pub fn new(codec: SegmentCodec, sender_id: impl Into<String>, require_member: bool) -> Self {
        Self {
            codec,
            sender_id: sender_id.into(),
            require_member,
        }
    }
}

impl PayerFileBuilder for SegmentFileBuilder {
    fn build(&self, header: &BatchHeader, lines: &[OutboundLine<'_>]) -> BuiltFile {
        let delimiters = self.codec.delimiters();
        let mut built = BuiltFile {
            filename: header.filename.clone(),
            ..Default::default()
        };
        let mut segments = vec![Segment::new("HDR")
            .element(header.payer_code.as_str())
            .element(&self.sender_id)
            .element(header.report_date.format("%Y%m%d").to_string())
            .element(&header.filename)];
        let mut total_deductible = Cents::ZERO;
        let mut total_oop = Cents::ZERO;

        for line in lines {
            match validate_line(line, delimiters, self.require_member) {
                Ok(fields) => {
                    let mut segment = Segment::new("DTL")
                        .element(line.transaction_id)
                        .element(fields.member_plan_id)
                        .element(fields.claim_id)
                        .element(fields.date_of_service)
                        .element(fields.deductible.to_dollars_string())
                        .element(fields.oop.to_dollars_string());
                    if let Some(member) = fields.member {
                        let name = format!(
                            "{}{}{}",
                            member.last_name.trim(),
                            delimiters.component_separator,
                            member.first_name.trim()
                        );
                        segment = segment
                            .element(name)
                            .element(member.date_of_birth.format("%Y%m%d").to_string());
                    }
                    total_deductible = total_deductible + fields.deductible;
                    total_oop = total_oop + fields.oop;
                    segments.push(segment);
                    built.rendered.push(line.mapping_id);
                }
                Err(error) => {
                    debug!(transaction_id = line.transaction_id, %error, "Record excluded from segment file");
                    built.rejected.push((line.mapping_id, error));
                }
            }
        }

        segments.push(
            Segment::new("TRL")
                .element(built.rendered.len().to_string())
                .element(total_deductible.to_dollars_string())
                .element(total_oop.to_dollars_string()),
        );
        built.body = self.codec.render(&segments);
        built
    }
}
