//! Payer file builder behaviour

mod common;

use common::{code, date, record};
use core_kernel::{MappingId, Cents};
use domain_accumulation::{
    BatchHeader, BuildError, OutboundLine, Payer, PayerRegistry, SegmentCodec, Delimiters,
};

fn header(payer: &str, filename: &str) -> BatchHeader {
    BatchHeader {
        payer_code: code(payer),
        report_date: date(2025, 1, 1),
        filename: filename.to_string(),
    }
}

#[test]
fn test_segment_builder_layout() {
    let registry = PayerRegistry::with_defaults().unwrap();
    let payer = Payer::new("Anthem", code("ANTHEM"));
    let first = record(&payer, 1);
    let second = record(&payer, 2);
    let ids = [MappingId::new(), MappingId::new()];
    let lines = vec![
        OutboundLine { mapping_id: ids[0], transaction_id: "TXN1", record: &first },
        OutboundLine { mapping_id: ids[1], transaction_id: "TXN2", record: &second },
    ];

    let built = registry
        .builder(&code("ANTHEM"))
        .unwrap()
        .build(&header("ANTHEM", "ANTHEM_20250101"), &lines);

    assert_eq!(built.filename, "ANTHEM_20250101");
    assert_eq!(built.rendered, ids.to_vec());
    assert!(built.rejected.is_empty());

    let segments = SegmentCodec::new(Delimiters::x12()).unwrap().parse(&built.body);
    assert_eq!(segments.len(), 4);
    assert_eq!(segments[0].id, "HDR");
    assert_eq!(segments[0].elements, vec!["ANTHEM", "ACCUMSVC", "20250101", "ANTHEM_20250101"]);
    assert_eq!(segments[1].id, "DTL");
    assert_eq!(segments[1].get(0), Some("TXN1"));
    assert_eq!(segments[1].get(1), Some("MBR0001"));
    assert_eq!(segments[1].get(3), Some("20241215"));
    assert_eq!(segments[1].get(4), Some("25.00"));
    assert_eq!(segments[3].elements, vec!["2", "75.00", "20.00"]);
}

#[test]
fn test_missing_deductible_is_rejected_not_dropped() {
    let registry = PayerRegistry::with_defaults().unwrap();
    let payer = Payer::new("Anthem", code("ANTHEM"));
    let good = record(&payer, 1);
    let mut bad = record(&payer, 2);
    bad.deductible_applied = None;
    let bad_id = MappingId::new();
    let lines = vec![
        OutboundLine { mapping_id: MappingId::new(), transaction_id: "TXN1", record: &good },
        OutboundLine { mapping_id: bad_id, transaction_id: "TXN2", record: &bad },
    ];

    let built = registry
        .builder(&code("ANTHEM"))
        .unwrap()
        .build(&header("ANTHEM", "ANTHEM_20250101"), &lines);

    assert_eq!(built.rendered.len(), 1);
    assert_eq!(built.rejected.len(), 1);
    let (id, error) = &built.rejected[0];
    assert_eq!(*id, bad_id);
    assert_eq!(
        *error,
        BuildError::MissingField { transaction_id: "TXN2".to_string(), field: "deductible_applied" }
    );
    assert!(!built.body.contains("TXN2"));
    assert!(built.body.contains("TRL*1*25.00*10.00~"));
}

#[test]
fn test_reserved_delimiter_in_member_plan_id() {
    let registry = PayerRegistry::with_defaults().unwrap();
    let payer = Payer::new("Anthem", code("ANTHEM"));
    let mut bad = record(&payer, 1);
    bad.member_plan_id = "MBR*1".to_string();
    let lines = vec![OutboundLine { mapping_id: MappingId::new(), transaction_id: "T", record: &bad }];

    let built = registry
        .builder(&code("ANTHEM"))
        .unwrap()
        .build(&header("ANTHEM", "ANTHEM_20250101"), &lines);
    assert!(built.is_empty());
    assert!(matches!(built.rejected[0].1, BuildError::ReservedDelimiter { field: "member_plan_id", .. }));
}

#[test]
fn test_member_required_for_cigna() {
    let registry = PayerRegistry::with_defaults().unwrap();
    let payer = Payer::new("Cigna", code("CIGNA"));
    let mut anonymous = record(&payer, 1);
    anonymous.member = None;
    let named = record(&payer, 2);
    let lines = vec![
        OutboundLine { mapping_id: MappingId::new(), transaction_id: "A1", record: &anonymous },
        OutboundLine { mapping_id: MappingId::new(), transaction_id: "A2", record: &named },
    ];

    let built = registry
        .builder(&code("CIGNA"))
        .unwrap()
        .build(&header("CIGNA", "CIGNA_20250101"), &lines);

    assert_eq!(built.rejected.len(), 1);
    assert!(matches!(built.rejected[0].1, BuildError::MissingField { field: "member", .. }));
    let rows: Vec<&str> = built.body.lines().collect();
    assert_eq!(rows[0], "transaction_id|member_plan_id|claim_id|date_of_service|deductible|oop|last_name|first_name|date_of_birth");
    assert_eq!(rows.len(), 2);
    assert!(rows[1].starts_with("A2|MBR0002|"));
    assert!(rows[1].ends_with("|50.00|10.00|Doe|Jane|19800517"));
}

#[test]
fn test_esi_segment_carries_member_components() {
    let registry = PayerRegistry::with_defaults().unwrap();
    let payer = Payer::new("ESI", code("ESI"));
    let mut rec = record(&payer, 1);
    rec.oop_applied = Some(Cents::new(-500));
    let lines = vec![OutboundLine { mapping_id: MappingId::new(), transaction_id: "E1", record: &rec }];

    let built = registry
        .builder(&code("ESI"))
        .unwrap()
        .build(&header("ESI", "ESI_20250101"), &lines);

    let segments = SegmentCodec::new(Delimiters::pipe()).unwrap().parse(&built.body);
    let detail = &segments[1];
    assert_eq!(detail.get(5), Some("-5.00"));
    assert_eq!(detail.components(6, &Delimiters::pipe()), vec!["Doe", "Jane"]);
    assert_eq!(detail.get(7), Some("19800517"));
}

#[test]
fn test_empty_batch_renders_header_and_trailer() {
    let registry = PayerRegistry::with_defaults().unwrap();
    let built = registry
        .builder(&code("ANTHEM"))
        .unwrap()
        .build(&header("ANTHEM", "ANTHEM_20250101"), &[]);
    assert!(built.is_empty());
    assert!(built.body.ends_with("TRL*0*0.00*0.00~\n"));
}
