use super::{
    BECOMING_READY, INVALID_FIELD_IN_CDB, LONG_WRITE_IN_PROGRESS, MEDIUM_NOT_PRESENT,
    OPERATION_IN_PROGRESS, POWER_ON_RESET,
};
use crate::scsi::sense::{self, Interpretation, Retry, SenseKey, SenseTriple, UNSPECIFIED};

#[test]
fn test_combined_code() {
    assert_eq!(SenseTriple(0x2, 0x04, 0x01).code(), 0x02_04_01);
    assert_eq!(SenseTriple(0xf, 0xff, 0xff).code(), 0x0f_ff_ff);
    assert_eq!(SenseTriple(0, 0, 0).code(), 0);
}

#[test]
fn test_only_key_asc_ascq_offsets_matter() {
    let base = BECOMING_READY.to_fixed_sense();
    let expected = sense::interpret(&base);

    for offset in (0..base.len()).filter(|o| ![2, 12, 13].contains(o)) {
        let mut noisy = base.clone();
        noisy[offset] = 0xa5;
        assert_eq!(sense::interpret(&noisy), expected, "offset {}", offset);
    }

    // upper bits of byte 2 are flags (FILEMARK, EOM, ILI), not part of the key
    let mut flagged = base;
    flagged[2] |= 0xe0;
    assert_eq!(sense::interpret(&flagged), expected);
}

#[test]
fn test_short_buffer() {
    let fixed = MEDIUM_NOT_PRESENT.to_fixed_sense();
    assert_eq!(sense::interpret(&fixed[..13]), None);
    assert!(sense::interpret(&fixed[..14]).is_some());
    assert_eq!(SenseTriple::from_fixed_sense(&[]), None);
}

#[test]
fn test_no_sense_is_good() {
    // key 0 is success whatever ASC/ASCQ say
    let buf = SenseTriple(0x0, 0x00, 0x06).to_fixed_sense();
    let interpretation = sense::interpret(&buf).unwrap();
    assert_eq!(interpretation, Interpretation::Good);
    assert_eq!(interpretation.code(), 0);
}

#[test]
fn test_classification() {
    let classify = |triple: SenseTriple| match sense::interpret(&triple.to_fixed_sense()) {
        Some(Interpretation::Condition { retry, .. }) => retry,
        other => panic!("{:?}", other),
    };
    assert_eq!(classify(BECOMING_READY), Retry::Poll);
    assert_eq!(classify(POWER_ON_RESET), Retry::Poll);
    assert_eq!(classify(OPERATION_IN_PROGRESS), Retry::Poll);
    assert_eq!(classify(LONG_WRITE_IN_PROGRESS), Retry::Poll);
    assert_eq!(classify(SenseTriple(0x2, 0x04, 0x00)), Retry::Fatal);
    assert_eq!(classify(MEDIUM_NOT_PRESENT), Retry::Fatal);
    assert_eq!(classify(INVALID_FIELD_IN_CDB), Retry::Fatal);
}

#[test]
fn test_unknown_code_is_unspecified_and_fatal() {
    let triple = SenseTriple(0x9, 0x80, 0x01);
    assert_eq!(sense::lookup(triple.code()).map(|e| e.code), None);
    assert_eq!(
        sense::interpret(&triple.to_fixed_sense()),
        Some(Interpretation::Condition {
            triple,
            description: UNSPECIFIED,
            retry: Retry::Fatal,
        })
    );
}

#[test]
fn test_description() {
    match sense::interpret(&MEDIUM_NOT_PRESENT.to_fixed_sense()) {
        Some(Interpretation::Condition { description, .. }) => {
            assert_eq!(description, "medium not present")
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(BECOMING_READY.to_string(), "2/04/01");
}

#[test]
fn test_key_names() {
    assert_eq!(SenseKey::name(0x2), "NOT READY");
    assert_eq!(SenseKey::name(0x5), "ILLEGAL REQUEST");
    assert_eq!(SenseKey::name(0xc), "RESERVED");
}
