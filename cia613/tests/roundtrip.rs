//! Round-trip property tests: `reassemble(fragment(pdu, fragsz)) == pdu`
//! for a spread of PDU sizes and fragment sizes. Modeled on the
//! round-trip unit-test style used elsewhere in this crate, generalized
//! from a single fixed case to a property over the input space.

use cia613::fragment::Fragmenter;
use cia613::frame::{CanXlFrame, MAX_DLEN, XLF};
use cia613::reassemble::{Outcome, Reassembler};
use proptest::prelude::*;

fn fragsz_strategy() -> impl Strategy<Value = u16> {
    (1u16..=8).prop_map(|step| step * 128)
}

fn roundtrip_once(prio: u16, sdt: u8, af: u32, data: Vec<u8>, fragsz: u16) {
    let pdu = CanXlFrame::new(prio, XLF, sdt, af, &data).unwrap();

    let mut fragmenter = Fragmenter::new();
    let frames = fragmenter.fragment(&pdu, fragsz).unwrap();

    let mut reassembler = Reassembler::new();
    let mut result = None;
    for frame in frames.iter() {
        match reassembler.process(frame).unwrap() {
            Outcome::Forward(fwd) => result = Some(fwd),
            Outcome::Complete(pdu) => result = Some(pdu),
            Outcome::Pending => {}
            other => panic!("unexpected outcome for well-formed input: {other:?}"),
        }
    }

    let reassembled = result.expect("a complete or forwarded PDU for every well-formed input");
    assert!(reassembled.content_eq(&pdu), "round-trip must reproduce the source PDU exactly");
    assert!(reassembled.len as usize <= MAX_DLEN);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fragment_then_reassemble_is_identity(
        prio in 0u16..=0x7FF,
        sdt in any::<u8>(),
        af in any::<u32>(),
        len in 1usize..=MAX_DLEN,
        fragsz in fragsz_strategy(),
    ) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        roundtrip_once(prio, sdt, af, data, fragsz);
    }

    #[test]
    fn fcnt_sequence_is_monotonic(
        len in 129usize..=MAX_DLEN,
        fragsz in fragsz_strategy(),
    ) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let pdu = CanXlFrame::new(0x242, XLF, 0, 0, &data).unwrap();

        let mut fragmenter = Fragmenter::new();
        let frames = fragmenter.fragment(&pdu, fragsz).unwrap();
        prop_assume!(frames.len() >= 2);

        use cia613::llc::Llc;
        let fcnts: Vec<u16> = frames.iter().map(|f| Llc::parse(f.payload()).unwrap().fcnt).collect();
        for w in fcnts.windows(2) {
            prop_assert_eq!(w[1], w[0].wrapping_add(1));
        }
    }
}
