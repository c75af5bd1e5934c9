//! Conformance checker walkthrough.
//!
//! Installs testdata for a Transfer ID, replays a fragmented PDU through
//! [`cia613::checker::Checker`], and prints every notification the checker
//! emits — the same sequence a real `cia613-checker` binary would write
//! back on the link.
//!
//! Run with: cargo run --example checker_walkthrough --features std

use cia613::checker::Checker;
use cia613::config::CheckerConfig;
use cia613::fragment::Fragmenter;
use cia613::frame::{CanXlFrame, TESTDATA_PRIO_BASE, XLF};

fn main() {
    println!("=== CiA 613-3 Conformance Checker Example ===\n");

    let tid = 0x07u16;
    let data: Vec<u8> = (0..300).map(|i| (i % 0x2C) as u8 + 1).collect();
    let pdu = CanXlFrame::new(tid, XLF, 0x10, 0xDEAD_BEEF, &data).expect("valid PDU");

    let mut checker = Checker::new(CheckerConfig::default());

    println!("1. Installing testdata for TID {tid:#04x}:");
    let testdata_frame =
        CanXlFrame::new(TESTDATA_PRIO_BASE | tid, pdu.flags, pdu.sdt, pdu.af, pdu.payload()).unwrap();
    for event in checker.process(&testdata_frame).unwrap().iter() {
        println!("   tid {:#04x}: {}", event.tid, event.notification.description());
    }

    println!("\n2. Replaying a fragmented transfer (fragsz=128):");
    let mut fragmenter = Fragmenter::new();
    let frames = fragmenter.fragment(&pdu, 128).unwrap();
    for frame in frames.iter() {
        for event in checker.process(frame).unwrap().iter() {
            println!(
                "   tid {:#04x}: {} (code {:#04x})",
                event.tid,
                event.notification.description(),
                event.notification.code()
            );
        }
    }

    println!("\n3. A second First Frame on an unrelated, lower-priority TID:");
    let other_tid = 0x20u16;
    let other_data: Vec<u8> = (0..300).map(|i| (i % 0x1F) as u8 + 1).collect();
    let other_pdu = CanXlFrame::new(other_tid, XLF, 0, 0, &other_data).unwrap();
    let other_testdata =
        CanXlFrame::new(TESTDATA_PRIO_BASE | other_tid, other_pdu.flags, other_pdu.sdt, other_pdu.af, other_pdu.payload())
            .unwrap();
    checker.process(&other_testdata).unwrap();
    let mut other_fragmenter = Fragmenter::new();
    let other_frames = other_fragmenter.fragment(&other_pdu, 128).unwrap();
    for event in checker.process(&other_frames[0]).unwrap().iter() {
        println!("   tid {:#04x}: {}", event.tid, event.notification.description());
    }

    let state = checker.state();
    println!("\n4. Final checker state: ubuffs={} lpcnt={}", state.ubuffs, state.lpcnt);

    println!("\n=== Conformance Checker Example Complete ===");
}
