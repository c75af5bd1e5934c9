//! Checker notification codes and the frame that carries them.
//!
//! Every state transition in [`crate::checker::Checker`] emits one of these
//! as a 3-byte CAN XL frame on `DEBUG_PRIO_BASE | tid`, mirroring
//! `sendstate()` in the reference checker.

use crate::error::Result;
use crate::frame::{CanXlFrame, DEBUG_PRIO_BASE, XLF};

/// A checker notification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Notification {
    /// Testdata installed for this TID.
    TestdataStored,
    /// No testdata available for transport traffic on this TID.
    NoTestdataAvailable,
    /// An unfragmented PDU matched its testdata.
    UnfragmentedPduCorrect,
    /// An unfragmented PDU did not match its testdata.
    UnfragmentedPduIncorrect,
    /// LLC header names an unsupported protocol version.
    WrongVersion,
    /// First Frame advertises a fragment size outside `MIN..=MAX_FRAG_SIZE`.
    FirstFrameIllegalSize,
    /// First Frame advertises a fragment size not aligned to the step size.
    FirstFrameIllegalStepSize,
    /// First Frame accepted; buffer allocated.
    FirstFrameAccepted,
    /// Consecutive Frame advertises a fragment size outside bounds.
    ConsecutiveFrameIllegalSize,
    /// Consecutive Frame advertises a fragment size not step-aligned.
    ConsecutiveFrameIllegalStepSize,
    /// Last Frame advertises a fragment size outside bounds.
    LastFrameIllegalSize,
    /// Reassembled PDU matched its testdata.
    ReassembledPduCorrect,
    /// Reassembled PDU did not match its testdata.
    ReassembledPduIncorrect,
    /// FF/LF reserved combination received.
    ReservedFrameType,
    /// First Frame received while a transfer on this TID was still open.
    FirstFrameWhileOngoing,
    /// FCNT did not increase by exactly one.
    FcntMismatch,
    /// First Frame for a TID with no buffer currently assigned.
    FirstFrameNewTransfer,
    /// Buffer preempted from a lower-priority TID to admit this First Frame.
    BufferGrabbed,
    /// First Frame dropped: buffer table full and this TID is not higher
    /// priority than every assembling TID.
    BufferFullLowPriority,
    /// A high-priority TID's low-priority-starvation counter reached the
    /// configured threshold; its buffer was evicted.
    LowPriorityCounterExceeded,
    /// An unfragmented PDU arrived for a TID with an ongoing fragmented
    /// transfer.
    UnfragmentedDuringOngoing,
    /// Consecutive/Last Frame would overflow the maximum PDU size.
    SizeOverflow,
}

impl Notification {
    /// The wire notification number, matching the reference checker's `nn`.
    pub const fn code(self) -> u8 {
        match self {
            Notification::TestdataStored => 0x01,
            Notification::NoTestdataAvailable => 0x02,
            Notification::UnfragmentedPduCorrect => 0x03,
            Notification::UnfragmentedPduIncorrect => 0x04,
            Notification::WrongVersion => 0x05,
            Notification::FirstFrameIllegalSize => 0x06,
            Notification::FirstFrameIllegalStepSize => 0x07,
            Notification::FirstFrameAccepted => 0x08,
            Notification::ConsecutiveFrameIllegalSize => 0x09,
            Notification::ConsecutiveFrameIllegalStepSize => 0x0A,
            Notification::LastFrameIllegalSize => 0x0B,
            Notification::ReassembledPduCorrect => 0x0C,
            Notification::ReassembledPduIncorrect => 0x0D,
            Notification::ReservedFrameType => 0xE1,
            Notification::FirstFrameWhileOngoing => 0xE2,
            Notification::FcntMismatch => 0xE3,
            Notification::FirstFrameNewTransfer => 0xE4,
            Notification::BufferGrabbed => 0xE5,
            Notification::BufferFullLowPriority => 0xE6,
            Notification::LowPriorityCounterExceeded => 0xE7,
            Notification::UnfragmentedDuringOngoing => 0xE8,
            Notification::SizeOverflow => 0xE9,
        }
    }

    /// A short human-readable description, matching the log line the
    /// reference checker prints alongside each `sendstate()` call.
    pub const fn description(self) -> &'static str {
        match self {
            Notification::TestdataStored => "stored PDU test data",
            Notification::NoTestdataAvailable => "no stored PDU test data available",
            Notification::UnfragmentedPduCorrect => "received correct unfragmented PDU",
            Notification::UnfragmentedPduIncorrect => "received incorrect unfragmented PDU",
            Notification::WrongVersion => "dropped frame due to wrong CiA 613-3 version",
            Notification::FirstFrameIllegalSize => "FF: dropped LLC frame illegal fragment size",
            Notification::FirstFrameIllegalStepSize => {
                "FF: dropped LLC frame illegal fragment step size"
            }
            Notification::FirstFrameAccepted => "FF: correctly received first fragment",
            Notification::ConsecutiveFrameIllegalSize => {
                "CF: dropped LLC frame illegal fragment size"
            }
            Notification::ConsecutiveFrameIllegalStepSize => {
                "CF: dropped LLC frame illegal fragment step size"
            }
            Notification::LastFrameIllegalSize => "LF: dropped LLC frame illegal fragment size",
            Notification::ReassembledPduCorrect => "received correct PDU",
            Notification::ReassembledPduIncorrect => "received incorrect PDU",
            Notification::ReservedFrameType => {
                "FF/LF: dropped LLC frame with reserved FF/LF bits set"
            }
            Notification::FirstFrameWhileOngoing => "FF: ongoing transfer not finished",
            Notification::FcntMismatch => "abort reception wrong FCNT",
            Notification::FirstFrameNewTransfer => {
                "FF: new TID with currently no assigned buffer"
            }
            Notification::BufferGrabbed => "FF: grabbed buffer from TID",
            Notification::BufferFullLowPriority => "FF: dropped LLC frame (buffer full/low prio)",
            Notification::LowPriorityCounterExceeded => {
                "dropped high prio TID (lowPrioCnt reaches M)"
            }
            Notification::UnfragmentedDuringOngoing => {
                "unfragmented PDU within ongoing transfer"
            }
            Notification::SizeOverflow => "dropped frame size overflow",
        }
    }
}

/// The state snapshot attached to every notification frame: current count
/// of occupied buffers and the low-priority starvation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckerState {
    /// Number of buffers currently assembling a PDU.
    pub ubuffs: u8,
    /// Consecutive high-priority admissions since the counter last reset.
    pub lpcnt: u8,
}

/// Builds the 3-byte notification frame for `tid`, matching `sendstate()`.
pub fn notification_frame(tid: u16, notification: Notification, state: CheckerState) -> Result<CanXlFrame> {
    let data = [notification.code(), state.ubuffs, state.lpcnt];
    CanXlFrame::new(DEBUG_PRIO_BASE | (tid & crate::frame::TID_MASK), XLF, 0, 0, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_carries_code_and_state() {
        let state = CheckerState { ubuffs: 2, lpcnt: 1 };
        let frame = notification_frame(0x07, Notification::FirstFrameAccepted, state).unwrap();
        assert_eq!(frame.prio, DEBUG_PRIO_BASE | 0x07);
        assert_eq!(frame.payload(), &[0x08, 2, 1]);
    }

    #[test]
    fn every_code_matches_reference_numbering() {
        assert_eq!(Notification::TestdataStored.code(), 0x01);
        assert_eq!(Notification::ReassembledPduIncorrect.code(), 0x0D);
        assert_eq!(Notification::ReservedFrameType.code(), 0xE1);
        assert_eq!(Notification::SizeOverflow.code(), 0xE9);
    }
}
