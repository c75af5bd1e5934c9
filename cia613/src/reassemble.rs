//! The standalone, single-TID reassembly state machine used by the plain
//! `cia613-reassembler` binary (bound to one Transfer ID via a socket
//! filter, with no conformance checking and no notifications).
//!
//! For the multi-TID, notification-emitting variant used by the
//! conformance checker, see [`crate::checker`].

use crate::error::{Error, Result};
use crate::frame::{CanXlFrame, MAX_DLEN, MIN_DLEN, SEC};
use crate::llc::{FrameKind, Llc, LLC_SIZE};

/// Fragment payload size bounds shared by fragmenter and reassembler.
pub const MIN_FRAG_SIZE: u16 = 64;
pub const MAX_FRAG_SIZE: u16 = 1024;
pub const FRAG_STEP_SIZE: u16 = 128;
/// Last Frame may carry less than [`MIN_FRAG_SIZE`] (the remainder of the
/// PDU), but never zero.
pub const LF_MIN_FRAG_SIZE: u16 = 1;

/// Why a frame was dropped during reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A Consecutive/Last Frame's FCNT did not equal the expected
    /// `previous + 1`.
    FcntMismatch,
    /// Fragment size outside `MIN_FRAG_SIZE..=MAX_FRAG_SIZE` (First/
    /// Consecutive Frame) or zero (Last Frame).
    IllegalFragmentSize,
    /// Fragment size not a multiple of [`FRAG_STEP_SIZE`] (First/
    /// Consecutive Frame only; the Last Frame has no step requirement).
    IllegalStepSize,
    /// Accepting this fragment would grow the reassembled PDU past
    /// [`MAX_DLEN`].
    SizeOverflow,
    /// The FF/LF reserved bit combination was set.
    ReservedFrameType,
}

/// The result of feeding one frame to [`Reassembler::process`].
#[derive(Debug)]
pub enum Outcome {
    /// Not a CiA 613-3 fragment (no `SEC`, too short for an LLC header, or
    /// a different Add-On Type) — forward verbatim.
    Forward(CanXlFrame),
    /// First or Consecutive Frame accepted; reassembly continues.
    Pending,
    /// Last Frame accepted; the reassembled PDU is ready to forward.
    Complete(CanXlFrame),
    /// The frame was rejected and any in-progress transfer on this TID was
    /// left untouched (or was itself dropped, for a superseding First
    /// Frame) — see the reason for which.
    Dropped(DropReason),
}

/// Reassembles fragments belonging to a single Transfer ID.
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Option<CanXlFrame>,
    dataptr: usize,
    fcnt: Option<u16>,
}

impl Reassembler {
    /// Creates an idle reassembler.
    pub const fn new() -> Self {
        Self {
            buffer: None,
            dataptr: 0,
            fcnt: None,
        }
    }

    /// Returns true if a transfer is currently being assembled.
    pub const fn is_assembling(&self) -> bool {
        self.buffer.is_some()
    }

    /// Feeds one received frame through the state machine.
    pub fn process(&mut self, frame: &CanXlFrame) -> Result<Outcome> {
        if !is_fragment(frame) {
            return Ok(Outcome::Forward(*frame));
        }

        let llc = Llc::parse(frame.payload()).expect("is_fragment checked length");
        let rxfcnt = llc.fcnt;
        let rxfragsz = frame.payload().len() - LLC_SIZE;

        match llc.kind {
            FrameKind::First => self.accept_first(frame, rxfcnt, rxfragsz),
            FrameKind::Consecutive => self.accept_consecutive(frame, rxfcnt, rxfragsz),
            FrameKind::Last => self.accept_last(frame, rxfcnt, rxfragsz),
            FrameKind::Reserved => Ok(Outcome::Dropped(DropReason::ReservedFrameType)),
        }
    }

    fn accept_first(&mut self, frame: &CanXlFrame, rxfcnt: u16, rxfragsz: usize) -> Result<Outcome> {
        if rxfragsz < MIN_FRAG_SIZE as usize || rxfragsz > MAX_FRAG_SIZE as usize {
            return Ok(Outcome::Dropped(DropReason::IllegalFragmentSize));
        }
        if rxfragsz % FRAG_STEP_SIZE as usize != 0 {
            return Ok(Outcome::Dropped(DropReason::IllegalStepSize));
        }

        self.fcnt = Some(rxfcnt);

        let llc = Llc::parse(frame.payload()).expect("checked above");
        let mut flags = frame.flags & !SEC;
        if llc.secn {
            flags |= SEC;
        }

        let buffer = CanXlFrame::new(frame.prio, flags, frame.sdt, frame.af, &frame.payload()[LLC_SIZE..])?;
        self.dataptr = buffer.len as usize;
        self.buffer = Some(buffer);

        Ok(Outcome::Pending)
    }

    fn accept_consecutive(&mut self, frame: &CanXlFrame, rxfcnt: u16, rxfragsz: usize) -> Result<Outcome> {
        let expected = match self.fcnt {
            Some(fcnt) => fcnt.wrapping_add(1),
            None => {
                // No ongoing transfer: nothing to append to. Treat like an
                // FCNT mismatch rather than panicking on a missing buffer.
                return Ok(Outcome::Dropped(DropReason::FcntMismatch));
            }
        };
        if expected != rxfcnt {
            return Ok(Outcome::Dropped(DropReason::FcntMismatch));
        }
        self.fcnt = Some(rxfcnt);

        if rxfragsz < MIN_FRAG_SIZE as usize || rxfragsz > MAX_FRAG_SIZE as usize {
            return Ok(Outcome::Dropped(DropReason::IllegalFragmentSize));
        }
        if rxfragsz % FRAG_STEP_SIZE as usize != 0 {
            return Ok(Outcome::Dropped(DropReason::IllegalStepSize));
        }
        if self.dataptr + rxfragsz > MAX_DLEN {
            return Ok(Outcome::Dropped(DropReason::SizeOverflow));
        }

        self.append(frame, rxfragsz)?;
        Ok(Outcome::Pending)
    }

    fn accept_last(&mut self, frame: &CanXlFrame, rxfcnt: u16, rxfragsz: usize) -> Result<Outcome> {
        let expected = match self.fcnt {
            Some(fcnt) => fcnt.wrapping_add(1),
            None => return Ok(Outcome::Dropped(DropReason::FcntMismatch)),
        };
        if expected != rxfcnt {
            return Ok(Outcome::Dropped(DropReason::FcntMismatch));
        }
        self.fcnt = Some(rxfcnt);

        if rxfragsz < LF_MIN_FRAG_SIZE as usize || rxfragsz > MAX_FRAG_SIZE as usize {
            return Ok(Outcome::Dropped(DropReason::IllegalFragmentSize));
        }
        if self.dataptr + rxfragsz > MAX_DLEN {
            return Ok(Outcome::Dropped(DropReason::SizeOverflow));
        }

        self.append(frame, rxfragsz)?;
        let complete = self.buffer.take().expect("accept_first always sets buffer first");
        self.dataptr = 0;
        self.fcnt = None;
        Ok(Outcome::Complete(complete))
    }

    fn append(&mut self, frame: &CanXlFrame, rxfragsz: usize) -> Result<()> {
        let buffer = self.buffer.as_mut().ok_or(Error::MalformedFrame)?;
        let payload = &frame.payload()[LLC_SIZE..LLC_SIZE + rxfragsz];
        buffer.data[self.dataptr..self.dataptr + rxfragsz].copy_from_slice(payload);
        buffer.len += rxfragsz as u16;
        self.dataptr += rxfragsz;
        Ok(())
    }
}

/// Returns true if `frame` carries a CiA 613-3 fragmentation LLC header:
/// `SEC` set, long enough to hold one, and the Add-On Type matches.
pub fn is_fragment(frame: &CanXlFrame) -> bool {
    if !frame.has_sec() || frame.payload().len() < MIN_DLEN + LLC_SIZE {
        return false;
    }
    matches!(Llc::parse(frame.payload()), Some(llc) if llc.is_fragmentation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Fragmenter;
    use crate::frame::XLF;

    fn pattern(len: usize) -> heapless::Vec<u8, MAX_DLEN> {
        let mut v = heapless::Vec::new();
        for i in 0..len {
            v.push((i % 250) as u8 + 1).unwrap();
        }
        v
    }

    #[test]
    fn round_trips_a_fragmented_pdu() {
        let data = pattern(300);
        let pdu = CanXlFrame::new(0x242, XLF, 0x7, 0xAAAA_BBBB, &data).unwrap();

        let mut fragmenter = Fragmenter::new();
        let frames = fragmenter.fragment(&pdu, 128).unwrap();

        let mut reassembler = Reassembler::new();
        let mut result = None;
        for frame in frames.iter() {
            match reassembler.process(frame).unwrap() {
                Outcome::Complete(pdu) => result = Some(pdu),
                Outcome::Pending => {}
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        let reassembled = result.expect("reassembly should complete");
        assert!(reassembled.content_eq(&pdu));
    }

    #[test]
    fn forwards_non_fragment_frames() {
        let frame = CanXlFrame::new(0x242, XLF, 0, 0, &[1, 2, 3]).unwrap();
        let mut reassembler = Reassembler::new();
        match reassembler.process(&frame).unwrap() {
            Outcome::Forward(fwd) => assert!(fwd.content_eq(&frame)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn drops_consecutive_frame_with_wrong_fcnt() {
        let data = pattern(300);
        let pdu = CanXlFrame::new(0x242, XLF, 0, 0, &data).unwrap();
        let mut fragmenter = Fragmenter::new();
        let mut frames = fragmenter.fragment(&pdu, 128).unwrap();

        // Corrupt the second frame's FCNT.
        let mut llc = Llc::parse(frames[1].payload()).unwrap();
        llc.fcnt = llc.fcnt.wrapping_add(5);
        let mut corrupt = [0u8; LLC_SIZE + 128];
        llc.write(&mut corrupt[..LLC_SIZE]);
        corrupt[LLC_SIZE..].copy_from_slice(&frames[1].payload()[LLC_SIZE..]);
        frames[1] = CanXlFrame::new(
            frames[1].prio,
            frames[1].flags,
            frames[1].sdt,
            frames[1].af,
            &corrupt,
        )
        .unwrap();

        let mut reassembler = Reassembler::new();
        matches!(reassembler.process(&frames[0]).unwrap(), Outcome::Pending);
        match reassembler.process(&frames[1]).unwrap() {
            Outcome::Dropped(DropReason::FcntMismatch) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn rejects_undersized_first_frame() {
        let llc = Llc::new(FrameKind::First, false, 1);
        let mut data = [0u8; LLC_SIZE + 10];
        llc.write(&mut data[..LLC_SIZE]);
        let frame = CanXlFrame::new(0x242, XLF | SEC, 0, 0, &data).unwrap();

        let mut reassembler = Reassembler::new();
        match reassembler.process(&frame).unwrap() {
            Outcome::Dropped(DropReason::IllegalFragmentSize) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
