//! Segmenting a source PDU into a sequence of LLC-wrapped link frames.

use crate::error::{Error, Result};
use crate::frame::{CanXlFrame, SEC};
use crate::llc::{FrameKind, Llc, LLC_SIZE};

/// Upper bound on fragments per PDU: `MAX_DLEN / MIN_FRAG_SIZE` = 2048/64.
pub const MAX_FRAGMENTS: usize = 32;

/// The frames produced by [`Fragmenter::fragment`] for a single source PDU.
///
/// Either empty (the PDU was rejected — tunnel encapsulation), a single
/// verbatim-forwarded frame (PDU fit within `fragsz`), or an ordered
/// First/Consecutive*/Last sequence.
pub type FragmentedFrames = heapless::Vec<CanXlFrame, MAX_FRAGMENTS>;

/// Segments source PDUs into CiA 613-3 link frames.
///
/// `txfcnt` is scoped to the instance — never a process-global — so
/// multiple independent fragmenter pipelines in one process (or one
/// process bridging more than one direction) don't share a counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fragmenter {
    txfcnt: u16,
}

impl Fragmenter {
    /// Creates a fragmenter with `txfcnt` initialized to zero.
    pub const fn new() -> Self {
        Self { txfcnt: 0 }
    }

    /// Returns the next FCNT value that will be assigned, for diagnostics.
    pub const fn next_fcnt(&self) -> u16 {
        self.txfcnt.wrapping_add(1)
    }

    /// Segments `pdu` into link frames of at most `fragsz` payload bytes
    /// each.
    ///
    /// Three outcomes:
    /// - `pdu` already carries a valid 613-3 fragmentation LLC header
    ///   (`SEC` set and a recognized AOT) — fragmenting an already-
    ///   fragmented frame is forbidden. Returns `Ok(empty)`; the caller
    ///   should log this as a rejected tunnel-encapsulation attempt.
    /// - `pdu.len <= fragsz` — forwarded verbatim, no LLC wrapping, no
    ///   FCNT increment. (An older protocol variant instead wraps short
    ///   PDUs in a "Single Frame" PCI code; this implementation follows
    ///   the later, canonical forward-verbatim behavior.)
    /// - Otherwise, an FF / zero-or-more CF / LF sequence, each fragment
    ///   consuming one FCNT value (including the FF).
    pub fn fragment(&mut self, pdu: &CanXlFrame, fragsz: u16) -> Result<FragmentedFrames> {
        let mut out = FragmentedFrames::new();

        if pdu.has_sec() {
            if let Some(llc) = Llc::parse(pdu.payload()) {
                if llc.is_fragmentation() {
                    return Ok(out);
                }
            }
        }

        if pdu.len <= fragsz {
            out.push(*pdu).map_err(|_| Error::InvalidLength)?;
            return Ok(out);
        }

        let secn = pdu.has_sec();
        let payload = pdu.payload();
        let fragsz = fragsz as usize;

        let mut offset = 0usize;
        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let chunk_len = remaining.min(fragsz);
            let kind = if offset == 0 {
                FrameKind::First
            } else if remaining > fragsz {
                FrameKind::Consecutive
            } else {
                FrameKind::Last
            };

            self.txfcnt = self.txfcnt.wrapping_add(1);
            let llc = Llc::new(kind, secn, self.txfcnt);

            let mut frame_data = [0u8; LLC_SIZE + crate::frame::MAX_DLEN];
            llc.write(&mut frame_data[..LLC_SIZE]);
            frame_data[LLC_SIZE..LLC_SIZE + chunk_len]
                .copy_from_slice(&payload[offset..offset + chunk_len]);

            let frame = CanXlFrame::new(
                pdu.prio,
                pdu.flags | SEC,
                pdu.sdt,
                pdu.af,
                &frame_data[..LLC_SIZE + chunk_len],
            )?;
            out.push(frame).map_err(|_| Error::InvalidLength)?;

            offset += chunk_len;
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::XLF;

    fn pattern(len: usize) -> heapless::Vec<u8, 2048> {
        let mut v = heapless::Vec::new();
        for i in 0..len {
            v.push((i % 0x2C) as u8 + 1).unwrap();
        }
        v
    }

    #[test]
    fn scenario_1_round_trip_sizes() {
        // spec.md scenario 1: fragsz=128, PDU len=300.
        let data = pattern(300);
        let pdu = CanXlFrame::new(0x242, XLF, 0, 0xAFAF_AFAF, &data).unwrap();

        let mut fragmenter = Fragmenter::new();
        let frames = fragmenter.fragment(&pdu, 128).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].len as usize, 128 + LLC_SIZE);
        assert_eq!(frames[1].len as usize, 128 + LLC_SIZE);
        assert_eq!(frames[2].len as usize, 44 + LLC_SIZE);

        let fcnts: heapless::Vec<u16, 3> = frames
            .iter()
            .map(|f| Llc::parse(f.payload()).unwrap().fcnt)
            .collect();
        assert_eq!(fcnts.as_slice(), &[1, 2, 3]);

        let kinds: heapless::Vec<FrameKind, 3> = frames
            .iter()
            .map(|f| Llc::parse(f.payload()).unwrap().kind)
            .collect();
        assert_eq!(
            kinds.as_slice(),
            &[FrameKind::First, FrameKind::Consecutive, FrameKind::Last]
        );
    }

    #[test]
    fn forwards_short_pdu_unwrapped() {
        let data = pattern(64);
        let pdu = CanXlFrame::new(0x242, XLF, 0, 0, &data).unwrap();
        let mut fragmenter = Fragmenter::new();

        let frames = fragmenter.fragment(&pdu, 128).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].has_sec());
        assert_eq!(frames[0].payload(), &data[..]);
    }

    #[test]
    fn rejects_tunnel_encapsulation() {
        let mut already_fragmented = [0u8; LLC_SIZE + 4];
        Llc::new(FrameKind::First, false, 1).write(&mut already_fragmented[..LLC_SIZE]);
        let pdu = CanXlFrame::new(0x242, XLF | SEC, 0, 0, &already_fragmented).unwrap();

        let mut fragmenter = Fragmenter::new();
        let frames = fragmenter.fragment(&pdu, 128).unwrap();
        assert!(frames.is_empty());
    }

    #[test]
    fn fcnt_increments_per_emitted_fragment_with_wrap() {
        let data = pattern(2048);
        let pdu = CanXlFrame::new(0x00, XLF, 0, 0, &data).unwrap();
        let mut fragmenter = Fragmenter::new();
        fragmenter.txfcnt = 0xFFFE;

        let frames = fragmenter.fragment(&pdu, 128).unwrap();
        let fcnts: heapless::Vec<u16, MAX_FRAGMENTS> = frames
            .iter()
            .map(|f| Llc::parse(f.payload()).unwrap().fcnt)
            .collect();

        for w in fcnts.windows(2) {
            assert_eq!(w[1], w[0].wrapping_add(1));
        }
        assert_eq!(fcnts[0], 0xFFFF);
        assert_eq!(fcnts[1], 0x0000);
    }
}
