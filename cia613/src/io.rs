//! The frame transport abstraction the engine is built against.
//!
//! The fragmenter/reassembler/checker state machines never touch a socket
//! directly; they are driven by whatever implements [`FrameIo`]. This
//! keeps the core engine testable without root privileges or a real CAN
//! interface, and keeps the door open to transports other than
//! [`crate::xlsocket::XlSocket`] (a virtual CAN bridge, a replay log).

use crate::error::Result;
use crate::frame::CanXlFrame;

/// A source and sink of CAN XL frames.
pub trait FrameIo {
    /// Blocks until one frame is available and returns it.
    fn recv_frame(&mut self) -> Result<CanXlFrame>;

    /// Writes one frame, blocking until it is fully accepted by the
    /// underlying transport.
    fn send_frame(&mut self, frame: &CanXlFrame) -> Result<()>;

    /// Returns the receive timestamp of the most recently received frame,
    /// if the transport can report one (`SIOCGSTAMP` on a real socket).
    fn timestamp(&self) -> Option<core::time::Duration> {
        None
    }
}

/// An in-memory [`FrameIo`] double for tests: a FIFO of frames to read and
/// a record of frames written.
///
/// Test binaries always link `std` (even for a crate built `no_std`), so
/// this module is free to use `std` collections unconditionally.
#[cfg(any(test, feature = "std"))]
pub mod test_support {
    extern crate std;

    use super::*;
    use crate::error::Error;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// A [`FrameIo`] backed by two in-memory queues: a pre-seeded `rx`
    /// queue read in order, and a `tx` log recording every `send_frame`
    /// call for the test to inspect afterward.
    #[derive(Debug, Default)]
    pub struct MemoryIo {
        rx: VecDeque<CanXlFrame>,
        /// Frames passed to [`FrameIo::send_frame`], in order.
        pub tx: Vec<CanXlFrame>,
    }

    impl MemoryIo {
        /// Creates an empty transport.
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues `frame` to be returned by a future `recv_frame` call.
        pub fn push_rx(&mut self, frame: CanXlFrame) {
            self.rx.push_back(frame);
        }
    }

    impl FrameIo for MemoryIo {
        fn recv_frame(&mut self) -> Result<CanXlFrame> {
            self.rx.pop_front().ok_or(Error::IoEof)
        }

        fn send_frame(&mut self, frame: &CanXlFrame) -> Result<()> {
            self.tx.push(*frame);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MemoryIo;
    use super::*;
    use crate::frame::XLF;

    #[test]
    fn memory_io_replays_queued_frames_in_order() {
        let mut io = MemoryIo::new();
        io.push_rx(CanXlFrame::new(0x01, XLF, 0, 0, &[1]).unwrap());
        io.push_rx(CanXlFrame::new(0x02, XLF, 0, 0, &[2]).unwrap());

        assert_eq!(io.recv_frame().unwrap().prio, 0x01);
        assert_eq!(io.recv_frame().unwrap().prio, 0x02);
        assert!(io.recv_frame().is_err());
    }

    #[test]
    fn memory_io_records_sent_frames() {
        let mut io = MemoryIo::new();
        let frame = CanXlFrame::new(0x03, XLF, 0, 0, &[9]).unwrap();
        io.send_frame(&frame).unwrap();
        assert_eq!(io.tx.len(), 1);
        assert!(io.tx[0].content_eq(&frame));
    }
}
