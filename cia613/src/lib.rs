#![cfg_attr(not(feature = "std"), no_std)]
//! CiA 613-3 Transport Protocol over CAN XL.
//!
//! This crate implements the link-layer fragmentation/reassembly/
//! conformance-checking engine described by the CiA 613-3 Add-On Type for
//! CAN XL: segmenting an oversized source PDU into a numbered sequence of
//! link frames, reassembling such a sequence back into the original PDU,
//! and validating a peer's segmentation behavior against the specified
//! buffer and discard policies.
//!
//! The engine itself never touches a socket: frame transport is abstracted
//! behind [`io::FrameIo`]. A raw SocketCAN XL backend is available under
//! the `socketcan` feature for the three CLI tools built on top of this
//! crate (`cia613-fragmenter`, `cia613-reassembler`, `cia613-checker`).

pub mod checker;
pub mod config;
pub mod fragment;
pub mod frame;
pub mod io;
pub mod llc;
pub mod notify;
pub mod reassemble;
pub mod tid;

mod error;

#[cfg(feature = "socketcan")]
pub mod xlsocket;

pub use error::{Error, Result};
pub use frame::CanXlFrame;
