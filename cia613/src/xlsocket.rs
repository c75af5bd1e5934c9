//! A raw `AF_CAN`/`SOCK_RAW` [`FrameIo`] backend for CAN XL, wired with the
//! exact socket options the reference C tools use:
//! `CAN_RAW_XL_FRAMES`, `CAN_RAW_FILTER`, and `SIOCGSTAMP` for
//! verbose-mode timestamps.
//!
//! `std`-only; requires the `socketcan` feature, and a Linux kernel with
//! CAN XL support (6.something+) for the socket options to exist at all.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::frame::{CanXlFrame, HDR_SIZE, MAX_DLEN};
use crate::io::FrameIo;

const AF_CAN: libc::c_int = 29;
const PF_CAN: libc::c_int = AF_CAN;
const CAN_RAW: libc::c_int = 1;
const SOL_CAN_BASE: libc::c_int = 100;
const SOL_CAN_RAW: libc::c_int = SOL_CAN_BASE + CAN_RAW;
const CAN_RAW_FILTER: libc::c_int = 1;
const CAN_RAW_XL_FRAMES: libc::c_int = 7;
const CAN_RAW_XL_VCID_OPTS: libc::c_int = 8;
const CAN_RAW_XL_VCID_TX_SET: u32 = 1 << 0;
const CAN_EFF_FLAG: u32 = 0x8000_0000;
const CAN_RTR_FLAG: u32 = 0x4000_0000;
const CANXL_PRIO_MASK: u32 = 0x7FF;

/// Mirrors the kernel's `struct can_raw_vcid_options` layout closely
/// enough for the one field this tool sets (`tx_vcid`); reserved fields
/// are zeroed.
#[repr(C)]
struct CanRawVcidOptions {
    flags: u32,
    tx_vcid: u8,
    tx_vcid_mask: u8,
    rx_vcid: u8,
    rx_vcid_mask: u8,
}

/// A CAN identifier / priority filter: `(id & mask) == (can_id & mask)`
/// admits a frame, matching the kernel's `can_filter` semantics.
#[derive(Debug, Clone, Copy)]
pub struct Filter {
    pub can_id: u32,
    pub can_mask: u32,
}

#[repr(C)]
struct CanFilter {
    can_id: u32,
    can_mask: u32,
}

#[repr(C)]
struct SockaddrCan {
    can_family: libc::sa_family_t,
    can_ifindex: libc::c_int,
    can_addr: [u8; 16],
}

/// A bound raw CAN XL socket.
pub struct XlSocket {
    fd: RawFd,
}

impl XlSocket {
    /// Opens a raw CAN socket on interface `ifname`, enables CAN XL
    /// frames, and binds it. No filter is installed; use
    /// [`XlSocket::set_filter`] before the first receive if one is
    /// needed.
    pub fn open(ifname: &str) -> Result<Self> {
        let fd = unsafe { libc::socket(PF_CAN, libc::SOCK_RAW, CAN_RAW) };
        if fd < 0 {
            return Err(Error::IoRead);
        }
        let socket = Self { fd };

        let enable: libc::c_int = 1;
        socket.setsockopt(CAN_RAW_XL_FRAMES, &enable)?;

        let ifindex = socket.if_nametoindex(ifname)?;
        let addr = SockaddrCan {
            can_family: AF_CAN as libc::sa_family_t,
            can_ifindex: ifindex,
            can_addr: [0u8; 16],
        };
        let ret = unsafe {
            libc::bind(
                socket.fd,
                &addr as *const SockaddrCan as *const libc::sockaddr,
                mem::size_of::<SockaddrCan>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(Error::IoRead);
        }

        Ok(socket)
    }

    /// Installs a single-entry acceptance filter, matching the reference
    /// tools' single `struct can_filter` setsockopt call.
    pub fn set_filter(&self, filter: Filter) -> Result<()> {
        let raw = CanFilter {
            can_id: filter.can_id,
            can_mask: filter.can_mask,
        };
        self.setsockopt(CAN_RAW_FILTER, &raw)
    }

    /// Builds the checker's filter: admit `prio` in `0x000..=0x03F` (plain
    /// transport) and `0x400..=0x43F` (testdata installation), rejecting
    /// extended/RTR classic CAN frames by masking them out.
    pub fn checker_filter() -> Filter {
        Filter {
            can_id: 0,
            can_mask: (CAN_EFF_FLAG | CAN_RTR_FLAG | CANXL_PRIO_MASK)
                - crate::frame::TESTDATA_PRIO_BASE as u32
                - crate::frame::TID_MASK as u32,
        }
    }

    /// Builds the plain reassembler/fragmenter's filter: admit exactly
    /// `transfer_id`.
    pub fn transfer_id_filter(transfer_id: u16) -> Filter {
        Filter {
            can_id: transfer_id as u32,
            can_mask: CAN_EFF_FLAG | CAN_RTR_FLAG | 0x7FF,
        }
    }

    /// Sets the transmit virtual CAN network ID on this (destination)
    /// socket, matching the reference fragmenter's `-V` option.
    pub fn set_tx_vcid(&self, vcid: u8) -> Result<()> {
        let opts = CanRawVcidOptions {
            flags: CAN_RAW_XL_VCID_TX_SET,
            tx_vcid: vcid,
            tx_vcid_mask: 0,
            rx_vcid: 0,
            rx_vcid_mask: 0,
        };
        self.setsockopt(CAN_RAW_XL_VCID_OPTS, &opts)
    }

    fn setsockopt<T>(&self, name: libc::c_int, value: &T) -> Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_CAN_RAW,
                name,
                value as *const T as *const libc::c_void,
                mem::size_of::<T>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            Err(Error::IoRead)
        } else {
            Ok(())
        }
    }

    fn if_nametoindex(&self, ifname: &str) -> Result<libc::c_int> {
        let cname = CString::new(ifname).map_err(|_| Error::IoRead)?;
        let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
        if idx == 0 {
            Err(Error::IoRead)
        } else {
            Ok(idx as libc::c_int)
        }
    }
}

impl FrameIo for XlSocket {
    fn recv_frame(&mut self) -> Result<CanXlFrame> {
        let mut buf = [0u8; HDR_SIZE + MAX_DLEN];
        let n = unsafe {
            libc::read(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(Error::IoRead);
        }
        CanXlFrame::deserialize(&buf[..n as usize])
    }

    fn send_frame(&mut self, frame: &CanXlFrame) -> Result<()> {
        let mut buf = [0u8; HDR_SIZE + MAX_DLEN];
        let total = frame.serialize(&mut buf)?;
        let n = unsafe {
            libc::write(self.fd, buf.as_ptr() as *const libc::c_void, total)
        };
        if n < 0 || n as usize != total {
            return Err(Error::IoShortWrite);
        }
        Ok(())
    }

    fn timestamp(&self) -> Option<Duration> {
        let mut tv = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        let ret = unsafe { libc::ioctl(self.fd, libc::SIOCGSTAMP as _, &mut tv as *mut libc::timeval) };
        if ret < 0 {
            return None;
        }
        Some(Duration::new(tv.tv_sec as u64, tv.tv_usec as u32 * 1000))
    }
}

impl Drop for XlSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Converts the last OS error into a log-friendly string, for the CLI
/// layer to attach to an `anyhow` context.
pub fn last_os_error() -> io::Error {
    io::Error::last_os_error()
}
