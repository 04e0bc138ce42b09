//! Blocking driver for SIMCom SIM7000 series cellular/GNSS modules.
//!
//! The module is driven over a byte-oriented serial link with AT commands.
//! Responses arrive as `<CR><LF>content<CR><LF>` frames, after an arbitrary
//! delay and interleaved with stray control bytes, so the core of this crate
//! is a small transaction engine: a line framer that assembles one response
//! line at a time out of the raw byte stream, a timeout-bounded read
//! primitive, and exact-match response checking on top of which the
//! individual command families (TCP/IP, bearer, HTTP(S), GNSS) are thin
//! call sites.
//!
//! Commands and responses are deliberately *not* paired implicitly. A
//! command is sent with [`Sim7kClient::send_command`], and the caller then
//! composes the expectation that fits the command, e.g. `OK` first and
//! `CONNECT OK` with a much longer deadline afterwards. This mirrors how the
//! module actually behaves: the number of intermediate lines depends on
//! network conditions.
//!
//! The serial transport is abstracted over [`embedded_io::Read`],
//! [`embedded_io::Write`] and [`embedded_io::ReadReady`]; power control
//! lines over [`embedded_hal::digital::OutputPin`] through the
//! [`config::ModemConfig`] trait. Everything is `no_std` and allocation
//! free.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod error;

mod bearer;
mod client;
mod framer;
mod gnss;
mod helpers;
mod http;
mod https;
mod module_timing;
mod network;
mod tcpip;

#[cfg(test)]
mod test_helpers;

pub use bearer::BearerStatus;
pub use client::Sim7kClient;
pub use error::Error;
pub use framer::RX_BUF_SIZE;
pub use gnss::GnssFix;
pub use tcpip::ConnectionState;
