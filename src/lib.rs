//! # usbtmc
//!
//! This crate talks to USB Test & Measurement Class (USBTMC) instruments:
//! oscilloscopes, function generators, spectrum analyzers, multimeters and
//! anything else exposing the class 0xFE/0x03 interface.  It enumerates
//! attached instruments, resolves one by index or by a human-readable
//! identity string, and exchanges text or binary messages with it.
//!
//! ## Overview
//!
//! The crate is structured around a few small layers:
//!
//! - [`Tmc`] - the instrument access context most users should interact
//!   with.  It owns the per-device sessions, runs the open state machine and
//!   exposes the send/receive operations.
//! - [`directory`] - the device directory, which walks the USB topology on
//!   every query and builds a [`directory::DeviceDescriptor`] for each
//!   matched USBTMC interface.
//! - [`framer`] - the bulk message framer: the 12-byte USBTMC header,
//!   sequence tagging, end-of-message handling and 4-byte padding.
//! - [`transport`] - the boundary to the USB host library.  [`UsbTransport`]
//!   implements it over rusb; tests drive the whole stack through a mock.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use usbtmc::TmcBuilder;
//!
//! fn main() -> Result<(), usbtmc::Error> {
//!     let mut tmc = TmcBuilder::new().build()?;
//!
//!     println!("{} instrument(s) present", tmc.device_count()?);
//!
//!     // Address an instrument by identity-string prefix
//!     let index = tmc.find_device("Rigol Technologies")?;
//!
//!     tmc.send_string(index, "*IDN?")?;
//!     let (response, _eom) = tmc.recv_string(index, 8192)?;
//!     println!("{response}");
//!     Ok(())
//! }
//! ```
//!
//! ## Device addressing
//!
//! Each directory query assigns ordinal indices over one depth-first walk of
//! the topology (bus, device, configuration, interface, alt-setting),
//! counting only USBTMC interfaces.  Indices are therefore only stable while
//! the topology is: plugging or unplugging a device renumbers everything.
//! Identity strings (`manufacturer:product:serial`, fields trimmed, empty
//! fields kept) make for more robust addressing - [`Tmc::find_device`]
//! accepts any left-anchored, case-insensitive prefix of one.
//!
//! ## Protocol notes and limitations
//!
//! - Outgoing commands go out as a single DEV_DEP_MSG_OUT frame with EOM
//!   set; a line-feed terminator is appended when missing.  Multi-fragment
//!   sends are not supported.
//! - Each receive issues one request and performs exactly one bulk read.  A
//!   response fragment larger than what one read delivers is truncated to
//!   what arrived; responses spanning several fragments are drained by
//!   calling receive until EOM.
//! - All I/O is synchronous and blocking, bounded by a single per-transfer
//!   timeout (1 s by default).  There is no internal locking; serialize
//!   access yourself if you share a context across threads.
//! - No clear/abort sequence is sent at open time, because some otherwise
//!   compliant instruments do not implement it.
//!
//! ## Errors
//!
//! All operations return [`Error`], a small taxonomy (device not openable /
//! not present, first-open initialization failed, bulk-in/out failed,
//! invalid parameter).  [`Error::code`] gives the numeric codes the bundled
//! `usbtmc` command line tool prints, [`Error::to_errno`] the closest errno.
//! Transfers are never retried internally; a timeout is reported as the
//! same bulk failure as any other transport error.
//!
//! ## Logging
//!
//! The crate logs through the `log` facade: `trace!` for protocol-level
//! detail, `debug!` for state changes, `warn!` for suspicious device
//! behavior.  The command line tool wires this to `env_logger`, so
//! `RUST_LOG=usbtmc=debug` shows what is happening on the wire.

pub mod constants;
pub mod directory;
pub mod error;
pub mod framer;
pub mod session;
pub mod tmc;
pub mod transport;

pub use crate::directory::DeviceDescriptor;
pub use crate::error::{Error, TransportError};
pub use crate::tmc::{Tmc, TmcBuilder};
pub use crate::transport::{Transport, TransportHandle, UsbTransport};

/// A [`Tmc`] context over the real USB transport
pub type UsbTmc = Tmc<UsbTransport>;
