//! [`Tmc`] is the main interface for talking to USBTMC instruments.  It owns
//! the per-device sessions and composes the directory, framer and transport
//! layers.
use crate::constants::{
    CAPABILITIES_LEN, CLASS_INTERFACE_IN, CTRL_GET_CAPABILITIES, CTRL_VENDOR_A0, HEADER_SIZE,
    TERM_CHAR,
};
use crate::directory;
use crate::error::{Error, TransportError};
use crate::framer::{build_in_request, build_out_frame, BulkHeader};
use crate::session::Session;
use crate::transport::{Transport, TransportHandle};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;

pub mod builder;

pub use builder::TmcBuilder;

/// Instrument access context.
///
/// Owns the transport and a growable map from device index to session,
/// populated lazily as indices are opened.  Multiple independent instances
/// may coexist; nothing here is process-global.  Not internally locked:
/// callers using more than one thread must serialize access themselves.
///
/// Device indices are ordinals over one depth-first topology walk and are
/// invalidated by hot-plug; queries re-walk the topology every call, so a
/// newly plugged device shows up in the next count without any rescan step.
#[derive(Debug)]
pub struct Tmc<T: Transport> {
    transport: T,
    sessions: HashMap<u32, Session<T::Handle>>,
    timeout: Duration,
}

impl<T: Transport> Tmc<T> {
    /// Creates a context over the given transport.  `timeout` bounds every
    /// control and bulk transfer.
    ///
    /// For the common USB case prefer [`TmcBuilder`].
    pub fn new(transport: T, timeout: Duration) -> Self {
        trace!("Tmc::new timeout {timeout:?}");
        Tmc {
            transport,
            sessions: HashMap::new(),
            timeout,
        }
    }

    /// Counts the USBTMC devices currently present
    pub fn device_count(&self) -> Result<usize, Error> {
        directory::device_count(&self.transport)
    }

    /// Returns the identity string (`manufacturer:product:serial`) of the
    /// device at `index`, or an empty string when the index is invalid or
    /// the device cannot be queried.  Best effort by design.
    pub fn device_string(&self, index: u32) -> String {
        match directory::descriptor_at(&self.transport, index) {
            Ok(descriptor) => descriptor.identity,
            Err(e) => {
                debug!("device_string({index}) degraded to empty: {e}");
                String::new()
            }
        }
    }

    /// Resolves a device token to an index.
    ///
    /// An all-digit token is parsed directly.  Anything else is matched
    /// case-insensitively against each device's identity string truncated to
    /// the token's length, so both a full identity string and any
    /// left-anchored prefix of it (e.g. `"Rigol Technologies:DS1000"`)
    /// resolve.  The first match wins.
    pub fn find_device(&self, token: &str) -> Result<u32, Error> {
        trace!("Tmc::find_device {token:?}");
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return token.parse::<u32>().map_err(|_| Error::InvalidParameter {
                message: format!("invalid device index {token:?}"),
            });
        }

        let count = self.device_count().map_err(|e| {
            debug!("find_device enumeration failed: {e}");
            Error::DeviceNotPresent
        })?;

        for index in 0..count as u32 {
            // Abort the scan on any directory error rather than skipping
            let descriptor = directory::descriptor_at(&self.transport, index)?;
            let identity = &descriptor.identity;
            // Byte-wise: a token length landing mid-character in a multibyte
            // identity is an ordinary mismatch, not a skipped device
            if let Some(prefix) = identity.as_bytes().get(..token.len()) {
                if prefix.eq_ignore_ascii_case(token.as_bytes()) {
                    debug!("Token {token:?} resolved to device {index} ({identity:?})");
                    return Ok(index);
                }
            }
        }
        Err(Error::DeviceNotPresent)
    }

    /// Sends one command string to the device at `index`.
    ///
    /// A line-feed terminator is appended when the command does not already
    /// end with one.  The whole message goes out as a single frame with EOM
    /// set; commands larger than one transport write are not split.
    pub fn send_string(&mut self, index: u32, command: &str) -> Result<(), Error> {
        trace!("Tmc::send_string index {index} command {command:?}");
        let timeout = self.timeout;
        let session = self.ensure_open(index)?;

        let frame = build_out_frame(session.next_tag(), command.as_bytes())?;
        let endpoint = session.descriptor().bulk_out;
        let handle = open_handle(session)?;
        handle
            .bulk_write(endpoint, &frame, timeout)
            .map_err(|source| Error::BulkOutFailed { source })?;
        Ok(())
    }

    /// Receives one response fragment as a string, up to `maxlen` bytes.
    ///
    /// Returns the payload and the EOM flag.  On the final fragment one
    /// trailing line-feed is stripped when present.  Call repeatedly until
    /// EOM is true to drain a long response.
    pub fn recv_string(&mut self, index: u32, maxlen: usize) -> Result<(String, bool), Error> {
        trace!("Tmc::recv_string index {index} maxlen {maxlen}");
        let (mut payload, eom) = self.receive(index, maxlen)?;
        if eom && payload.last() == Some(&TERM_CHAR) {
            payload.pop();
        }
        Ok((String::from_utf8_lossy(&payload).into_owned(), eom))
    }

    /// Receives one response fragment as raw bytes into `buffer`.
    ///
    /// Returns the byte count and the EOM flag.  Payload content is never
    /// touched; use this for binary responses such as screenshots.
    pub fn recv_data(&mut self, index: u32, buffer: &mut [u8]) -> Result<(usize, bool), Error> {
        trace!("Tmc::recv_data index {index} buffer.len() {}", buffer.len());
        let (payload, eom) = self.receive(index, buffer.len())?;
        buffer[..payload.len()].copy_from_slice(&payload);
        Ok((payload.len(), eom))
    }

    /// Closes every open session: releases claimed interfaces, closes the
    /// handles and empties the session map.  Safe when nothing was opened.
    /// Dropping the context does the same.
    pub fn close_all(&mut self) {
        debug!("Tmc::close_all, {} session(s)", self.sessions.len());
        self.sessions.clear();
    }

    /// Last USBTMC status byte recorded for an opened index, if any
    pub fn last_status(&self, index: u32) -> Option<u8> {
        self.sessions.get(&index).map(|s| s.status())
    }

    /// Open state machine: unallocated -> allocated-closed -> allocated-open.
    ///
    /// Allocation enumerates the descriptor; failure leaves the slot
    /// unallocated.  A transport open failure keeps the allocated session so
    /// a retry skips re-enumeration.  The first successful open runs the
    /// one-time initialization.
    fn ensure_open(&mut self, index: u32) -> Result<&mut Session<T::Handle>, Error> {
        let session = match self.sessions.entry(index) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let descriptor = directory::descriptor_at(&self.transport, index)?;
                entry.insert(Session::new(descriptor))
            }
        };

        if !session.is_open() {
            let handle = self
                .transport
                .open(session.descriptor().location)
                .map_err(|source| Error::DeviceNotOpenable { source })?;
            session.attach(handle);
        }

        if !session.first_init_done() {
            first_open_init(session, self.timeout)?;
        }

        Ok(session)
    }

    /// Shared half of recv_string/recv_data: one request frame out, exactly
    /// one bulk read back.  A logical message whose declared size exceeds
    /// what that single read delivered is not reassembled; the EOM flag
    /// tells the caller whether to ask again.
    fn receive(&mut self, index: u32, maxlen: usize) -> Result<(Vec<u8>, bool), Error> {
        let request_size = u32::try_from(maxlen).map_err(|_| Error::InvalidParameter {
            message: format!("receive length {maxlen} exceeds protocol limit"),
        })?;
        if request_size == 0 {
            return Err(Error::InvalidParameter {
                message: "receive length must be non-zero".to_string(),
            });
        }

        let timeout = self.timeout;
        let session = self.ensure_open(index)?;

        let request = build_in_request(session.next_tag(), request_size);
        let bulk_out = session.descriptor().bulk_out;
        let bulk_in = session.descriptor().bulk_in;
        let handle = open_handle(session)?;

        handle
            .bulk_write(bulk_out, &request, timeout)
            .map_err(|source| Error::BulkOutFailed { source })?;

        let mut buffer = vec![0u8; maxlen + HEADER_SIZE + 4];
        let n = handle
            .bulk_read(bulk_in, &mut buffer, timeout)
            .map_err(|source| Error::BulkInFailed { source })?;

        let header = BulkHeader::parse(&buffer[..n]).ok_or_else(|| Error::BulkInFailed {
            source: TransportError::other(format!("response of {n} bytes is shorter than header")),
        })?;

        let declared = header.transfer_size as usize;
        let available = n - HEADER_SIZE;
        if declared > available {
            // Single-read receive: the remainder of this fragment is lost
            warn!(
                "Device declared {declared} bytes but one read delivered {available}, truncating"
            );
        }
        let take = declared.min(available).min(maxlen);
        trace!("Received {take} bytes, eom {}", header.is_eom());
        Ok((buffer[HEADER_SIZE..HEADER_SIZE + take].to_vec(), header.is_eom()))
    }
}

fn open_handle<H: TransportHandle>(session: &Session<H>) -> Result<&H, Error> {
    session.handle().ok_or(Error::DeviceNotPresent)
}

/// One-time initialization on the first successful open of a session:
/// claim the interface, set the configuration, then issue two class/vendor
/// control reads whose failure is deliberately ignored.  No clear sequence
/// is sent; some otherwise compliant devices (e.g. Rigol DS2000) do not
/// implement INITIATE_CLEAR despite the class mandating it.
fn first_open_init<H: TransportHandle>(
    session: &mut Session<H>,
    timeout: Duration,
) -> Result<(), Error> {
    let interface = session.descriptor().interface_number;
    let config = session.descriptor().config_value;
    trace!("first_open_init interface {interface} config {config}");

    let mut status = None;
    {
        let handle = match session.handle_mut() {
            Some(handle) => handle,
            None => {
                return Err(Error::FirstOpenInitFailed {
                    source: TransportError::other("session has no open handle"),
                })
            }
        };

        handle
            .claim_interface(interface)
            .map_err(|source| Error::FirstOpenInitFailed { source })?;
        handle
            .set_configuration(config)
            .map_err(|source| Error::FirstOpenInitFailed { source })?;

        let mut capabilities = [0u8; CAPABILITIES_LEN];
        match handle.control_in(
            CLASS_INTERFACE_IN,
            CTRL_GET_CAPABILITIES,
            0,
            u16::from(interface),
            &mut capabilities,
            timeout,
        ) {
            Ok(n) if n > 0 => status = Some(capabilities[0]),
            Ok(_) => {}
            Err(e) => debug!("GET_CAPABILITIES ignored failure: {e}"),
        }

        let mut vendor = [0u8; 1];
        if let Err(e) = handle.control_in(
            CLASS_INTERFACE_IN,
            CTRL_VENDOR_A0,
            1,
            u16::from(interface),
            &mut vendor,
            timeout,
        ) {
            debug!("Vendor request 0xa0 ignored failure: {e}");
        }
    }

    if let Some(status) = status {
        session.set_status(status);
    }
    session.mark_first_init_done();
    Ok(())
}
