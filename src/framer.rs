//! The USBTMC bulk message framer.
//!
//! Both directions share one 12-byte header layout:
//!
//! | offset | field                | meaning                                  |
//! |--------|----------------------|------------------------------------------|
//! | 0      | MsgID                | 1 = OUT data, 2 = IN data request/response|
//! | 1      | bTag                 | per-session sequence counter              |
//! | 2      | bTagInverse          | bTag XOR 0xFF                             |
//! | 3      | reserved             | 0                                         |
//! | 4-7    | TransferSize         | payload length, little endian             |
//! | 8      | bmTransferAttributes | bit 0 = EOM                               |
//! | 9-11   | reserved             | 0                                         |
//!
//! Outgoing frames are zero-padded to the next 4-byte boundary; the padding
//! is not counted in TransferSize.
use crate::constants::{DEV_DEP_MSG_IN, DEV_DEP_MSG_OUT, EOM_BIT, HEADER_SIZE, TERM_CHAR};
use crate::error::Error;

/// Parsed form of the 12-byte bulk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkHeader {
    pub msg_id: u8,
    pub btag: u8,
    pub transfer_size: u32,
    pub attributes: u8,
}

impl BulkHeader {
    /// Serialize, deriving bTagInverse and zeroing the reserved bytes
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let size = self.transfer_size.to_le_bytes();
        [
            self.msg_id,
            self.btag,
            self.btag ^ 0xff,
            0x00,
            size[0],
            size[1],
            size[2],
            size[3],
            self.attributes,
            0x00,
            0x00,
            0x00,
        ]
    }

    /// Interpret the first 12 bytes of a bulk-in response.  Returns `None`
    /// when fewer than 12 bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            msg_id: bytes[0],
            btag: bytes[1],
            transfer_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            attributes: bytes[8],
        })
    }

    pub fn is_eom(&self) -> bool {
        self.attributes & EOM_BIT != 0
    }
}

/// TransferSize for an outgoing payload, `None` when it does not fit the
/// header's 32-bit field
fn out_transfer_size(payload_len: usize, needs_term: bool) -> Option<u32> {
    u32::try_from(payload_len.checked_add(usize::from(needs_term))?).ok()
}

/// Builds a complete DEV_DEP_MSG_OUT frame for one command.
///
/// The payload gets a trailing line-feed appended when it does not already
/// end with one (an empty payload becomes a lone line-feed), EOM is always
/// set, and the frame is padded to a multiple of 4 bytes.  Multi-fragment
/// sends are not supported; one frame carries the whole message, so a
/// payload exceeding the 32-bit TransferSize field is an invalid parameter.
pub fn build_out_frame(btag: u8, payload: &[u8]) -> Result<Vec<u8>, Error> {
    let needs_term = payload.last() != Some(&TERM_CHAR);
    let transfer_size =
        out_transfer_size(payload.len(), needs_term).ok_or_else(|| Error::InvalidParameter {
            message: format!("command of {} bytes exceeds protocol limit", payload.len()),
        })?;

    let header = BulkHeader {
        msg_id: DEV_DEP_MSG_OUT,
        btag,
        transfer_size,
        attributes: EOM_BIT,
    };

    let mut frame = Vec::with_capacity(HEADER_SIZE + transfer_size as usize + 3);
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(payload);
    if needs_term {
        frame.push(TERM_CHAR);
    }
    while frame.len() % 4 != 0 {
        frame.push(0x00);
    }
    Ok(frame)
}

/// Builds the DEV_DEP_MSG_IN request header asking the device for up to
/// `max_len` bytes.  EOM is not meaningful on requests and stays clear.
pub fn build_in_request(btag: u8, max_len: u32) -> [u8; HEADER_SIZE] {
    BulkHeader {
        msg_id: DEV_DEP_MSG_IN,
        btag,
        transfer_size: max_len,
        attributes: 0x00,
    }
    .encode()
}
