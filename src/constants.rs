//! Constants used in the USBTMC implementation
use rusb::constants::{
    LIBUSB_ENDPOINT_IN, LIBUSB_RECIPIENT_INTERFACE, LIBUSB_REQUEST_TYPE_CLASS,
};
use std::time::Duration;

// USBTMC interface identification

/// bInterfaceClass for application-specific interfaces
pub const USBTMC_CLASS: u8 = 0xfe;
/// bInterfaceSubClass for USBTMC
pub const USBTMC_SUBCLASS: u8 = 0x03;
/// bInterfaceProtocol for plain USBTMC
pub const USBTMC_PROTOCOL: u8 = 0x00;
/// bInterfaceProtocol for the USB488 variant of USBTMC
pub const USB488_PROTOCOL: u8 = 0x01;

// Bulk message IDs (MsgID byte of the bulk header)

/// Host to device data message
pub const DEV_DEP_MSG_OUT: u8 = 0x01;
/// Request for a device to host data message, and the MsgID of its response
pub const DEV_DEP_MSG_IN: u8 = 0x02;

/// Size of the bulk transfer header, identical in both directions
pub const HEADER_SIZE: usize = 12;

/// bmTransferAttributes bit marking the final fragment of a message
pub const EOM_BIT: u8 = 0x01;

/// Message terminator appended to outgoing commands when absent
pub const TERM_CHAR: u8 = 0x0a;

// Class-specific control requests, issued during first-open initialization

/// GET_CAPABILITIES class request
pub const CTRL_GET_CAPABILITIES: u8 = 7;
/// Length of the GET_CAPABILITIES response
pub const CAPABILITIES_LEN: usize = 0x18;
/// Vendor request observed on common instruments, purpose undocumented
pub const CTRL_VENDOR_A0: u8 = 0xa0;

/// Request type byte for class-specific interface reads
pub const CLASS_INTERFACE_IN: u8 =
    LIBUSB_REQUEST_TYPE_CLASS | LIBUSB_RECIPIENT_INTERFACE | LIBUSB_ENDPOINT_IN;

/// Timeout applied to every control and bulk transfer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Maximum length of a device identity string (manufacturer:product:serial)
pub const MAX_IDENTITY_LEN: usize = 255;
