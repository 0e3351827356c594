//! Error objects for the usbtmc crate
use libc::{EINVAL, EIO, ENODEV, ENOENT, ENOMEM};
use thiserror::Error;

/// Error type for the usbtmc crate
///
/// The variants mirror the error taxonomy of the wire protocol layer: every
/// public operation reports exactly one of these, with no internal retries.
/// A transfer timeout surfaces as the same bulk failure as any other
/// transport error.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// The device exists in the topology but could not be opened, or the
    /// requested index does not resolve to an openable device
    #[error("cannot open device: {source}")]
    DeviceNotOpenable { source: TransportError },

    /// A buffer could not be allocated
    #[error("buffer allocation failed")]
    AllocationFailure,

    /// No device matches the requested index or identity string
    #[error("device not present")]
    DeviceNotPresent,

    /// The one-time initialization after the first open failed
    #[error("first-open initialization failed: {source}")]
    FirstOpenInitFailed { source: TransportError },

    /// A bulk-out transfer (command or request header) failed
    #[error("bulk-out transfer failed: {source}")]
    BulkOutFailed { source: TransportError },

    /// A bulk-in transfer (response) failed
    #[error("bulk-in transfer failed: {source}")]
    BulkInFailed { source: TransportError },

    /// Invalid arguments passed to the usbtmc library
    #[error("usbtmc library called with invalid arguments: {message}")]
    InvalidParameter { message: String },
}

/// Failure reported by the transport layer
///
/// The transport gives no more detail than a message: a timeout is
/// indistinguishable from a device unplugged mid-transfer.
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("{message}")]
    Usb { message: String },
}

impl From<rusb::Error> for TransportError {
    fn from(err: rusb::Error) -> Self {
        TransportError::Usb {
            message: err.to_string(),
        }
    }
}

impl TransportError {
    pub(crate) fn other(message: impl Into<String>) -> Self {
        TransportError::Usb {
            message: message.into(),
        }
    }
}

impl Error {
    /// Numeric error code, compatible with the winusbtmc C library
    /// (0 = success, negative = failure).  The command line tool prints
    /// these values.
    pub fn code(&self) -> i32 {
        match self {
            Error::DeviceNotOpenable { .. } => -1,
            Error::AllocationFailure => -2,
            Error::DeviceNotPresent => -3,
            Error::FirstOpenInitFailed { .. } => -4,
            Error::BulkOutFailed { .. } => -5,
            Error::BulkInFailed { .. } => -6,
            Error::InvalidParameter { .. } => -7,
        }
    }

    /// Map to the closest errno value
    pub fn to_errno(&self) -> i32 {
        match self {
            Error::DeviceNotOpenable { .. } => ENODEV,
            Error::AllocationFailure => ENOMEM,
            Error::DeviceNotPresent => ENOENT,
            Error::FirstOpenInitFailed { .. } => EIO,
            Error::BulkOutFailed { .. } => EIO,
            Error::BulkInFailed { .. } => EIO,
            Error::InvalidParameter { .. } => EINVAL,
        }
    }
}
