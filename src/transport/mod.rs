//! The transport boundary: synchronous USB topology enumeration and
//! control/bulk I/O.
//!
//! The [`Transport`] and [`TransportHandle`] traits allow the whole protocol
//! stack to be driven by a mock in tests; [`UsbTransport`] is the real
//! implementation over rusb.

pub mod usb;

#[cfg(test)]
pub(crate) mod mock;

pub use usb::{UsbHandle, UsbTransport};

use crate::error::TransportError;
use std::time::Duration;

/// Stable reference to one physical device within the current topology.
///
/// Only valid between two enumerations with no topology change; hot-plug
/// invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLocation {
    pub bus_number: u8,
    pub address: u8,
}

/// String descriptor indices from the device descriptor.  `None` means the
/// descriptor does not reference that string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringIndices {
    pub manufacturer: Option<u8>,
    pub product: Option<u8>,
    pub serial_number: Option<u8>,
}

/// One device in the topology tree, with its full configuration layout
#[derive(Debug, Clone)]
pub struct DeviceNode {
    pub location: DeviceLocation,
    pub strings: StringIndices,
    pub configs: Vec<ConfigNode>,
}

#[derive(Debug, Clone)]
pub struct ConfigNode {
    /// bConfigurationValue, as passed to set-configuration
    pub value: u8,
    pub interfaces: Vec<InterfaceNode>,
}

#[derive(Debug, Clone)]
pub struct InterfaceNode {
    /// bInterfaceNumber, as passed to claim-interface
    pub number: u8,
    pub alt_settings: Vec<AltSettingNode>,
}

#[derive(Debug, Clone)]
pub struct AltSettingNode {
    pub setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoints: Vec<EndpointNode>,
}

#[derive(Debug, Clone, Copy)]
pub struct EndpointNode {
    /// bEndpointAddress; bit 7 set means IN
    pub address: u8,
    pub kind: EndpointKind,
}

/// Endpoint transfer type from the endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl EndpointNode {
    /// Direction bit of the endpoint address
    pub fn is_in(&self) -> bool {
        self.address & rusb::constants::LIBUSB_ENDPOINT_IN != 0
    }
}

/// Synchronous access to the USB device topology
pub trait Transport {
    type Handle: TransportHandle;

    /// Enumerate the full topology.  Called fresh on every directory query;
    /// implementations must not cache across calls.
    fn devices(&self) -> Result<Vec<DeviceNode>, TransportError>;

    /// Open a handle to the device at `location`
    fn open(&self, location: DeviceLocation) -> Result<Self::Handle, TransportError>;
}

/// An open device handle.  Exclusively owned, never shared.
pub trait TransportHandle {
    fn read_string_descriptor(&self, index: u8) -> Result<String, TransportError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    fn set_configuration(&mut self, config: u8) -> Result<(), TransportError>;

    /// Class/vendor control read.  `request_type` is the raw bmRequestType
    /// byte, `index` is usually the interface number.
    fn control_in(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    fn bulk_write(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    fn bulk_read(
        &self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}
