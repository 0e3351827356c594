//! rusb-backed implementation of the transport traits
use crate::error::TransportError;
use crate::transport::{
    AltSettingNode, ConfigNode, DeviceLocation, DeviceNode, EndpointKind, EndpointNode,
    InterfaceNode, StringIndices, Transport, TransportHandle,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::{Context, DeviceHandle, TransferType, UsbContext};
use std::time::Duration;

/// Transport over a [`rusb::Context`].
///
/// Every [`Transport::devices`] call re-reads the device list from the OS,
/// so a fresh enumeration sees hot-plugged devices without any explicit
/// rescan step.
#[derive(Debug)]
pub struct UsbTransport {
    context: Context,
}

impl UsbTransport {
    pub fn new() -> Result<Self, TransportError> {
        trace!("UsbTransport::new");
        let context = Context::new()?;
        Ok(Self { context })
    }

    /// Use a caller-provided context, e.g. with a custom rusb log level
    pub fn with_context(context: Context) -> Self {
        trace!("UsbTransport::with_context");
        Self { context }
    }

    fn build_node(device: &rusb::Device<Context>) -> Result<DeviceNode, TransportError> {
        let descriptor = device.device_descriptor()?;

        let mut configs = Vec::with_capacity(descriptor.num_configurations() as usize);
        for config_index in 0..descriptor.num_configurations() {
            // A config descriptor that cannot be read is skipped, not fatal
            let config = match device.config_descriptor(config_index) {
                Ok(config) => config,
                Err(e) => {
                    debug!(
                        "Skipping unreadable config descriptor {} on {:03}-{:03}: {}",
                        config_index,
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };

            let interfaces = config
                .interfaces()
                .map(|interface| InterfaceNode {
                    number: interface.number(),
                    alt_settings: interface
                        .descriptors()
                        .map(|alt| AltSettingNode {
                            setting: alt.setting_number(),
                            class: alt.class_code(),
                            subclass: alt.sub_class_code(),
                            protocol: alt.protocol_code(),
                            endpoints: alt
                                .endpoint_descriptors()
                                .map(|ep| EndpointNode {
                                    address: ep.address(),
                                    kind: ep.transfer_type().into(),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect();

            configs.push(ConfigNode {
                value: config.number(),
                interfaces,
            });
        }

        Ok(DeviceNode {
            location: DeviceLocation {
                bus_number: device.bus_number(),
                address: device.address(),
            },
            strings: StringIndices {
                manufacturer: descriptor.manufacturer_string_index(),
                product: descriptor.product_string_index(),
                serial_number: descriptor.serial_number_string_index(),
            },
            configs,
        })
    }
}

impl From<TransferType> for EndpointKind {
    fn from(kind: TransferType) -> Self {
        match kind {
            TransferType::Control => EndpointKind::Control,
            TransferType::Isochronous => EndpointKind::Isochronous,
            TransferType::Bulk => EndpointKind::Bulk,
            TransferType::Interrupt => EndpointKind::Interrupt,
        }
    }
}

impl Transport for UsbTransport {
    type Handle = UsbHandle;

    fn devices(&self) -> Result<Vec<DeviceNode>, TransportError> {
        trace!("UsbTransport::devices");
        let mut nodes = Vec::new();
        for device in self.context.devices()?.iter() {
            match Self::build_node(&device) {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    // A device with an unreadable descriptor cannot be a
                    // USBTMC match, walk past it
                    debug!(
                        "Skipping device {:03}-{:03}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                }
            }
        }
        trace!("Enumerated {} devices", nodes.len());
        Ok(nodes)
    }

    fn open(&self, location: DeviceLocation) -> Result<Self::Handle, TransportError> {
        trace!("UsbTransport::open {location:?}");
        for device in self.context.devices()?.iter() {
            if device.bus_number() == location.bus_number && device.address() == location.address {
                let handle = device.open()?;
                return Ok(UsbHandle { handle });
            }
        }
        Err(TransportError::other(format!(
            "no device at bus {:03} address {:03}",
            location.bus_number, location.address
        )))
    }
}

/// An open rusb device handle
#[derive(Debug)]
pub struct UsbHandle {
    handle: DeviceHandle<Context>,
}

impl TransportHandle for UsbHandle {
    fn read_string_descriptor(&self, index: u8) -> Result<String, TransportError> {
        trace!("UsbHandle::read_string_descriptor index {index}");
        Ok(self.handle.read_string_descriptor_ascii(index)?)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        debug!("Claim interface {interface}");
        Ok(self.handle.claim_interface(interface)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        debug!("Release interface {interface}");
        Ok(self.handle.release_interface(interface)?)
    }

    fn set_configuration(&mut self, config: u8) -> Result<(), TransportError> {
        debug!("Set active configuration {config}");
        Ok(self.handle.set_active_configuration(config)?)
    }

    fn control_in(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        trace!(
            "UsbHandle::control_in request 0x{request:02x} value 0x{value:04x} index {index} \
             buffer.len() {}",
            buffer.len()
        );
        Ok(self
            .handle
            .read_control(request_type, request, value, index, buffer, timeout)?)
    }

    fn bulk_write(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        trace!(
            "UsbHandle::bulk_write endpoint 0x{endpoint:02x} data.len() {}",
            data.len()
        );
        Ok(self.handle.write_bulk(endpoint, data, timeout)?)
    }

    fn bulk_read(
        &self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        trace!(
            "UsbHandle::bulk_read endpoint 0x{endpoint:02x} buffer.len() {}",
            buffer.len()
        );
        Ok(self.handle.read_bulk(endpoint, buffer, timeout)?)
    }
}
