//! Scripted in-memory transport used by the unit tests
use crate::error::TransportError;
use crate::transport::{
    AltSettingNode, ConfigNode, DeviceLocation, DeviceNode, EndpointKind, EndpointNode,
    InterfaceNode, StringIndices, Transport, TransportHandle,
};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

pub(crate) const MOCK_BULK_OUT: u8 = 0x02;
pub(crate) const MOCK_BULK_IN: u8 = 0x81;
pub(crate) const MOCK_INTERRUPT_IN: u8 = 0x83;

/// Everything the tests want to assert about or feed into one device
#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    pub claimed: Vec<u8>,
    pub released: Vec<u8>,
    pub configurations: Vec<u8>,
    /// (request_type, request, value, index) of every control-in
    pub control_requests: Vec<(u8, u8, u16, u16)>,
    /// When set, every control-in fails
    pub fail_controls: bool,
    /// Raw frames written to the bulk-out endpoint
    pub written: Vec<Vec<u8>>,
    /// Scripted bulk-in responses, one per read
    pub reads: VecDeque<Vec<u8>>,
    /// Number of open attempts made against this device
    pub opens: usize,
    /// When set, the Nth open attempt (1-based) fails
    pub fail_open_on: Option<usize>,
    /// Number of string descriptor reads served
    pub string_reads: usize,
}

pub(crate) struct MockDevice {
    node: DeviceNode,
    openable: bool,
    strings: HashMap<u8, String>,
    state: Rc<RefCell<DeviceState>>,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    devices: Vec<MockDevice>,
    enumerations: Rc<Cell<usize>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_location(&self) -> DeviceLocation {
        DeviceLocation {
            bus_number: 1,
            address: self.devices.len() as u8 + 1,
        }
    }

    /// Adds a USBTMC device with the usual single config/interface layout.
    /// Returns the shared state handle for scripting and assertions.
    pub(crate) fn add_tmc_device(
        &mut self,
        manufacturer: &str,
        product: &str,
        serial: &str,
    ) -> Rc<RefCell<DeviceState>> {
        let node = DeviceNode {
            location: self.next_location(),
            strings: StringIndices {
                manufacturer: Some(1),
                product: Some(2),
                serial_number: Some(3),
            },
            configs: vec![ConfigNode {
                value: 1,
                interfaces: vec![InterfaceNode {
                    number: 0,
                    alt_settings: vec![AltSettingNode {
                        setting: 0,
                        class: 0xfe,
                        subclass: 0x03,
                        protocol: 0x00,
                        endpoints: vec![
                            EndpointNode {
                                address: MOCK_BULK_OUT,
                                kind: EndpointKind::Bulk,
                            },
                            EndpointNode {
                                address: MOCK_BULK_IN,
                                kind: EndpointKind::Bulk,
                            },
                            EndpointNode {
                                address: MOCK_INTERRUPT_IN,
                                kind: EndpointKind::Interrupt,
                            },
                        ],
                    }],
                }],
            }],
        };

        let mut strings = HashMap::new();
        strings.insert(1, manufacturer.to_string());
        strings.insert(2, product.to_string());
        strings.insert(3, serial.to_string());

        let state = Rc::new(RefCell::new(DeviceState::default()));
        self.devices.push(MockDevice {
            node,
            openable: true,
            strings,
            state: Rc::clone(&state),
        });
        state
    }

    /// Adds a device whose interfaces do not match the USBTMC class triple
    pub(crate) fn add_non_tmc_device(&mut self) {
        let node = DeviceNode {
            location: self.next_location(),
            strings: StringIndices::default(),
            configs: vec![ConfigNode {
                value: 1,
                interfaces: vec![InterfaceNode {
                    number: 0,
                    alt_settings: vec![AltSettingNode {
                        setting: 0,
                        class: 0x03, // HID
                        subclass: 0x00,
                        protocol: 0x00,
                        endpoints: vec![EndpointNode {
                            address: 0x81,
                            kind: EndpointKind::Interrupt,
                        }],
                    }],
                }],
            }],
        };
        let state = Rc::new(RefCell::new(DeviceState::default()));
        self.devices.push(MockDevice {
            node,
            openable: true,
            strings: HashMap::new(),
            state,
        });
    }

    /// Makes the most recently added device fail on open
    pub(crate) fn make_last_unopenable(&mut self) {
        if let Some(device) = self.devices.last_mut() {
            device.openable = false;
        }
    }

    /// Shared count of topology walks, usable for assertions after the
    /// transport has been moved into a context
    pub(crate) fn enumeration_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.enumerations)
    }

    /// Drops the string descriptor indices of the most recently added device
    pub(crate) fn clear_last_string_indices(&mut self) {
        if let Some(device) = self.devices.last_mut() {
            device.node.strings = StringIndices::default();
        }
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    fn devices(&self) -> Result<Vec<DeviceNode>, TransportError> {
        self.enumerations.set(self.enumerations.get() + 1);
        Ok(self.devices.iter().map(|d| d.node.clone()).collect())
    }

    fn open(&self, location: DeviceLocation) -> Result<Self::Handle, TransportError> {
        let device = self
            .devices
            .iter()
            .find(|d| d.node.location == location)
            .ok_or_else(|| TransportError::other("no such device"))?;
        {
            let mut state = device.state.borrow_mut();
            state.opens += 1;
            if state.fail_open_on == Some(state.opens) {
                return Err(TransportError::other("open refused"));
            }
        }
        if !device.openable {
            return Err(TransportError::other("open refused"));
        }
        Ok(MockHandle {
            strings: device.strings.clone(),
            state: Rc::clone(&device.state),
        })
    }
}

pub(crate) struct MockHandle {
    strings: HashMap<u8, String>,
    state: Rc<RefCell<DeviceState>>,
}

impl TransportHandle for MockHandle {
    fn read_string_descriptor(&self, index: u8) -> Result<String, TransportError> {
        self.state.borrow_mut().string_reads += 1;
        self.strings
            .get(&index)
            .cloned()
            .ok_or_else(|| TransportError::other("no such string descriptor"))
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.state.borrow_mut().claimed.push(interface);
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        self.state.borrow_mut().released.push(interface);
        Ok(())
    }

    fn set_configuration(&mut self, config: u8) -> Result<(), TransportError> {
        self.state.borrow_mut().configurations.push(config);
        Ok(())
    }

    fn control_in(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        state
            .control_requests
            .push((request_type, request, value, index));
        if state.fail_controls {
            return Err(TransportError::other("control refused"));
        }
        if !buffer.is_empty() {
            buffer[0] = 0x01; // USBTMC STATUS_SUCCESS
        }
        Ok(buffer.len())
    }

    fn bulk_write(
        &self,
        _endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.state.borrow_mut().written.push(data.to_vec());
        Ok(data.len())
    }

    fn bulk_read(
        &self,
        _endpoint: u8,
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        let response = state
            .reads
            .pop_front()
            .ok_or_else(|| TransportError::other("bulk-in timed out"))?;
        let n = response.len().min(buffer.len());
        buffer[..n].copy_from_slice(&response[..n]);
        Ok(n)
    }
}
