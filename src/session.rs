//! Per-device session state
use crate::directory::DeviceDescriptor;
use crate::transport::TransportHandle;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::num::Wrapping;

/// Runtime state for one opened device.
///
/// A session is created the first time an index is opened and lives until
/// teardown.  The handle is absent while the session is allocated but
/// closed; a failed transport open leaves the session in that state so a
/// retry does not re-enumerate.
#[derive(Debug)]
pub struct Session<H: TransportHandle> {
    descriptor: DeviceDescriptor,
    handle: Option<H>,
    /// Sequence counter stamped into every framed transfer, wraps mod 256
    btag: Wrapping<u8>,
    /// Latest USBTMC status byte seen from the device
    status: u8,
    first_init_done: bool,
}

impl<H: TransportHandle> Session<H> {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        trace!("Session::new {:?}", descriptor.identity);
        Self {
            descriptor,
            handle: None,
            btag: Wrapping(0),
            status: 0,
            first_init_done: false,
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn attach(&mut self, handle: H) {
        debug!("Session for {:?} opened", self.descriptor.identity);
        self.handle = Some(handle);
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Takes the current bTag and advances the counter
    pub fn next_tag(&mut self) -> u8 {
        let tag = self.btag.0;
        self.btag += Wrapping(1);
        tag
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn set_status(&mut self, status: u8) {
        self.status = status;
    }

    pub fn first_init_done(&self) -> bool {
        self.first_init_done
    }

    pub fn mark_first_init_done(&mut self) {
        self.first_init_done = true;
    }

    /// Releases the claimed interface and closes the handle.  Safe to call
    /// on a closed session.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            debug!("Session for {:?} closing", self.descriptor.identity);
            // Best effort, the handle is going away either way
            let _ = handle.release_interface(self.descriptor.interface_number);
        }
    }
}

impl<H: TransportHandle> Drop for Session<H> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockHandle;
    use crate::transport::{DeviceLocation, Transport};

    fn descriptor() -> DeviceDescriptor {
        DeviceDescriptor {
            location: DeviceLocation {
                bus_number: 1,
                address: 1,
            },
            config_value: 1,
            interface_number: 0,
            alt_setting: 0,
            bulk_in: 0x81,
            bulk_out: 0x02,
            interrupt_in: None,
            identity: "Acme:Model1:SN1".to_string(),
        }
    }

    #[test]
    fn test_tags_do_not_repeat_until_wraparound() {
        let mut session: Session<MockHandle> = Session::new(descriptor());
        let mut seen = [false; 256];
        for _ in 0..256 {
            let tag = session.next_tag();
            assert!(!seen[tag as usize], "tag {tag} repeated before wrap");
            seen[tag as usize] = true;
        }
        // Counter has wrapped back to the start
        assert_eq!(session.next_tag(), 0);
    }

    #[test]
    fn test_close_releases_claimed_interface() {
        let mut transport = crate::transport::mock::MockTransport::new();
        let state = transport.add_tmc_device("Acme", "Model1", "SN1");
        let handle = transport
            .open(DeviceLocation {
                bus_number: 1,
                address: 1,
            })
            .unwrap();

        let mut session = Session::new(descriptor());
        session.attach(handle);
        assert!(session.is_open());
        session.close();
        assert!(!session.is_open());
        assert_eq!(state.borrow().released, vec![0]);
    }
}
