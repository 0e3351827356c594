//! The device directory: walks the USB topology looking for USBTMC
//! interfaces.
//!
//! Every query performs the full depth-first walk (bus, device,
//! configuration, interface, alt-setting) from scratch.  Device indices are
//! ordinals over that walk and stay valid only while the topology does not
//! change; after plugging a device in, indices must be re-resolved.
use crate::constants::{
    MAX_IDENTITY_LEN, USB488_PROTOCOL, USBTMC_CLASS, USBTMC_PROTOCOL, USBTMC_SUBCLASS,
};
use crate::error::{Error, TransportError};
use crate::transport::{
    AltSettingNode, DeviceLocation, DeviceNode, EndpointKind, Transport, TransportHandle,
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Everything needed to open and talk to one matched USBTMC interface.
///
/// Recomputed fresh on every directory query; never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub location: DeviceLocation,
    /// bConfigurationValue of the matched configuration
    pub config_value: u8,
    /// bInterfaceNumber of the matched interface
    pub interface_number: u8,
    /// Alternate setting number of the matched interface
    pub alt_setting: u8,
    pub bulk_in: u8,
    pub bulk_out: u8,
    pub interrupt_in: Option<u8>,
    /// `manufacturer:product:serial`, each field trimmed, empty fields kept
    pub identity: String,
}

fn is_usbtmc(alt: &AltSettingNode) -> bool {
    alt.class == USBTMC_CLASS
        && alt.subclass == USBTMC_SUBCLASS
        && (alt.protocol == USBTMC_PROTOCOL || alt.protocol == USB488_PROTOCOL)
}

/// Counts the USBTMC interfaces currently present
pub fn device_count<T: Transport>(transport: &T) -> Result<usize, Error> {
    trace!("directory::device_count");
    let mut count = 0;
    for node in walk(transport)? {
        count += matches(&node).count();
    }
    debug!("{count} USBTMC device(s) present");
    Ok(count)
}

/// Builds the descriptor for the `index`th USBTMC interface of the walk.
///
/// Transiently opens the device to read its string descriptors; if the
/// device cannot be opened the whole call fails even though it counted fine.
pub fn descriptor_at<T: Transport>(transport: &T, index: u32) -> Result<DeviceDescriptor, Error> {
    trace!("directory::descriptor_at index {index}");
    let mut counter = 0u32;
    for node in walk(transport)? {
        for matched in matches(&node) {
            if counter == index {
                return build_descriptor(transport, &node, matched);
            }
            counter += 1;
        }
    }
    debug!("Index {index} out of range, walk matched {counter} device(s)");
    Err(Error::DeviceNotPresent)
}

fn walk<T: Transport>(transport: &T) -> Result<Vec<DeviceNode>, Error> {
    transport
        .devices()
        .map_err(|source| Error::DeviceNotOpenable { source })
}

struct Match<'a> {
    config_value: u8,
    interface_number: u8,
    alt: &'a AltSettingNode,
}

/// Depth-first iteration over the USBTMC alt-settings of one device
fn matches(node: &DeviceNode) -> impl Iterator<Item = Match<'_>> {
    node.configs.iter().flat_map(|config| {
        config.interfaces.iter().flat_map(move |interface| {
            interface
                .alt_settings
                .iter()
                .filter(|alt| is_usbtmc(alt))
                .map(move |alt| Match {
                    config_value: config.value,
                    interface_number: interface.number,
                    alt,
                })
        })
    })
}

fn build_descriptor<T: Transport>(
    transport: &T,
    node: &DeviceNode,
    matched: Match<'_>,
) -> Result<DeviceDescriptor, Error> {
    let mut bulk_in = None;
    let mut bulk_out = None;
    let mut interrupt_in = None;

    for endpoint in &matched.alt.endpoints {
        match endpoint.kind {
            EndpointKind::Bulk => {
                if endpoint.is_in() {
                    bulk_in = Some(endpoint.address);
                } else {
                    bulk_out = Some(endpoint.address);
                }
            }
            EndpointKind::Interrupt => {
                if endpoint.is_in() {
                    interrupt_in = Some(endpoint.address);
                }
            }
            _ => {}
        }
    }

    // The class mandates both bulk endpoints; an interface missing one
    // cannot be used for message exchange
    let (bulk_in, bulk_out) = match (bulk_in, bulk_out) {
        (Some(bulk_in), Some(bulk_out)) => (bulk_in, bulk_out),
        _ => {
            warn!(
                "USBTMC interface at {:03}-{:03} lacks a bulk endpoint pair",
                node.location.bus_number, node.location.address
            );
            return Err(Error::DeviceNotOpenable {
                source: TransportError::other("interface lacks bulk endpoint pair"),
            });
        }
    };

    let identity = read_identity(transport, node)?;
    trace!("Matched device identity {identity:?}");

    Ok(DeviceDescriptor {
        location: node.location,
        config_value: matched.config_value,
        interface_number: matched.interface_number,
        alt_setting: matched.alt.setting,
        bulk_in,
        bulk_out,
        interrupt_in,
        identity,
    })
}

/// Reads manufacturer/product/serial into the colon-joined identity string.
///
/// Opening the device is mandatory; reading any individual string is not.
/// A zero string index or an unreadable descriptor yields an empty field
/// with its colons preserved.
fn read_identity<T: Transport>(transport: &T, node: &DeviceNode) -> Result<String, Error> {
    let handle = transport
        .open(node.location)
        .map_err(|source| Error::DeviceNotOpenable { source })?;

    let field = |index: Option<u8>| -> String {
        index
            .and_then(|i| handle.read_string_descriptor(i).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let mut identity = format!(
        "{}:{}:{}",
        field(node.strings.manufacturer),
        field(node.strings.product),
        field(node.strings.serial_number)
    );
    if identity.len() > MAX_IDENTITY_LEN {
        let mut end = MAX_IDENTITY_LEN;
        while !identity.is_char_boundary(end) {
            end -= 1;
        }
        identity.truncate(end);
    }
    // Handle drops here, closing the transient open
    Ok(identity)
}
