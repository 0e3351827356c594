//! Builder for [`Tmc`] contexts over the real USB transport
use crate::constants::DEFAULT_TIMEOUT;
use crate::error::Error;
use crate::transport::UsbTransport;
use crate::{Tmc, UsbTmc};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::Context;
use std::time::Duration;

/// Builder for a USB-backed [`Tmc`] context.
///
/// Allows setting an optional custom [`rusb::Context`] and a transfer
/// timeout before creating the context.
///
/// # Examples
///
/// ```no_run
/// use usbtmc::TmcBuilder;
///
/// let tmc = TmcBuilder::new().build().unwrap();
/// ```
///
/// With a custom rusb context, e.g. for USB-level debug logging:
///
/// ```no_run
/// use rusb::{Context, UsbContext};
/// use usbtmc::TmcBuilder;
///
/// let mut context = Context::new().unwrap();
/// context.set_log_level(rusb::LogLevel::Debug);
///
/// let tmc = TmcBuilder::new().context(context).build().unwrap();
/// ```
#[derive(Default)]
pub struct TmcBuilder {
    usb_context: Option<Context>,
    timeout: Option<Duration>,
}

impl TmcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom USB context.  If not set, a default context is created
    /// when building.
    pub fn context(mut self, context: Context) -> Self {
        self.usb_context = Some(context);
        self
    }

    /// Sets the timeout applied to every control and bulk transfer.
    /// Defaults to [`crate::constants::DEFAULT_TIMEOUT`] (1 second).
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Builds the [`UsbTmc`] context using the configured parameters
    pub fn build(self) -> Result<UsbTmc, Error> {
        trace!("TmcBuilder::build");
        let transport = match self.usb_context {
            Some(context) => UsbTransport::with_context(context),
            None => UsbTransport::new()
                .map_err(|source| Error::DeviceNotOpenable { source })?,
        };
        Ok(Tmc::new(transport, self.timeout.unwrap_or(DEFAULT_TIMEOUT)))
    }
}
