use std::time::Duration;

use tracing::debug;

use crate::{
    command::{inquiry::DeviceModel, SgCommand, DEFAULT_TIMEOUT},
    exec,
    transport::PassThrough,
    zone::{ReportingOption, Zone, ZoneList},
};

/// Zones requested per REPORT ZONES while walking the whole device.
const LIST_ZONES_PAGE: usize = 1024;

/// What the device said about itself when it was opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor: String,
    pub product: String,
    pub revision: String,
    pub model: DeviceModel,
    pub logical_blocks: u64,
    pub logical_block_size: u32,
    pub physical_block_size: u32,
}

impl DeviceInfo {
    /// Saturates at `u64::MAX`.
    pub fn capacity_bytes(&self) -> u64 {
        self.logical_blocks
            .saturating_mul(self.logical_block_size as u64)
    }

    pub fn maximum_lba(&self) -> u64 {
        self.logical_blocks.saturating_sub(1)
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            vendor: String::new(),
            product: String::new(),
            revision: String::new(),
            model: DeviceModel::Other(0x1F),
            logical_blocks: 0,
            logical_block_size: 512,
            physical_block_size: 512,
        }
    }
}

/// An open zoned block device.
///
/// Commands are built through the methods named after them (`report_zones`,
/// `reset_write_pointer`, ...) and run synchronously, one at a time. The device is not
/// meant to be shared between threads without external locking.
#[derive(Debug)]
pub struct ZbcDevice<T> {
    transport: T,
    info: DeviceInfo,
    timeout: Duration,
}

#[cfg(target_os = "linux")]
impl ZbcDevice<crate::transport::SgTransport> {
    pub fn open<P: AsRef<std::path::Path> + ?Sized>(path: &P) -> crate::Result<Self> {
        Self::new(crate::transport::SgTransport::open(path, true)?)
    }

    pub fn open_readonly<P: AsRef<std::path::Path> + ?Sized>(path: &P) -> crate::Result<Self> {
        Self::new(crate::transport::SgTransport::open(path, false)?)
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    /// Wraps `transport` and queries INQUIRY and READ CAPACITY to fill in [`DeviceInfo`].
    pub fn new(transport: T) -> crate::Result<Self> {
        let mut device = Self::with_info(transport, DeviceInfo::default());

        let inquiry = device.inquiry().issue()?;
        let capacity = device.read_capacity().issue()?;

        device.info = DeviceInfo {
            model: inquiry.device_model(),
            vendor: inquiry.vendor_identification,
            product: inquiry.product_identification,
            revision: inquiry.product_revision_level,
            logical_blocks: capacity.logical_blocks,
            logical_block_size: capacity.logical_block_size,
            physical_block_size: capacity.physical_block_size,
        };

        debug!(
            "{}: {} {} {}, {:?}, {} logical blocks of {} B, {} B physical blocks",
            device.name(),
            device.info.vendor,
            device.info.product,
            device.info.revision,
            device.info.model,
            device.info.logical_blocks,
            device.info.logical_block_size,
            device.info.physical_block_size
        );

        Ok(device)
    }

    /// Wraps `transport` with already known device information.
    pub fn with_info(transport: T, info: DeviceInfo) -> Self {
        Self {
            transport,
            info,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs a prepared command with this device's timeout.
    pub fn execute(&self, command: &mut SgCommand<'_>) -> crate::Result<()> {
        command.set_timeout(self.timeout);
        exec::execute(&self.transport, command)
    }

    /// Reports every zone matching `option` from `start_lba` to the end of the device,
    /// issuing as many REPORT ZONES commands as it takes.
    pub fn list_zones(&self, start_lba: u64, option: ReportingOption) -> crate::Result<ZoneList> {
        let mut list = ZoneList {
            reporting_option: option,
            start_lba,
            ..Default::default()
        };

        let mut lba = start_lba;
        loop {
            let page = self
                .report_zones()
                .start_lba(lba)
                .reporting_option(option)
                .max_zones(LIST_ZONES_PAGE)
                .issue()?;

            if lba == start_lba {
                list.available = page.available;
                list.maximum_lba = page.maximum_lba;
            }

            let complete = page.zones.len() >= page.available;
            let next = match page.zones.last() {
                Some(last) => last.end_lba(),
                None => break,
            };
            list.zones.extend(page.zones);

            if complete || next <= lba || next > page.maximum_lba {
                break;
            }
            lba = next;
        }

        Ok(list)
    }

    /// Writes `data` `offset` blocks into `zone` and moves the zone along accordingly.
    ///
    /// Sequential zones only accept writes at their write pointer.
    pub fn write_zone(&self, zone: &mut Zone, offset: u64, data: &[u8]) -> crate::Result<()> {
        let blocks = self.blocks_in(data.len())?;
        zone.check_write(offset, blocks)?;

        let mut updated = *zone;
        updated.record_write(blocks)?;

        self.write()
            .logical_block_address(zone.start_lba + offset)
            .issue(data)?;

        *zone = updated;
        Ok(())
    }

    /// Resets the write pointer of `zone` and marks it empty.
    pub fn reset_zone(&self, zone: &mut Zone) -> crate::Result<()> {
        let mut updated = *zone;
        updated.record_reset()?;

        self.reset_write_pointer()
            .logical_block_address(zone.start_lba)
            .issue()?;

        *zone = updated;
        Ok(())
    }

    /// Flushes the device's volatile cache.
    pub fn flush(&self) -> crate::Result<()> {
        self.synchronize_cache().issue()
    }

    pub(crate) fn blocks_in(&self, length: usize) -> crate::Result<u64> {
        let block_size = self.info.logical_block_size as usize;

        if block_size == 0 {
            return Err(crate::Error::InvalidArgument(format!(
                "{} has a 0 B logical block size",
                self.name()
            )));
        }

        if length == 0 || length % block_size != 0 {
            return Err(crate::Error::InvalidArgument(format!(
                "{} B is not a whole number of {} B logical blocks",
                length, block_size
            )));
        }

        Ok((length / block_size) as u64)
    }
}
