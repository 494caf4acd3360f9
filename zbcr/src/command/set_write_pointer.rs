use tracing::debug;

use crate::{
    codec,
    command::{bitfield_bound_check, CommandCode, SgCommand},
    transport::PassThrough,
    zone::ReportingOption,
    DataDirection, ZbcDevice,
};

/// Moves the write pointer of one zone of an emulated device without writing data.
#[derive(Clone, Debug)]
pub struct SetWritePointerCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    start_lba: u64,
    write_pointer: u64,
    control: u8,
}

impl<'a, T: PassThrough> SetWritePointerCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            start_lba: 0,
            write_pointer: 0,
            control: 0,
        }
    }

    /// Start LBA of the target zone.
    pub fn start_lba(&mut self, value: u64) -> &mut Self {
        self.start_lba = value;
        self
    }

    pub fn write_pointer(&mut self, value: u64) -> &mut Self {
        self.write_pointer = value;
        self
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    /// Looks the zone up first: `start_lba` must be the start of a sequential zone and
    /// the new pointer must lie within it. Zone lists reported before this call are
    /// stale afterwards.
    pub fn issue(&mut self) -> crate::Result<()> {
        bitfield_bound_check!(self.start_lba, 56, "start LBA")?;
        bitfield_bound_check!(self.write_pointer, 56, "write pointer")?;

        let list = self
            .interface
            .report_zones()
            .start_lba(self.start_lba)
            .reporting_option(ReportingOption::All)
            .max_zones(1)
            .issue()?;

        let zone = list.find(self.start_lba).ok_or_else(|| {
            crate::Error::InvalidArgument(format!("no zone starts at LBA {}", self.start_lba))
        })?;

        if !zone.is_sequential() {
            return Err(crate::Error::InvalidArgument(format!(
                "zone at LBA {} is {} and has no write pointer",
                zone.start_lba, zone.zone_type
            )));
        }

        if !(zone.start_lba..=zone.end_lba()).contains(&self.write_pointer) {
            return Err(crate::Error::InvalidArgument(format!(
                "write pointer {} is outside zone {}..={}",
                self.write_pointer,
                zone.start_lba,
                zone.end_lba()
            )));
        }

        let mut command = SgCommand::new(CommandCode::SetWritePointer);
        command.set_direction(DataDirection::None);

        let cdb = command.cdb_mut();
        codec::put_be(&mut cdb[2..], self.start_lba, 7);
        codec::put_be(&mut cdb[9..], self.write_pointer, 7);

        self.interface.execute(&mut command)?;

        debug!(
            "{}: Zone {} write pointer set to {}",
            self.interface.name(),
            self.start_lba,
            self.write_pointer
        );

        Ok(())
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn set_write_pointer(&self) -> SetWritePointerCommand<'_, T> {
        SetWritePointerCommand::new(self)
    }
}
