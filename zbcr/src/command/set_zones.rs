use tracing::info;

use crate::{
    codec,
    command::{bitfield_bound_check, CommandCode, SgCommand},
    transport::PassThrough,
    DataDirection, ZbcDevice,
};

/// Reconfigures the zone layout of an emulated device: a conventional region at the
/// start followed by equally sized sequential zones up to the end of the device.
#[derive(Clone, Debug)]
pub struct SetZonesCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    conventional_size: u64,
    zone_size: u64,
    control: u8,
}

impl<'a, T: PassThrough> SetZonesCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            conventional_size: 0,
            zone_size: 0,
            control: 0,
        }
    }

    /// Bytes of conventional space at the start of the device.
    pub fn conventional_size(&mut self, value: u64) -> &mut Self {
        self.conventional_size = value;
        self
    }

    /// Bytes per sequential zone.
    pub fn zone_size(&mut self, value: u64) -> &mut Self {
        self.zone_size = value;
        self
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    fn error_check(&self) -> crate::Result<(u64, u64)> {
        let info = self.interface.info();
        let logical_block_size = info.logical_block_size as u64;
        let physical_block_size = info.physical_block_size as u64;

        if logical_block_size == 0 || physical_block_size == 0 {
            return Err(crate::Error::InvalidArgument(format!(
                "{} has a 0 B block size ({} B logical, {} B physical)",
                self.interface.name(),
                logical_block_size,
                physical_block_size
            )));
        }

        if self.zone_size == 0 {
            return Err(crate::Error::InvalidArgument(
                "zone size must not be 0".to_owned(),
            ));
        }

        for (name, size) in [
            ("conventional size", self.conventional_size),
            ("zone size", self.zone_size),
        ] {
            if size % physical_block_size != 0 || size % logical_block_size != 0 {
                return Err(crate::Error::InvalidArgument(format!(
                    "{} {} B is not aligned to the {} B physical block size",
                    name, size, physical_block_size
                )));
            }
        }

        let conventional_blocks = self.conventional_size / logical_block_size;
        let zone_blocks = self.zone_size / logical_block_size;

        if conventional_blocks > info.logical_blocks {
            return Err(crate::Error::InvalidArgument(format!(
                "conventional size of {} blocks exceeds the device capacity of {} blocks",
                conventional_blocks, info.logical_blocks
            )));
        }

        bitfield_bound_check!(conventional_blocks, 56, "conventional size")?;
        bitfield_bound_check!(zone_blocks, 56, "zone size")?;

        Ok((conventional_blocks, zone_blocks))
    }

    /// Invalid sizes are rejected before anything reaches the device.
    pub fn issue(&mut self) -> crate::Result<()> {
        let (conventional_blocks, zone_blocks) = self.error_check()?;

        let mut command = SgCommand::new(CommandCode::SetZones);
        command.set_direction(DataDirection::None);

        let cdb = command.cdb_mut();
        codec::put_be(&mut cdb[2..], conventional_blocks, 7);
        codec::put_be(&mut cdb[9..], zone_blocks, 7);

        self.interface.execute(&mut command)?;

        info!(
            "{}: Zones set to {} conventional blocks, then {} blocks per zone",
            self.interface.name(),
            conventional_blocks,
            zone_blocks
        );

        Ok(())
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn set_zones(&self) -> SetZonesCommand<'_, T> {
        SetZonesCommand::new(self)
    }
}
