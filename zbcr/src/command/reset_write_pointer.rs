use crate::{
    codec,
    command::{CommandCode, SgCommand},
    transport::PassThrough,
    DataDirection, ZbcDevice,
};

/// Passed as the logical block address to reset every sequential zone at once.
pub const ALL_ZONES: u64 = u64::MAX;

#[derive(Clone, Debug)]
pub struct ResetWritePointerCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    logical_block_address: u64,
    all: bool,
    control: u8,
}

impl<'a, T: PassThrough> ResetWritePointerCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            logical_block_address: 0,
            all: false,
            control: 0,
        }
    }

    /// Start LBA of the zone to reset, or [`ALL_ZONES`].
    pub fn logical_block_address(&mut self, value: u64) -> &mut Self {
        self.logical_block_address = value;
        self
    }

    pub fn all(&mut self, value: bool) -> &mut Self {
        self.all = value;
        self
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    /// Zone lists reported before this call are stale afterwards.
    pub fn issue(&mut self) -> crate::Result<()> {
        let all = self.all || self.logical_block_address == ALL_ZONES;

        let mut command = SgCommand::new(CommandCode::ResetWritePointer);
        command.set_direction(DataDirection::None);

        let cdb = command.cdb_mut();
        if !all {
            codec::put_be(&mut cdb[2..], self.logical_block_address, 8);
        }
        cdb[14] = u8::from(all);
        cdb[15] = self.control;

        self.interface.execute(&mut command)
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn reset_write_pointer(&self) -> ResetWritePointerCommand<'_, T> {
        ResetWritePointerCommand::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{device::tests::device, transport::mock::Reply};

    #[test]
    fn single_zone() {
        let device = device([Reply::ok()]);

        device
            .reset_write_pointer()
            .logical_block_address(0x8_0000)
            .issue()
            .unwrap();

        let submitted = &device.transport().submitted()[0];
        assert_eq!(submitted.command.len(), 16);
        assert_eq!(submitted.command[0], 0x94);
        assert_eq!(submitted.command[1], 0x04);
        assert_eq!(codec::get_be(&submitted.command[2..], 8), 0x8_0000);
        assert_eq!(submitted.command[14], 0);
        assert_eq!(submitted.direction, DataDirection::None);
    }

    #[test]
    fn every_zone() {
        let device = device([Reply::ok(), Reply::ok()]);

        device
            .reset_write_pointer()
            .logical_block_address(ALL_ZONES)
            .issue()
            .unwrap();
        device.reset_write_pointer().all(true).issue().unwrap();

        for submitted in device.transport().submitted() {
            assert_eq!(codec::get_be(&submitted.command[2..], 8), 0);
            assert_eq!(submitted.command[14], 0x01);
        }
    }
}
