use modular_bitfield_msb::prelude::*;

use crate::{
    command::{bitfield_bound_check, CommandCode, SgCommand},
    transport::PassThrough,
    ZbcDevice,
};

#[derive(Clone, Debug)]
pub struct ReadCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    control: u8,
    group_number: u8,
    force_unit_access: bool,
    logical_block_address: u64,
    transfer_length: u32,
}

impl<'a, T: PassThrough> ReadCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            control: 0,
            group_number: 0,
            force_unit_access: false,
            logical_block_address: 0,
            transfer_length: 0,
        }
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    // group_number must be less than 0x40
    pub fn group_number(&mut self, value: u8) -> &mut Self {
        self.group_number = value;
        self
    }

    pub fn force_unit_access(&mut self, value: bool) -> &mut Self {
        self.force_unit_access = value;
        self
    }

    pub fn logical_block_address(&mut self, value: u64) -> &mut Self {
        self.logical_block_address = value;
        self
    }

    /// Number of logical blocks to read.
    pub fn transfer_length(&mut self, value: u32) -> &mut Self {
        self.transfer_length = value;
        self
    }

    fn error_check(&self) -> crate::Result<usize> {
        bitfield_bound_check!(self.group_number, 6, "group number")?;

        if self.transfer_length == 0 {
            return Err(crate::Error::InvalidArgument(
                "transfer length must not be 0".to_owned(),
            ));
        }

        check_range(
            self.interface,
            self.logical_block_address,
            self.transfer_length as u64,
        )?;

        let bytes = (self.transfer_length as u64)
            .saturating_mul(self.interface.info().logical_block_size as u64);
        bitfield_bound_check!(bytes, 32, "total transfer bytes")?;

        Ok(bytes as usize)
    }

    fn fill(&self, command: &mut SgCommand<'_>) {
        let command_buffer = CommandBuffer16::new()
            .with_operation_code(command.operation_code())
            .with_force_unit_access(self.force_unit_access.into())
            .with_logical_block_address(self.logical_block_address)
            .with_transfer_length(self.transfer_length)
            .with_group_number(self.group_number)
            .with_control(self.control);

        command
            .cdb_mut()
            .copy_from_slice(&command_buffer.into_bytes());
    }

    /// Reads into a freshly allocated buffer and returns what the device sent.
    pub fn issue(&mut self) -> crate::Result<Vec<u8>> {
        let bytes = self.error_check()?;

        let mut command = SgCommand::with_allocation(CommandCode::Read, bytes)?;
        self.fill(&mut command);

        self.interface.execute(&mut command)?;

        Ok(command.data().to_vec())
    }

    /// Reads straight into `buffer`, which must hold exactly the requested blocks.
    /// Returns the number of bytes transferred.
    pub fn issue_into(&mut self, buffer: &mut [u8]) -> crate::Result<usize> {
        let bytes = self.error_check()?;

        if buffer.len() != bytes {
            return Err(crate::Error::InvalidArgument(format!(
                "buffer of {} B does not match a transfer of {} B",
                buffer.len(),
                bytes
            )));
        }

        let mut command = SgCommand::with_buffer(CommandCode::Read, buffer)?;
        self.fill(&mut command);

        self.interface.execute(&mut command)?;

        Ok(command.output_size())
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn read(&self) -> ReadCommand<'_, T> {
        ReadCommand::new(self)
    }
}

/// Rejects accesses reaching past the last logical block of the device.
pub(crate) fn check_range<T: PassThrough>(
    interface: &ZbcDevice<T>,
    logical_block_address: u64,
    blocks: u64,
) -> crate::Result<()> {
    let logical_blocks = interface.info().logical_blocks;

    if logical_block_address
        .checked_add(blocks)
        .map_or(true, |end| end > logical_blocks)
    {
        return Err(crate::Error::InvalidArgument(format!(
            "{} blocks at LBA {} exceed the device capacity of {} blocks",
            blocks, logical_block_address, logical_blocks
        )));
    }

    Ok(())
}

#[bitfield]
#[derive(Clone, Copy)]
struct CommandBuffer16 {
    operation_code: B8,
    read_protect: B3,
    disable_page_out: B1,
    force_unit_access: B1,
    rebuild_assist_recovery_control: B1,
    obsolete: B1,
    dld_2: B1,
    logical_block_address: B64,
    transfer_length: B32,
    dld_1: B1,
    dld_0: B1,
    group_number: B6,
    control: B8,
}
