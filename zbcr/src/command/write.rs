use modular_bitfield_msb::prelude::*;

use crate::{
    command::{bitfield_bound_check, read::check_range, CommandCode, SgCommand},
    transport::PassThrough,
    DataDirection, ZbcDevice,
};

#[derive(Clone, Debug)]
pub struct WriteCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    control: u8,
    group_number: u8,
    force_unit_access: bool,
    logical_block_address: u64,
}

impl<'a, T: PassThrough> WriteCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            control: 0,
            group_number: 0,
            force_unit_access: false,
            logical_block_address: 0,
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

    /// Writes `data`, which must be a whole number of logical blocks. The transfer
    /// length follows from its size.
    pub fn issue(&mut self, data: &[u8]) -> crate::Result<()> {
        bitfield_bound_check!(self.group_number, 6, "group number")?;
        let bytes = data.len() as u64;
        bitfield_bound_check!(bytes, 32, "total transfer bytes")?;

        let blocks = self.interface.blocks_in(data.len())?;
        check_range(self.interface, self.logical_block_address, blocks)?;

        let mut command = SgCommand::with_allocation(CommandCode::Write, data.len())?;
        command.set_direction(DataDirection::ToDevice);
        command.data_mut().copy_from_slice(data);

        let command_buffer = CommandBuffer16::new()
            .with_operation_code(command.operation_code())
            .with_force_unit_access(self.force_unit_access.into())
            .with_logical_block_address(self.logical_block_address)
            .with_transfer_length(blocks as u32)
            .with_group_number(self.group_number)
            .with_control(self.control);
        command
            .cdb_mut()
            .copy_from_slice(&command_buffer.into_bytes());

        self.interface.execute(&mut command)
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn write(&self) -> WriteCommand<'_, T> {
        WriteCommand::new(self)
    }
}

#[bitfield]
#[derive(Clone, Copy)]
struct CommandBuffer16 {
    operation_code: B8,
    write_protect: B3,
    disable_page_out: B1,
    force_unit_access: B1,
    reserved: B1,
    obsolete: B1,
    dld_2: B1,
    logical_block_address: B64,
    transfer_length: B32,
    dld_1: B1,
    dld_0: B1,
    group_number: B6,
    control: B8,
}
