use modular_bitfield_msb::prelude::*;

use crate::{
    command::{bitfield_bound_check, CommandCode, SgCommand},
    transport::PassThrough,
    DataDirection, ZbcDevice,
};

#[derive(Clone, Debug)]
pub struct SynchronizeCacheCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    immediate: bool,
    group_number: u8,
    logical_block_address: u64,
    number_of_blocks: u32,
    control: u8,
}

impl<'a, T: PassThrough> SynchronizeCacheCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            immediate: false,
            group_number: 0,
            logical_block_address: 0,
            number_of_blocks: 0,
            control: 0,
        }
    }

    pub fn immediate(&mut self, value: bool) -> &mut Self {
        self.immediate = value;
        self
    }

    // group_number must be less than 0x20
    pub fn group_number(&mut self, value: u8) -> &mut Self {
        self.group_number = value;
        self
    }

    pub fn logical_block_address(&mut self, value: u64) -> &mut Self {
        self.logical_block_address = value;
        self
    }

    /// 0 covers everything from the logical block address to the end of the device.
    pub fn number_of_blocks(&mut self, value: u32) -> &mut Self {
        self.number_of_blocks = value;
        self
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    pub fn issue(&mut self) -> crate::Result<()> {
        bitfield_bound_check!(self.group_number, 5, "group number")?;

        let mut command = SgCommand::new(CommandCode::SynchronizeCache);
        command.set_direction(DataDirection::None);

        let command_buffer = CommandBuffer16::new()
            .with_operation_code(command.operation_code())
            .with_immediate(self.immediate.into())
            .with_logical_block_address(self.logical_block_address)
            .with_number_of_blocks(self.number_of_blocks)
            .with_group_number(self.group_number)
            .with_control(self.control);
        command
            .cdb_mut()
            .copy_from_slice(&command_buffer.into_bytes());

        self.interface.execute(&mut command)
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn synchronize_cache(&self) -> SynchronizeCacheCommand<'_, T> {
        SynchronizeCacheCommand::new(self)
    }
}

#[bitfield]
#[derive(Clone, Copy)]
struct CommandBuffer16 {
    operation_code: B8,
    reserved_0: B5,
    obsolete_0: B1,
    immediate: B1,
    obsolete_1: B1,
    logical_block_address: B64,
    number_of_blocks: B32,
    reserved_1: B3,
    group_number: B5,
    control: B8,
}
