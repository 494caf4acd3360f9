use std::mem::size_of;

use modular_bitfield_msb::prelude::*;

use crate::{
    codec,
    command::{get_array, CommandCode, SgCommand},
    transport::PassThrough,
    ZbcDevice,
};

#[derive(Clone, Debug)]
pub struct ReadCapacityCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    control: u8,
}

/// READ CAPACITY 16 parameter data, with the derived sizes checked to be representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capacity {
    pub returned_logical_block_address: u64,
    pub logical_blocks: u64,
    pub logical_block_size: u32,
    pub logical_blocks_per_physical_block_exponent: u8,
    pub physical_block_size: u32,
    pub protection_enabled: bool,
    pub lowest_aligned_logical_block_address: u16,
}

impl<'a, T: PassThrough> ReadCapacityCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            control: 0,
        }
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    pub fn issue(&mut self) -> crate::Result<Capacity> {
        let mut command =
            SgCommand::with_allocation(CommandCode::ReadCapacity, size_of::<DataBuffer16>())?;

        let cdb = command.cdb_mut();
        codec::put_be(&mut cdb[10..], size_of::<DataBuffer16>() as u64, 4);
        cdb[15] = self.control;

        self.interface.execute(&mut command)?;

        let data = command.data();
        if data.len() < MINIMUM_DATA_LENGTH {
            return Err(crate::Error::MalformedResponse(format!(
                "READ CAPACITY 16 returned {} B, expected at least {} B",
                data.len(),
                MINIMUM_DATA_LENGTH
            )));
        }

        let result = DataBuffer16::from_bytes(get_array(data).0);
        if result.logical_block_length_in_bytes() == 0 {
            return Err(crate::Error::MalformedResponse(
                "READ CAPACITY 16 reported a 0 B logical block".to_owned(),
            ));
        }

        let returned_logical_block_address = result.returned_logical_block_address();
        let logical_blocks = returned_logical_block_address.checked_add(1).ok_or_else(|| {
            crate::Error::MalformedResponse(format!(
                "READ CAPACITY 16 reported an unaddressable last LBA {}",
                returned_logical_block_address
            ))
        })?;

        let logical_block_size = result.logical_block_length_in_bytes();
        let exponent = result.logical_blocks_per_physical_block_exponent();
        let physical_block_size = u32::try_from((logical_block_size as u64) << exponent)
            .map_err(|_| {
                crate::Error::MalformedResponse(format!(
                    "READ CAPACITY 16 physical block of {} B << {} does not fit 32 bits",
                    logical_block_size, exponent
                ))
            })?;

        Ok(Capacity {
            returned_logical_block_address,
            logical_blocks,
            logical_block_size,
            logical_blocks_per_physical_block_exponent: exponent,
            physical_block_size,
            protection_enabled: result.protection_enabled() != 0,
            lowest_aligned_logical_block_address: result.lowest_aligned_logical_block_address(),
        })
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn read_capacity(&self) -> ReadCapacityCommand<'_, T> {
        ReadCapacityCommand::new(self)
    }
}

/// Returned LBA and block length; everything past them is optional.
const MINIMUM_DATA_LENGTH: usize = 12;

#[bitfield]
#[derive(Clone, Copy)]
struct DataBuffer16 {
    returned_logical_block_address: B64,
    logical_block_length_in_bytes: B32,
    reserved_0: B2,
    read_capacity_basis: B2,
    protection_type: B3,
    protection_enabled: B1,
    p_i_exponent: B4,
    logical_blocks_per_physical_block_exponent: B4,
    logical_block_provisioning_management_enabled: B1,
    logical_block_provisioning_read_zeros: B1,
    lowest_aligned_logical_block_address: B14,
    reserved_1: B128,
}
