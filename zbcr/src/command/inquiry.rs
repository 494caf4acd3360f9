use modular_bitfield_msb::prelude::*;

use crate::{
    codec,
    command::{get_array, CommandCode, SgCommand},
    transport::PassThrough,
    ZbcDevice,
};

/// Minimum standard INQUIRY data length.
const STANDARD_DATA_LENGTH: usize = 36;

#[derive(Clone, Debug)]
pub struct InquiryCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    allocation_length: u16,
    control: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InquiryData {
    pub peripheral_qualifier: u8,
    pub peripheral_device_type: u8,
    pub version: u8,
    pub vendor_identification: String,
    pub product_identification: String,
    pub product_revision_level: String,
}

/// Zone model derived from the peripheral device type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceModel {
    /// Peripheral device type 14h: zones are enforced by the device.
    HostManaged,
    /// A regular direct-access block device. Host-aware and emulated zoned devices
    /// present themselves this way.
    Standard,
    Other(u8),
}

impl InquiryData {
    pub fn device_model(&self) -> DeviceModel {
        match self.peripheral_device_type {
            0x14 => DeviceModel::HostManaged,
            0x00 => DeviceModel::Standard,
            other => DeviceModel::Other(other),
        }
    }
}

impl<'a, T: PassThrough> InquiryCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            allocation_length: DEFAULT_ALLOCATION_LENGTH,
            control: 0,
        }
    }

    // allocation length must be at least 36, the size of standard inquiry data
    pub fn allocation_length(&mut self, value: u16) -> &mut Self {
        self.allocation_length = value;
        self
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    pub fn issue(&mut self) -> crate::Result<InquiryData> {
        if (self.allocation_length as usize) < STANDARD_DATA_LENGTH {
            return Err(crate::Error::InvalidArgument(format!(
                "allocation length {} is shorter than standard inquiry data ({} B)",
                self.allocation_length, STANDARD_DATA_LENGTH
            )));
        }

        let mut command =
            SgCommand::with_allocation(CommandCode::Inquiry, self.allocation_length as usize)?;

        let cdb = command.cdb_mut();
        codec::put_be(&mut cdb[3..], self.allocation_length as u64, 2);
        cdb[5] = self.control;

        self.interface.execute(&mut command)?;

        parse(command.data())
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn inquiry(&self) -> InquiryCommand<'_, T> {
        InquiryCommand::new(self)
    }
}

const DEFAULT_ALLOCATION_LENGTH: u16 = 96;

#[bitfield]
#[derive(Clone, Copy, Debug)]
struct StandardDataHeader {
    peripheral_qualifier: B3,
    peripheral_device_type: B5,
    removable_medium: B1,
    lu_cong: B1,
    reserved_0: B6,
    version: B8,
    obsolete: B2,
    normal_aca_supported: B1,
    hierarchical_support: B1,
    response_data_format: B4,
    additional_length: B8,
    flags: B24,
}

fn parse(data: &[u8]) -> crate::Result<InquiryData> {
    if data.len() < STANDARD_DATA_LENGTH {
        return Err(crate::Error::MalformedResponse(format!(
            "INQUIRY returned {} B, standard data needs {} B",
            data.len(),
            STANDARD_DATA_LENGTH
        )));
    }

    let (header, _) = get_array(data);
    let header = StandardDataHeader::from_bytes(header);

    Ok(InquiryData {
        peripheral_qualifier: header.peripheral_qualifier(),
        peripheral_device_type: header.peripheral_device_type(),
        version: header.version(),
        vendor_identification: ascii_field(&data[8..16]),
        product_identification: ascii_field(&data[16..32]),
        product_revision_level: ascii_field(&data[32..36]),
    })
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_owned()
}
