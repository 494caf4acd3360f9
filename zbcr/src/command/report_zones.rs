use modular_bitfield_msb::prelude::*;
use tracing::warn;

use crate::{
    codec,
    command::{bitfield_bound_check, get_array, CommandCode, SgCommand},
    transport::PassThrough,
    zone::{ReportingOption, Zone, ZoneCondition, ZoneType},
    ZbcDevice, ZoneList,
};

/// Size of the report header and of every zone descriptor after it.
pub const DESCRIPTOR_LENGTH: usize = 64;

const DEFAULT_MAX_ZONES: usize = 128;

#[derive(Clone, Debug)]
pub struct ReportZonesCommand<'a, T> {
    interface: &'a ZbcDevice<T>,
    start_lba: u64,
    reporting_option: ReportingOption,
    partial: bool,
    max_zones: usize,
    control: u8,
}

/// The fixed part at the start of a REPORT ZONES response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReportHeader {
    /// Bytes of descriptors the device has for this request, whether or not they
    /// fit in the allocation.
    pub zone_list_length: u32,
    pub maximum_lba: u64,
}

impl ReportHeader {
    pub fn available_zones(&self) -> usize {
        self.zone_list_length as usize / DESCRIPTOR_LENGTH
    }
}

impl<'a, T: PassThrough> ReportZonesCommand<'a, T> {
    fn new(interface: &'a ZbcDevice<T>) -> Self {
        Self {
            interface,
            start_lba: 0,
            reporting_option: ReportingOption::All,
            partial: false,
            max_zones: DEFAULT_MAX_ZONES,
            control: 0,
        }
    }

    /// First LBA of interest; the device reports zones starting from the one containing it.
    pub fn start_lba(&mut self, value: u64) -> &mut Self {
        self.start_lba = value;
        self
    }

    pub fn reporting_option(&mut self, value: ReportingOption) -> &mut Self {
        self.reporting_option = value;
        self
    }

    /// Have the zone list length cover only the descriptors that fit the allocation.
    pub fn partial(&mut self, value: bool) -> &mut Self {
        self.partial = value;
        self
    }

    /// Number of descriptors to make room for. 0 asks for the header alone, which is
    /// enough to learn how many zones match.
    pub fn max_zones(&mut self, value: usize) -> &mut Self {
        self.max_zones = value;
        self
    }

    pub fn control(&mut self, value: u8) -> &mut Self {
        self.control = value;
        self
    }

    pub fn issue(&mut self) -> crate::Result<ZoneList> {
        let allocation_length = (self.max_zones as u64)
            .saturating_add(1)
            .saturating_mul(DESCRIPTOR_LENGTH as u64);
        bitfield_bound_check!(allocation_length, 32, "allocation length")?;

        let mut command =
            SgCommand::with_allocation(CommandCode::ReportZones, allocation_length as usize)?;

        let cdb = command.cdb_mut();
        codec::put_be(&mut cdb[2..], self.start_lba, 8);
        codec::put_be(&mut cdb[10..], allocation_length, 4);
        cdb[14] = (u8::from(self.partial) << 7) | (u8::from(self.reporting_option) & 0x3F);
        cdb[15] = self.control;

        self.interface.execute(&mut command)?;

        let (header, zones) = decode_report(command.data(), self.max_zones)?;

        Ok(ZoneList {
            reporting_option: self.reporting_option,
            start_lba: self.start_lba,
            available: header.available_zones(),
            maximum_lba: header.maximum_lba,
            zones,
        })
    }
}

impl<T: PassThrough> ZbcDevice<T> {
    pub fn report_zones(&self) -> ReportZonesCommand<'_, T> {
        ReportZonesCommand::new(self)
    }
}

#[bitfield]
#[derive(Clone, Copy)]
struct DescriptorHead {
    reserved_0: B4,
    zone_type: B4,
    zone_condition: B4,
    reserved_1: B2,
    non_sequential: B1,
    reset: B1,
}

/// Decodes a REPORT ZONES response holding `data.len()` valid bytes.
///
/// At most `max_zones` descriptors are returned, fewer if the device has fewer or the
/// transfer stopped short. A header whose length would end inside a descriptor is
/// rejected.
pub fn decode_report(data: &[u8], max_zones: usize) -> crate::Result<(ReportHeader, Vec<Zone>)> {
    if data.len() < DESCRIPTOR_LENGTH {
        return Err(crate::Error::MalformedResponse(format!(
            "REPORT ZONES returned {} B, shorter than its {} B header",
            data.len(),
            DESCRIPTOR_LENGTH
        )));
    }

    let header = ReportHeader {
        zone_list_length: codec::get_be(&data[0..], 4) as u32,
        maximum_lba: codec::get_be(&data[8..], 8),
    };
    let list_length = header.zone_list_length as usize;

    if list_length % DESCRIPTOR_LENGTH != 0 {
        return Err(crate::Error::MalformedResponse(format!(
            "zone list length {} B is not a multiple of the {} B descriptor",
            list_length, DESCRIPTOR_LENGTH
        )));
    }

    let payload = &data[DESCRIPTOR_LENGTH..];
    if payload.len() < list_length && payload.len() % DESCRIPTOR_LENGTH != 0 {
        return Err(crate::Error::MalformedResponse(format!(
            "{} B of zone descriptors end inside a descriptor",
            payload.len()
        )));
    }

    let count = usize::min(list_length, payload.len()) / DESCRIPTOR_LENGTH;
    let count = usize::min(count, max_zones);

    let zones = payload
        .chunks_exact(DESCRIPTOR_LENGTH)
        .take(count)
        .map(decode_descriptor)
        .collect::<crate::Result<Vec<_>>>()?;

    for zone in zones.iter().filter(|zone| !zone.is_consistent()) {
        warn!(
            "Zone at LBA {} reports write pointer {} while {}",
            zone.start_lba, zone.write_pointer, zone.condition
        );
    }

    Ok((header, zones))
}

fn decode_descriptor(descriptor: &[u8]) -> crate::Result<Zone> {
    let head = DescriptorHead::from_bytes(get_array(descriptor).0);
    let length = codec::get_be(&descriptor[8..], 8);
    let start_lba = codec::get_be(&descriptor[16..], 8);

    if start_lba.checked_add(length).is_none() {
        return Err(crate::Error::MalformedResponse(format!(
            "zone at LBA {} with {} blocks runs past the last addressable LBA",
            start_lba, length
        )));
    }

    Ok(Zone {
        zone_type: ZoneType::from(head.zone_type()),
        condition: ZoneCondition::from(head.zone_condition()),
        reset: head.reset() != 0,
        non_sequential: head.non_sequential() != 0,
        length,
        start_lba,
        write_pointer: codec::get_be(&descriptor[24..], 8),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{device::tests::device, transport::mock::Reply};
    use std::mem::size_of;

    /// A response with `available` matching zones of which `zones` were transferred.
    pub(crate) fn report(available: usize, maximum_lba: u64, zones: &[Zone]) -> Vec<u8> {
        let mut data = vec![0u8; DESCRIPTOR_LENGTH * (zones.len() + 1)];
        codec::put_be(&mut data[0..], (available * DESCRIPTOR_LENGTH) as u64, 4);
        codec::put_be(&mut data[8..], maximum_lba, 8);

        for (zone, descriptor) in zones
            .iter()
            .zip(data[DESCRIPTOR_LENGTH..].chunks_exact_mut(DESCRIPTOR_LENGTH))
        {
            descriptor[0] = u8::from(zone.zone_type) & 0x0F;
            descriptor[1] = (u8::from(zone.condition) << 4)
                | (u8::from(zone.non_sequential) << 1)
                | u8::from(zone.reset);
            codec::put_be(&mut descriptor[8..], zone.length, 8);
            codec::put_be(&mut descriptor[16..], zone.start_lba, 8);
            codec::put_be(&mut descriptor[24..], zone.write_pointer, 8);
        }

        data
    }

    fn sequential(start_lba: u64) -> Zone {
        Zone {
            zone_type: ZoneType::SequentialWriteRequired,
            condition: ZoneCondition::Empty,
            reset: false,
            non_sequential: false,
            start_lba,
            length: 0x100,
            write_pointer: start_lba,
        }
    }

    #[test]
    fn layout_test() {
        assert_eq!(
            size_of::<DescriptorHead>(),
            2,
            concat!("Size of: ", stringify!(DescriptorHead))
        );
    }

    #[test]
    fn decodes_every_descriptor_in_order() {
        let zones = (0..4)
            .map(|i| sequential(0x1000 + i * 0x100))
            .collect::<Vec<_>>();
        let data = report(4, 0x1FFF, &zones);

        let (header, decoded) = decode_report(&data, 16).unwrap();
        assert_eq!(header.available_zones(), 4);
        assert_eq!(header.maximum_lba, 0x1FFF);
        assert_eq!(decoded, zones);

        let first = decoded[0];
        assert_eq!(first.start_lba, 0x1000);
        assert_eq!(first.length, 0x100);
        assert_eq!(first.write_pointer, 0x1000);
        assert_eq!(first.zone_type, ZoneType::SequentialWriteRequired);
        assert_eq!(first.condition, ZoneCondition::Empty);
    }

    #[test]
    fn flags_and_conditions() {
        let zones = [
            Zone {
                zone_type: ZoneType::Conventional,
                condition: ZoneCondition::NotWritePointer,
                write_pointer: u64::MAX,
                ..sequential(0)
            },
            Zone {
                zone_type: ZoneType::SequentialWritePreferred,
                condition: ZoneCondition::Closed,
                reset: true,
                non_sequential: true,
                write_pointer: 0x180,
                ..sequential(0x100)
            },
            Zone {
                condition: ZoneCondition::Full,
                write_pointer: 0x300,
                ..sequential(0x200)
            },
        ];

        let (_, decoded) = decode_report(&report(3, 0x2FF, &zones), 3).unwrap();
        assert_eq!(decoded, zones);
        assert!(decoded[1].needs_reset());
        assert!(decoded[1].non_sequential());
        assert!(decoded[2].is_full());
    }

    #[test]
    fn capacity_limits_decoding() {
        let zones = (0..8).map(|i| sequential(i * 0x100)).collect::<Vec<_>>();
        let data = report(8, 0x7FF, &zones);

        let (header, decoded) = decode_report(&data, 3).unwrap();
        assert_eq!(header.available_zones(), 8);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[2].start_lba, 0x200);

        let (_, none) = decode_report(&data, 0).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn device_having_more_than_transferred() {
        let zones = (0..2).map(|i| sequential(i * 0x100)).collect::<Vec<_>>();

        let (header, decoded) = decode_report(&report(100, 0xFFFF, &zones), 50).unwrap();
        assert_eq!(header.available_zones(), 100);
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn trailing_partial_descriptor_is_malformed() {
        let zones = (0..3).map(|i| sequential(i * 0x100)).collect::<Vec<_>>();
        let data = report(3, 0x2FF, &zones);

        assert!(matches!(
            decode_report(&data[..data.len() - 10], 3),
            Err(crate::Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn zone_extent_overflowing_the_lba_space_is_malformed() {
        let zones = [
            sequential(0),
            Zone {
                start_lba: u64::MAX - 0x10,
                write_pointer: u64::MAX - 0x10,
                ..sequential(0)
            },
        ];

        assert!(matches!(
            decode_report(&report(2, u64::MAX, &zones), 2),
            Err(crate::Error::MalformedResponse(_))
        ));

        // Not decoded, not checked.
        let (_, decoded) = decode_report(&report(2, u64::MAX, &zones), 1).unwrap();
        assert_eq!(decoded, zones[..1]);
    }

    #[test]
    fn bad_header_is_malformed() {
        assert!(matches!(
            decode_report(&[0u8; 32], 1),
            Err(crate::Error::MalformedResponse(_))
        ));

        let mut data = report(1, 0xFF, &[sequential(0)]);
        codec::put_be(&mut data[0..], 100, 4);
        assert!(matches!(
            decode_report(&data, 1),
            Err(crate::Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn command_fields() {
        let zones = [sequential(0x4000)];
        let device = device([Reply::with_data(report(1, 0xFFFF, &zones))]);

        let list = device
            .report_zones()
            .start_lba(0x4000)
            .reporting_option(ReportingOption::NeedReset)
            .partial(true)
            .max_zones(4)
            .issue()
            .unwrap();

        assert_eq!(list.zones, zones);
        assert_eq!(list.available, 1);
        assert_eq!(list.start_lba, 0x4000);
        assert_eq!(list.reporting_option, ReportingOption::NeedReset);

        let submitted = &device.transport().submitted()[0];
        assert_eq!(submitted.command[0], 0x95);
        assert_eq!(submitted.command[1], 0x00);
        assert_eq!(codec::get_be(&submitted.command[2..], 8), 0x4000);
        assert_eq!(codec::get_be(&submitted.command[10..], 4), 5 * 64);
        assert_eq!(submitted.command[14], 0x90);
        assert_eq!(submitted.data.len(), 5 * 64);
    }

    #[test]
    fn header_only_request() {
        let device = device([Reply::with_data(report(42, 0xFFFF, &[]))]);

        let list = device.report_zones().max_zones(0).issue().unwrap();
        assert_eq!(list.available, 42);
        assert!(list.is_empty());
    }
}
