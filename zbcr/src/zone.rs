use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneType {
    Conventional,
    SequentialWriteRequired,
    SequentialWritePreferred,
    Other(u8),
}

impl From<u8> for ZoneType {
    fn from(value: u8) -> Self {
        match value {
            0x1 => ZoneType::Conventional,
            0x2 => ZoneType::SequentialWriteRequired,
            0x3 => ZoneType::SequentialWritePreferred,
            other => ZoneType::Other(other),
        }
    }
}

impl From<ZoneType> for u8 {
    fn from(value: ZoneType) -> Self {
        match value {
            ZoneType::Conventional => 0x1,
            ZoneType::SequentialWriteRequired => 0x2,
            ZoneType::SequentialWritePreferred => 0x3,
            ZoneType::Other(other) => other,
        }
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneType::Conventional => f.write_str("Conventional"),
            ZoneType::SequentialWriteRequired => f.write_str("Sequential-write-required"),
            ZoneType::SequentialWritePreferred => f.write_str("Sequential-write-preferred"),
            ZoneType::Other(value) => write!(f, "Unknown-type ({:#x})", value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneCondition {
    /// Conventional zones have no write pointer and report this condition.
    NotWritePointer,
    Empty,
    ImplicitOpen,
    ExplicitOpen,
    Closed,
    Inactive,
    ReadOnly,
    Full,
    Offline,
    Other(u8),
}

impl From<u8> for ZoneCondition {
    fn from(value: u8) -> Self {
        match value {
            0x0 => ZoneCondition::NotWritePointer,
            0x1 => ZoneCondition::Empty,
            0x2 => ZoneCondition::ImplicitOpen,
            0x3 => ZoneCondition::ExplicitOpen,
            0x4 => ZoneCondition::Closed,
            0x5 => ZoneCondition::Inactive,
            0xD => ZoneCondition::ReadOnly,
            0xE => ZoneCondition::Full,
            0xF => ZoneCondition::Offline,
            other => ZoneCondition::Other(other),
        }
    }
}

impl From<ZoneCondition> for u8 {
    fn from(value: ZoneCondition) -> Self {
        match value {
            ZoneCondition::NotWritePointer => 0x0,
            ZoneCondition::Empty => 0x1,
            ZoneCondition::ImplicitOpen => 0x2,
            ZoneCondition::ExplicitOpen => 0x3,
            ZoneCondition::Closed => 0x4,
            ZoneCondition::Inactive => 0x5,
            ZoneCondition::ReadOnly => 0xD,
            ZoneCondition::Full => 0xE,
            ZoneCondition::Offline => 0xF,
            ZoneCondition::Other(other) => other,
        }
    }
}

impl fmt::Display for ZoneCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneCondition::NotWritePointer => f.write_str("Not-write-pointer"),
            ZoneCondition::Empty => f.write_str("Empty"),
            ZoneCondition::ImplicitOpen => f.write_str("Implicit-open"),
            ZoneCondition::ExplicitOpen => f.write_str("Explicit-open"),
            ZoneCondition::Closed => f.write_str("Closed"),
            ZoneCondition::Inactive => f.write_str("Inactive"),
            ZoneCondition::ReadOnly => f.write_str("Read-only"),
            ZoneCondition::Full => f.write_str("Full"),
            ZoneCondition::Offline => f.write_str("Offline"),
            ZoneCondition::Other(value) => write!(f, "Unknown-cond ({:#x})", value),
        }
    }
}

/// Filter applied by the device to a REPORT ZONES request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReportingOption {
    #[default]
    All,
    Empty,
    ImplicitOpen,
    ExplicitOpen,
    Closed,
    Full,
    ReadOnly,
    Offline,
    NeedReset,
    NonSequential,
    NotWritePointer,
}

impl From<ReportingOption> for u8 {
    fn from(value: ReportingOption) -> Self {
        match value {
            ReportingOption::All => 0x00,
            ReportingOption::Empty => 0x01,
            ReportingOption::ImplicitOpen => 0x02,
            ReportingOption::ExplicitOpen => 0x03,
            ReportingOption::Closed => 0x04,
            ReportingOption::Full => 0x05,
            ReportingOption::ReadOnly => 0x06,
            ReportingOption::Offline => 0x07,
            ReportingOption::NeedReset => 0x10,
            ReportingOption::NonSequential => 0x11,
            ReportingOption::NotWritePointer => 0x3F,
        }
    }
}

/// One zone as reported by the device.
///
/// For sequential zones `start_lba <= write_pointer <= start_lba + length`, and the
/// pointer sits at the end exactly when the zone is full. Conventional zones carry
/// no meaningful write pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub zone_type: ZoneType,
    pub condition: ZoneCondition,
    pub reset: bool,
    pub non_sequential: bool,
    pub start_lba: u64,
    pub length: u64,
    pub write_pointer: u64,
}

impl Zone {
    pub fn is_conventional(&self) -> bool {
        self.zone_type == ZoneType::Conventional
    }

    pub fn is_sequential_required(&self) -> bool {
        self.zone_type == ZoneType::SequentialWriteRequired
    }

    pub fn is_sequential_preferred(&self) -> bool {
        self.zone_type == ZoneType::SequentialWritePreferred
    }

    pub fn is_sequential(&self) -> bool {
        self.is_sequential_required() || self.is_sequential_preferred()
    }

    pub fn is_empty(&self) -> bool {
        self.condition == ZoneCondition::Empty
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.condition,
            ZoneCondition::ImplicitOpen | ZoneCondition::ExplicitOpen
        )
    }

    pub fn is_full(&self) -> bool {
        self.condition == ZoneCondition::Full
    }

    pub fn needs_reset(&self) -> bool {
        self.reset
    }

    pub fn non_sequential(&self) -> bool {
        self.non_sequential
    }

    /// First LBA past the zone, saturating at `u64::MAX`.
    pub fn end_lba(&self) -> u64 {
        self.start_lba.saturating_add(self.length)
    }

    /// Blocks that can still be written at the write pointer. Conventional zones
    /// are never pointer-limited and report their whole length.
    pub fn remaining_blocks(&self) -> u64 {
        if self.is_sequential() {
            self.end_lba().saturating_sub(self.write_pointer)
        } else {
            self.length
        }
    }

    /// Offset of the write pointer from the zone start.
    pub fn write_pointer_offset(&self) -> u64 {
        self.write_pointer.saturating_sub(self.start_lba)
    }

    /// Whether the write pointer and the condition agree.
    pub fn is_consistent(&self) -> bool {
        if !self.is_sequential() {
            return true;
        }

        let in_range = (self.start_lba..=self.end_lba()).contains(&self.write_pointer);
        let at_end = self.write_pointer == self.end_lba();

        in_range && at_end == self.is_full()
    }

    /// Checks that `blocks` blocks may be written `offset` blocks into the zone.
    pub fn check_write(&self, offset: u64, blocks: u64) -> crate::Result<()> {
        match self.condition {
            ZoneCondition::ReadOnly | ZoneCondition::Offline | ZoneCondition::Inactive => {
                return Err(crate::Error::InvalidArgument(format!(
                    "zone at LBA {} is {}",
                    self.start_lba, self.condition
                )));
            }
            _ => {}
        }

        if offset
            .checked_add(blocks)
            .map_or(true, |end| end > self.length)
        {
            return Err(crate::Error::InvalidArgument(format!(
                "write of {} blocks at offset {} crosses the end of zone at LBA {} ({} blocks)",
                blocks, offset, self.start_lba, self.length
            )));
        }

        if self.is_sequential() {
            if self.is_full() {
                return Err(crate::Error::InvalidArgument(format!(
                    "zone at LBA {} is full",
                    self.start_lba
                )));
            }

            if offset != self.write_pointer_offset() {
                return Err(crate::Error::InvalidArgument(format!(
                    "unaligned write at offset {} of zone at LBA {} (write pointer offset {})",
                    offset,
                    self.start_lba,
                    self.write_pointer_offset()
                )));
            }
        }

        Ok(())
    }

    /// Applies a completed write of `blocks` blocks at the write pointer.
    ///
    /// Empty and closed zones become implicitly open, an explicitly open zone stays
    /// explicitly open, and a zone whose pointer reaches the end becomes full.
    /// Conventional zones are unaffected.
    pub fn record_write(&mut self, blocks: u64) -> crate::Result<()> {
        if !self.is_sequential() {
            return self.check_write(0, blocks);
        }

        self.check_write(self.write_pointer_offset(), blocks)?;

        if blocks == 0 {
            return Ok(());
        }

        self.write_pointer = self.write_pointer.checked_add(blocks).ok_or_else(|| {
            crate::Error::InvalidArgument(format!(
                "write of {} blocks moves the write pointer {} past the last LBA",
                blocks, self.write_pointer
            ))
        })?;
        self.condition = if self.write_pointer == self.end_lba() {
            ZoneCondition::Full
        } else {
            match self.condition {
                ZoneCondition::ExplicitOpen => ZoneCondition::ExplicitOpen,
                _ => ZoneCondition::ImplicitOpen,
            }
        };

        Ok(())
    }

    /// Applies a completed write pointer reset: empty, pointer back at the start.
    pub fn record_reset(&mut self) -> crate::Result<()> {
        if !self.is_sequential() {
            return Err(crate::Error::InvalidArgument(format!(
                "zone at LBA {} is {} and has no write pointer",
                self.start_lba, self.zone_type
            )));
        }

        match self.condition {
            ZoneCondition::ReadOnly | ZoneCondition::Offline | ZoneCondition::Inactive => {
                Err(crate::Error::InvalidArgument(format!(
                    "zone at LBA {} is {}",
                    self.start_lba, self.condition
                )))
            }
            _ => {
                self.condition = ZoneCondition::Empty;
                self.write_pointer = self.start_lba;
                self.reset = false;
                self.non_sequential = false;

                Ok(())
            }
        }
    }
}

/// Zones returned by one report (or a run of paginated reports), in ascending LBA order.
///
/// The list is a snapshot: after a write or reset it is replaced by reporting again,
/// never patched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneList {
    pub reporting_option: ReportingOption,
    pub start_lba: u64,
    /// Number of matching zones the device said it had, which may exceed `zones.len()`.
    pub available: usize,
    pub maximum_lba: u64,
    pub zones: Vec<Zone>,
}

impl ZoneList {
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    /// The zone starting exactly at `start_lba`.
    pub fn find(&self, start_lba: u64) -> Option<&Zone> {
        self.zones
            .binary_search_by_key(&start_lba, |zone| zone.start_lba)
            .ok()
            .map(|index| &self.zones[index])
    }

    /// The zone containing `lba`.
    pub fn containing(&self, lba: u64) -> Option<&Zone> {
        let index = self.zones.partition_point(|zone| zone.start_lba <= lba);
        index
            .checked_sub(1)
            .map(|index| &self.zones[index])
            .filter(|zone| lba < zone.end_lba())
    }
}

impl<'a> IntoIterator for &'a ZoneList {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.zones.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(start_lba: u64, length: u64) -> Zone {
        Zone {
            zone_type: ZoneType::SequentialWriteRequired,
            condition: ZoneCondition::Empty,
            reset: false,
            non_sequential: false,
            start_lba,
            length,
            write_pointer: start_lba,
        }
    }

    #[test]
    fn fill_then_reset() {
        let mut zone = sequential(0x1000, 100);

        zone.record_write(100).unwrap();
        assert_eq!(zone.condition, ZoneCondition::Full);
        assert_eq!(zone.write_pointer, 0x1000 + 100);
        assert!(zone.is_consistent());

        zone.record_reset().unwrap();
        assert_eq!(zone.condition, ZoneCondition::Empty);
        assert_eq!(zone.write_pointer, 0x1000);
        assert!(zone.is_consistent());
    }

    #[test]
    fn partial_writes_open_implicitly() {
        let mut zone = sequential(0, 100);

        zone.record_write(10).unwrap();
        assert_eq!(zone.condition, ZoneCondition::ImplicitOpen);
        assert_eq!(zone.write_pointer, 10);
        assert_eq!(zone.remaining_blocks(), 90);

        zone.condition = ZoneCondition::Closed;
        zone.record_write(5).unwrap();
        assert_eq!(zone.condition, ZoneCondition::ImplicitOpen);

        zone.condition = ZoneCondition::ExplicitOpen;
        zone.record_write(5).unwrap();
        assert_eq!(zone.condition, ZoneCondition::ExplicitOpen);
        assert_eq!(zone.write_pointer, 20);

        zone.record_write(80).unwrap();
        assert!(zone.is_full());
        assert!(zone.is_consistent());
    }

    #[test]
    fn writes_past_the_end_or_into_full_zones_fail() {
        let mut zone = sequential(0, 100);
        zone.record_write(60).unwrap();

        assert!(matches!(
            zone.record_write(41),
            Err(crate::Error::InvalidArgument(_))
        ));
        assert_eq!(zone.write_pointer, 60);

        zone.record_write(40).unwrap();
        assert!(zone.record_write(1).is_err());
        assert!(zone.check_write(100, 0).is_err());
    }

    #[test]
    fn sequential_writes_must_start_at_the_pointer() {
        let mut zone = sequential(0, 100);
        zone.record_write(10).unwrap();

        assert!(zone.check_write(10, 5).is_ok());
        assert!(zone.check_write(0, 5).is_err());
        assert!(zone.check_write(11, 5).is_err());
    }

    #[test]
    fn unwritable_conditions() {
        for condition in [
            ZoneCondition::ReadOnly,
            ZoneCondition::Offline,
            ZoneCondition::Inactive,
        ] {
            let mut zone = Zone {
                condition,
                ..sequential(0, 100)
            };
            assert!(zone.record_write(1).is_err());
            assert!(zone.record_reset().is_err());
            assert_eq!(zone.condition, condition);
        }
    }

    #[test]
    fn conventional_zones_ignore_the_pointer() {
        let mut zone = Zone {
            zone_type: ZoneType::Conventional,
            condition: ZoneCondition::NotWritePointer,
            write_pointer: u64::MAX,
            ..sequential(0, 100)
        };

        assert!(zone.is_consistent());
        assert!(zone.check_write(50, 50).is_ok());
        assert!(zone.check_write(50, 51).is_err());
        zone.record_write(0).unwrap();
        assert_eq!(zone.condition, ZoneCondition::NotWritePointer);
        assert_eq!(zone.remaining_blocks(), 100);
        assert!(zone.record_reset().is_err());
    }

    #[test]
    fn reset_clears_flags() {
        let mut zone = Zone {
            zone_type: ZoneType::SequentialWritePreferred,
            condition: ZoneCondition::Closed,
            reset: true,
            non_sequential: true,
            write_pointer: 40,
            ..sequential(0, 100)
        };

        zone.record_reset().unwrap();
        assert!(!zone.needs_reset());
        assert!(!zone.non_sequential());
        assert!(zone.is_empty());
    }

    #[test]
    fn inconsistent_descriptors_are_detected() {
        let full_but_short = Zone {
            condition: ZoneCondition::Full,
            write_pointer: 50,
            ..sequential(0, 100)
        };
        let pointer_at_end_not_full = Zone {
            condition: ZoneCondition::ImplicitOpen,
            write_pointer: 100,
            ..sequential(0, 100)
        };
        let pointer_outside = Zone {
            write_pointer: 200,
            ..sequential(0, 100)
        };

        assert!(!full_but_short.is_consistent());
        assert!(!pointer_at_end_not_full.is_consistent());
        assert!(!pointer_outside.is_consistent());
    }

    #[test]
    fn lookups_in_a_list() {
        let list = ZoneList {
            zones: vec![sequential(0, 100), sequential(100, 100), sequential(300, 50)],
            ..Default::default()
        };

        assert_eq!(list.find(100).map(|z| z.start_lba), Some(100));
        assert!(list.find(150).is_none());
        assert_eq!(list.containing(150).map(|z| z.start_lba), Some(100));
        assert!(list.containing(250).is_none());
        assert_eq!(list.containing(349).map(|z| z.start_lba), Some(300));
        assert!(list.containing(350).is_none());
        assert_eq!((&list).into_iter().count(), 3);
    }

    #[test]
    fn zone_at_the_top_of_the_lba_space() {
        let zone = sequential(u64::MAX - 0x10, 0x100);

        assert_eq!(zone.end_lba(), u64::MAX);
        assert_eq!(zone.remaining_blocks(), 0x10);
        assert!(zone.is_consistent());

        let list = ZoneList {
            zones: vec![zone],
            ..Default::default()
        };
        assert!(list.containing(u64::MAX - 1).is_some());
    }

    #[test]
    fn display_names() {
        assert_eq!(
            ZoneType::SequentialWriteRequired.to_string(),
            "Sequential-write-required"
        );
        assert_eq!(ZoneCondition::from(0xE).to_string(), "Full");
        assert_eq!(ZoneCondition::from(0x9), ZoneCondition::Other(0x9));
        assert_eq!(u8::from(ReportingOption::NotWritePointer), 0x3F);
    }
}
