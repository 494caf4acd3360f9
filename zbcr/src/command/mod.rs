pub mod inquiry;
pub mod read;
pub mod read_capacity;
pub mod report_zones;
pub mod reset_write_pointer;
pub mod set_write_pointer;
pub mod set_zones;
mod sg_command;
pub mod synchronize_cache;
pub mod write;

pub use sg_command::{SgCommand, DEFAULT_TIMEOUT, SENSE_MAX_LENGTH};

/// Longest CDB the pass-through path accepts.
pub const MAX_CDB_LENGTH: usize = 16;

/// Index into the command table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CommandCode {
    Inquiry = 0,
    ReadCapacity,
    Read,
    Write,
    SynchronizeCache,
    ReportZones,
    ResetWritePointer,
    SetZones,
    SetWritePointer,
}

pub const COMMAND_COUNT: usize = 9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub operation_code: u8,
    /// 0 for commands without a service action.
    pub service_action: u8,
    pub cdb_length: usize,
}

static COMMANDS: [CommandDefinition; COMMAND_COUNT] = [
    CommandDefinition {
        name: "INQUIRY",
        operation_code: 0x12,
        service_action: 0,
        cdb_length: 6,
    },
    CommandDefinition {
        name: "READ CAPACITY 16",
        operation_code: 0x9E,
        service_action: 0x10,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "READ 16",
        operation_code: 0x88,
        service_action: 0,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "WRITE 16",
        operation_code: 0x8A,
        service_action: 0,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "SYNCHRONIZE CACHE 16",
        operation_code: 0x91,
        service_action: 0,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "REPORT ZONES",
        operation_code: 0x95,
        service_action: 0x00,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "RESET WRITE POINTER",
        operation_code: 0x94,
        service_action: 0x04,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "SET ZONES",
        operation_code: 0x9F,
        service_action: 0x15,
        cdb_length: 16,
    },
    CommandDefinition {
        name: "SET WRITE POINTER",
        operation_code: 0x9F,
        service_action: 0x16,
        cdb_length: 16,
    },
];

impl CommandCode {
    pub const ALL: [CommandCode; COMMAND_COUNT] = [
        CommandCode::Inquiry,
        CommandCode::ReadCapacity,
        CommandCode::Read,
        CommandCode::Write,
        CommandCode::SynchronizeCache,
        CommandCode::ReportZones,
        CommandCode::ResetWritePointer,
        CommandCode::SetZones,
        CommandCode::SetWritePointer,
    ];

    pub fn definition(self) -> &'static CommandDefinition {
        &COMMANDS[self as usize]
    }
}

impl TryFrom<i32> for CommandCode {
    type Error = crate::Error;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|index| CommandCode::ALL.get(index).copied())
            .ok_or_else(|| {
                crate::Error::InvalidArgument(format!("Invalid command specified ({})", value))
            })
    }
}

/// Looks up a command definition by its raw table index.
pub fn lookup(id: i32) -> crate::Result<&'static CommandDefinition> {
    CommandCode::try_from(id).map(CommandCode::definition)
}

pub(crate) fn get_array<const N: usize>(bytes: &[u8]) -> ([u8; N], &[u8]) {
    let mut array: [u8; N] = [0; N];
    let min_len = usize::min(array.len(), bytes.len());
    array[..min_len].copy_from_slice(&bytes[..min_len]);

    (array, &bytes[min_len..])
}

macro_rules! bitfield_bound_check {
    ( $num:expr, $bit_count:expr, $name:literal ) => {
        if std::mem::size_of_val(&$num) as u32 * 8 - $num.leading_zeros() > $bit_count {
            Err(crate::Error::InvalidArgument(format!(
                concat!(
                    $name,
                    " is out of bounds. The maximum possible value is {}, but {} was provided."
                ),
                1u128.wrapping_shl($bit_count) - 1,
                $num
            )))
        } else {
            Ok(())
        }
    };
}

pub(crate) use bitfield_bound_check;
