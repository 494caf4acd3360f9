#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataDirection {
    None,
    ToDevice,
    #[default]
    FromDevice,
    ToFromDevice,
    Unknown,
}

impl From<DataDirection> for i32 {
    /// SG_DXFER_* values from `<scsi/sg.h>`.
    fn from(value: DataDirection) -> Self {
        match value {
            DataDirection::None => -1,
            DataDirection::ToDevice => -2,
            DataDirection::FromDevice => -3,
            DataDirection::ToFromDevice => -4,
            DataDirection::Unknown => -5,
        }
    }
}
