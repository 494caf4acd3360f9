// modular_bitfield_msb generates fields that trip unused_parens; keep this crate clean.
#![allow(unused_parens)]

pub mod codec;
pub mod command;
mod data_direction;
mod data_wrapper;
mod device;
mod error;
mod exec;
mod os;
mod result_data;
mod transport;
mod zone;

pub use command::report_zones::{decode_report, ReportHeader};
pub use command::reset_write_pointer::ALL_ZONES;
pub use command::inquiry::DeviceModel;
pub use command::{lookup, CommandCode, CommandDefinition, SgCommand};
pub use data_direction::DataDirection;
pub use device::{DeviceInfo, ZbcDevice};
pub use error::{Error, Result};
pub use exec::execute;
pub use result_data::Completion;
#[cfg(target_os = "linux")]
pub use transport::SgTransport;
pub use transport::{PassThrough, Request};
pub use zone::{ReportingOption, Zone, ZoneCondition, ZoneList, ZoneType};
