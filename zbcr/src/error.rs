use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No memory for output buffer ({0} B)")]
    OutOfMemory(usize),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Command {command} failed with status = {status:#04x}")]
    ScsiStatus { command: &'static str, status: u8 },
    #[error("Command {command} failed with host adapter status = {status:#06x}")]
    HostStatus { command: &'static str, status: u16 },
    #[error("Command {command} failed with driver status = {status:#06x}")]
    DriverStatus { command: &'static str, status: u16 },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("{0} is not a SCSI generic capable device")]
    NotScsiDevice(PathBuf),
}

impl Error {
    /// The POSIX error code a C caller of the library would have seen.
    #[cfg(unix)]
    pub fn errno(&self) -> nix::errno::Errno {
        use nix::errno::Errno;

        match self {
            Error::InvalidArgument(_) => Errno::EINVAL,
            Error::OutOfMemory(_) => Errno::ENOMEM,
            Error::Io(e) => e.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO),
            Error::NotScsiDevice(_) => Errno::ENXIO,
            Error::ScsiStatus { .. }
            | Error::HostStatus { .. }
            | Error::DriverStatus { .. }
            | Error::MalformedResponse(_) => Errno::EIO,
        }
    }

    /// Failures raised below the device server (submission, host adapter, low-level driver).
    /// Retrying those may succeed; a SCSI status failure is the device's answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::HostStatus { .. } | Error::DriverStatus { .. }
        )
    }
}
