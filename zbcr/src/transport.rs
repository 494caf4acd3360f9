use std::{io, time::Duration};

use crate::{result_data::Completion, DataDirection};

/// One request as the pass-through layer sees it. Everything is borrowed from the
/// command object for the duration of the submission.
#[derive(Debug)]
pub struct Request<'a> {
    pub command: &'a [u8],
    pub direction: DataDirection,
    pub data: &'a mut [u8],
    pub sense: &'a mut [u8],
    pub timeout: Duration,
}

/// A device handle able to run one SCSI command at a time.
///
/// Implementations block until the device completes the request or the timeout expires.
/// Callers must serialize submissions on a handle.
pub trait PassThrough {
    /// Name used in diagnostics, usually the device path.
    fn name(&self) -> &str;

    /// Submits the request. `Err` means the request never reached the device;
    /// command failures are reported through the returned [`Completion`].
    fn submit(&self, request: Request<'_>) -> io::Result<Completion>;
}

impl<T: PassThrough + ?Sized> PassThrough for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn submit(&self, request: Request<'_>) -> io::Result<Completion> {
        (**self).submit(request)
    }
}

#[cfg(target_os = "linux")]
pub use self::linux::SgTransport;

#[cfg(target_os = "linux")]
mod linux {
    use std::{
        fs::{File, OpenOptions},
        io,
        os::{
            fd::AsRawFd,
            unix::fs::{FileTypeExt, OpenOptionsExt},
        },
        path::{Path, PathBuf},
        time::Duration,
    };

    use nix::libc;

    use super::{PassThrough, Request};
    use crate::{
        os::linux::{self, AccessFlags, SgIoHeader},
        result_data::Completion,
    };

    /// SCSI generic pass-through on a Linux block (`/dev/sdX`) or sg (`/dev/sgN`) node.
    #[derive(Debug)]
    pub struct SgTransport {
        path: PathBuf,
        name: String,
        file: File,
    }

    impl SgTransport {
        pub fn open<P: AsRef<Path> + ?Sized>(path: &P, writable: bool) -> crate::Result<Self> {
            let mut options = OpenOptions::new();
            options
                .read(true)
                .write(writable)
                .custom_flags(libc::O_LARGEFILE);
            let file = options.open(path)?;

            let file_type = file.metadata()?.file_type();
            if !file_type.is_block_device() && !file_type.is_char_device() {
                return Err(crate::Error::NotScsiDevice(path.as_ref().to_owned()));
            }

            if linux::sg_version(file.as_raw_fd())? < 30000 {
                return Err(crate::Error::NotScsiDevice(path.as_ref().to_owned()));
            }

            Ok(Self {
                path: path.as_ref().to_owned(),
                name: path.as_ref().display().to_string(),
                file,
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl PassThrough for SgTransport {
        fn name(&self) -> &str {
            &self.name
        }

        fn submit(&self, request: Request<'_>) -> io::Result<Completion> {
            let Request {
                command,
                direction,
                data,
                sense,
                timeout,
            } = request;

            let data_length = u32::try_from(data.len()).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "data buffer exceeds 4 GiB")
            })?;

            let mut header = SgIoHeader {
                data_direction: direction.into(),
                command_length: command.len() as u8,
                max_sense_buffer_length: sense.len().min(u8::MAX as usize) as u8,
                data_length,
                data: if data.is_empty() {
                    std::ptr::null_mut()
                } else {
                    data.as_mut_ptr().cast()
                },
                command: command.as_ptr(),
                sense_buffer: sense.as_mut_ptr(),
                timeout: timeout.as_millis().clamp(u32::MIN as u128, u32::MAX as u128) as u32,
                flags: AccessFlags::DIRECT_IO,
                ..Default::default()
            };

            let result = unsafe { linux::sg_io(self.file.as_raw_fd(), &mut header) };
            if result != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Completion {
                status: header.status,
                host_status: header.host_status,
                driver_status: header.driver_status,
                residual: header.residual_count.max(0) as usize,
                sense_written: header.sense_buffer_written as usize,
                duration: Duration::from_millis(header.duration.into()),
            })
        }
    }
}
