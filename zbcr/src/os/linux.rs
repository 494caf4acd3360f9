#![allow(dead_code)]

use std::{
    ffi::{c_uint, c_ushort, c_void},
    os::fd::RawFd,
    ptr,
};

use bitflags::bitflags;
use nix::libc;

pub(crate) const SG_IO: u32 = 0x2285;
pub(crate) const SG_GET_VERSION_NUM: u32 = 0x2282;

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct AccessFlags: c_uint {
        const DEFAULT = 0;
        const DIRECT_IO = 1;
        const UNUSED_LUN_INHIBIT = 2;
        const MMAP_IO = 4;
        const NO_DXFER = 0x10000;
        const Q_AT_TAIL = 0x10;
        const Q_AT_HEAD = 0x20;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct AuxiliaryInfo: c_uint {
        const OK = 0;
        const CHECK = 1;
        const DIRECT_IO = 2;
        const MIXED_IO = 4;
    }
}

/// `struct sg_io_hdr` from `<scsi/sg.h>`.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct SgIoHeader {
    pub interface_id: i32,
    pub data_direction: i32,
    pub command_length: u8,
    pub max_sense_buffer_length: u8,
    pub iovec_count: c_ushort,
    pub data_length: c_uint,
    pub data: *mut c_void,
    pub command: *const u8,
    pub sense_buffer: *mut u8,
    pub timeout: c_uint,
    pub flags: AccessFlags,
    pub pack_id: i32,
    pub user_pointer: *mut c_void,
    pub status: u8,
    pub masked_status: u8,
    pub message_status: u8,
    pub sense_buffer_written: u8,
    pub host_status: c_ushort,
    pub driver_status: c_ushort,
    pub residual_count: i32,
    pub duration: c_uint,
    pub info: AuxiliaryInfo,
}

impl Default for SgIoHeader {
    fn default() -> Self {
        Self {
            interface_id: b'S' as i32,
            data_direction: 0,
            command_length: 0,
            max_sense_buffer_length: 0,
            iovec_count: 0,
            data_length: 0,
            data: ptr::null_mut(),
            command: ptr::null(),
            sense_buffer: ptr::null_mut(),
            timeout: 0,
            flags: AccessFlags::DEFAULT,
            pack_id: 0,
            user_pointer: ptr::null_mut(),
            status: 0,
            masked_status: 0,
            message_status: 0,
            sense_buffer_written: 0,
            host_status: 0,
            driver_status: 0,
            residual_count: 0,
            duration: 0,
            info: AuxiliaryInfo::OK,
        }
    }
}

/// # Safety
/// Every pointer in `header` must stay valid for the lengths it advertises until the call returns.
pub(crate) unsafe fn sg_io(fd: RawFd, header: &mut SgIoHeader) -> libc::c_int {
    libc::ioctl(fd, SG_IO as _, header as *mut SgIoHeader)
}

pub(crate) fn sg_version(fd: RawFd) -> std::io::Result<i32> {
    let mut version = 0_i32;
    let result = unsafe { libc::ioctl(fd, SG_GET_VERSION_NUM as _, &mut version as *mut i32) };

    if result != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(version)
}
