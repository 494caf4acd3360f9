use std::{
    alloc::{self, Layout},
    fmt::Debug,
    ptr::NonNull,
    slice,
};

/// Zero-initialized, page-aligned heap buffer.
///
/// SG_FLAG_DIRECT_IO only maps user pages straight into the request when the buffer
/// starts on a page boundary; anything else falls back to a bounce copy in the kernel.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl AlignedBuffer {
    pub fn zeroed(size: usize) -> crate::Result<Self> {
        if size == 0 {
            return Err(crate::Error::InvalidArgument(
                "Invalid 0 output buffer size".to_owned(),
            ));
        }

        let layout = Layout::from_size_align(size, page_size())
            .map_err(|_| crate::Error::OutOfMemory(size))?;
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
            .ok_or(crate::Error::OutOfMemory(size))?;

        #[cfg(test)]
        tracking::allocated();

        Ok(Self { ptr, layout })
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };

        #[cfg(test)]
        tracking::released();
    }
}

impl Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("address", &self.ptr)
            .field("length", &self.len())
            .field("alignment", &self.layout.align())
            .finish()
    }
}

// The buffer is uniquely owned; nothing aliases the pointer.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

/// Data buffer attached to a command: allocated by the command, lent by the caller, or absent.
#[derive(Debug, Default)]
pub enum OutputBuffer<'a> {
    #[default]
    None,
    Owned(AlignedBuffer),
    Borrowed(&'a mut [u8]),
}

impl<'a> OutputBuffer<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            OutputBuffer::None => &[],
            OutputBuffer::Owned(buffer) => buffer.as_slice(),
            OutputBuffer::Borrowed(buffer) => &**buffer,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            OutputBuffer::None => &mut [],
            OutputBuffer::Owned(buffer) => buffer.as_mut_slice(),
            OutputBuffer::Borrowed(buffer) => &mut **buffer,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, OutputBuffer::Owned(_))
    }

    /// Frees an owned buffer, forgets a borrowed one. Calling it again does nothing.
    pub fn release(&mut self) {
        *self = OutputBuffer::None;
    }
}

#[cfg(unix)]
fn page_size() -> usize {
    use nix::libc;

    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => FALLBACK_PAGE_SIZE,
    }
}

#[cfg(not(unix))]
fn page_size() -> usize {
    FALLBACK_PAGE_SIZE
}

const FALLBACK_PAGE_SIZE: usize = 4096;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_aligned_and_zeroed() {
        let buffer = AlignedBuffer::zeroed(3 * 512).unwrap();

        assert_eq!(buffer.len(), 3 * 512);
        assert_eq!(buffer.as_slice().as_ptr() as usize % page_size(), 0);
        assert!(buffer.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            AlignedBuffer::zeroed(0),
            Err(crate::Error::InvalidArgument(_))
        ));
        assert_eq!(tracking::live(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let mut output = OutputBuffer::Owned(AlignedBuffer::zeroed(64).unwrap());
        assert_eq!(tracking::live(), 1);

        output.release();
        assert_eq!(tracking::live(), 0);
        output.release();
        assert_eq!(tracking::live(), 0);
        assert!(output.as_slice().is_empty());
    }

    #[test]
    fn borrowed_buffer_survives_release() {
        let mut storage = vec![0xA5u8; 32];
        let mut output = OutputBuffer::Borrowed(&mut storage[..]);

        output.as_mut_slice()[0] = 0x5A;
        output.release();
        drop(output);

        assert_eq!(storage[0], 0x5A);
        assert!(storage[1..].iter().all(|b| *b == 0xA5));
    }
}
