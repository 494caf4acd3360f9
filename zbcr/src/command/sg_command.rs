use std::time::Duration;

use crate::{
    command::{CommandCode, CommandDefinition, MAX_CDB_LENGTH},
    data_wrapper::{AlignedBuffer, OutputBuffer},
    transport::Request,
    DataDirection,
};

/// Largest sense buffer handed to the pass-through layer.
pub const SENSE_MAX_LENGTH: usize = 64;

/// Upper bound for a single command; zone resets on large drives take seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// State for exactly one command/response cycle.
///
/// The CDB arrives pre-filled with the operation code and, where the command has one,
/// the service action. Operands are written through [`SgCommand::cdb_mut`].
#[derive(Debug)]
pub struct SgCommand<'a> {
    code: CommandCode,
    operation_code: u8,
    service_action: u8,
    cdb: [u8; MAX_CDB_LENGTH],
    cdb_length: usize,
    output: OutputBuffer<'a>,
    output_size: usize,
    sense: [u8; SENSE_MAX_LENGTH],
    direction: DataDirection,
    timeout: Duration,
}

impl<'a> SgCommand<'a> {
    /// A command that moves no data.
    pub fn new(code: CommandCode) -> Self {
        let definition = code.definition();
        let mut cdb = [0; MAX_CDB_LENGTH];
        cdb[0] = definition.operation_code;
        if definition.service_action != 0 {
            cdb[1] = definition.service_action & 0x1F;
        }

        Self {
            code,
            operation_code: definition.operation_code,
            service_action: definition.service_action,
            cdb,
            cdb_length: definition.cdb_length,
            output: OutputBuffer::None,
            output_size: 0,
            sense: [0; SENSE_MAX_LENGTH],
            direction: DataDirection::FromDevice,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A command with a zeroed, page-aligned data buffer of `size` bytes.
    pub fn with_allocation(code: CommandCode, size: usize) -> crate::Result<Self> {
        let buffer = AlignedBuffer::zeroed(size)?;

        let mut command = Self::new(code);
        command.output = OutputBuffer::Owned(buffer);
        command.output_size = size;

        Ok(command)
    }

    /// A command that transfers into (or out of) `buffer`. The buffer stays the caller's.
    pub fn with_buffer(code: CommandCode, buffer: &'a mut [u8]) -> crate::Result<Self> {
        if buffer.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "Invalid 0 output buffer size".to_owned(),
            ));
        }

        let mut command = Self::new(code);
        command.output_size = buffer.len();
        command.output = OutputBuffer::Borrowed(buffer);

        Ok(command)
    }

    /// Raw-index constructor: `buffer` is used when given (first `size` bytes), otherwise
    /// `size` bytes are allocated. `size == 0` without a buffer means no data phase.
    pub fn create(id: i32, buffer: Option<&'a mut [u8]>, size: usize) -> crate::Result<Self> {
        let code = CommandCode::try_from(id)?;

        match buffer {
            Some(buffer) => {
                if size > buffer.len() {
                    return Err(crate::Error::InvalidArgument(format!(
                        "output buffer size {} exceeds the supplied {} bytes",
                        size,
                        buffer.len()
                    )));
                }
                Self::with_buffer(code, &mut buffer[..size])
            }
            None if size == 0 => Ok(Self::new(code)),
            None => Self::with_allocation(code, size),
        }
    }

    pub fn code(&self) -> CommandCode {
        self.code
    }

    pub fn definition(&self) -> &'static CommandDefinition {
        self.code.definition()
    }

    pub fn operation_code(&self) -> u8 {
        self.operation_code
    }

    pub fn service_action(&self) -> u8 {
        self.service_action
    }

    pub fn cdb(&self) -> &[u8] {
        &self.cdb[..self.cdb_length]
    }

    pub fn cdb_mut(&mut self) -> &mut [u8] {
        &mut self.cdb[..self.cdb_length]
    }

    pub fn direction(&self) -> DataDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: DataDirection) -> &mut Self {
        self.direction = direction;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Valid bytes of the data buffer. After execution this excludes the residual.
    pub fn data(&self) -> &[u8] {
        &self.output.as_slice()[..self.output_size]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.output.as_mut_slice()[..self.output_size]
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn owns_buffer(&self) -> bool {
        self.output.is_owned()
    }

    pub fn sense(&self) -> &[u8] {
        &self.sense
    }

    /// Releases the data buffer if the command allocated it. A borrowed buffer is
    /// left alone. Safe to call more than once.
    pub fn destroy(&mut self) {
        self.output.release();
        self.output_size = 0;
    }

    pub(crate) fn request(&mut self) -> Request<'_> {
        let data_length = match self.direction {
            DataDirection::None => 0,
            _ => self.output_size,
        };

        Request {
            command: &self.cdb[..self.cdb_length],
            direction: self.direction,
            data: &mut self.output.as_mut_slice()[..data_length],
            sense: &mut self.sense,
            timeout: self.timeout,
        }
    }

    pub(crate) fn shrink_output(&mut self, residual: usize) {
        self.output_size = self.output_size.saturating_sub(residual);
    }
}
