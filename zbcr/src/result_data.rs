use std::time::Duration;

use tracing::error;

use crate::command::CommandDefinition;

/// What the pass-through layer reports once a request has completed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// SCSI status byte returned by the device server.
    pub status: u8,
    /// Host adapter (transport) status.
    pub host_status: u16,
    /// Low-level driver status.
    pub driver_status: u16,
    /// Bytes of the data transfer that did not happen.
    pub residual: usize,
    /// Bytes of sense data the adapter wrote.
    pub sense_written: usize,
    pub duration: Duration,
}

impl Completion {
    /// Checks the status tiers in priority order: SCSI status, host adapter, driver.
    /// The first non-zero tier decides the error.
    pub(crate) fn check_status(
        &self,
        device: &str,
        definition: &CommandDefinition,
        sense: &[u8],
    ) -> crate::Result<()> {
        if self.status != 0 {
            error!(
                "{}: Command {} failed with status = {:#04x}",
                device, definition.name, self.status
            );
            log_sense(&sense[..usize::min(self.sense_written, sense.len())]);

            return Err(crate::Error::ScsiStatus {
                command: definition.name,
                status: self.status,
            });
        }

        if self.host_status != 0 {
            error!(
                "{}: Command {} failed with host adapter status = {:#06x}",
                device, definition.name, self.host_status
            );

            return Err(crate::Error::HostStatus {
                command: definition.name,
                status: self.host_status,
            });
        }

        if self.driver_status != 0 {
            error!(
                "{}: Command {} failed with driver status = {:#06x}",
                device, definition.name, self.driver_status
            );

            return Err(crate::Error::DriverStatus {
                command: definition.name,
                status: self.driver_status,
            });
        }

        Ok(())
    }
}

fn log_sense(sense: &[u8]) {
    error!("Sense buffer:");
    for line in sense_lines(sense) {
        error!("{}", line);
    }
}

/// Renders sense bytes as `[offset]: 0x.. 0x.. 0x.. 0x..` lines.
pub(crate) fn sense_lines(sense: &[u8]) -> Vec<String> {
    sense
        .chunks(4)
        .enumerate()
        .map(|(index, group)| {
            let bytes: Vec<String> = group.iter().map(|b| format!("{:#04x}", b)).collect();
            format!("[{:02}]: {}", index * 4, bytes.join(" "))
        })
        .collect()
}
