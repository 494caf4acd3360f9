use tracing::{debug, enabled, error, Level};

use crate::{command::SgCommand, transport::PassThrough};

/// Runs one command on `device` and leaves the response in the command's data buffer.
///
/// A short transfer is not an error: the command's [`output_size`](SgCommand::output_size)
/// drops by the residual and only that many bytes are valid. Callers decoding a response
/// must go by that size, since a truncated read is otherwise indistinguishable from a
/// complete one.
pub fn execute<T: PassThrough + ?Sized>(device: &T, command: &mut SgCommand<'_>) -> crate::Result<()> {
    let definition = command.definition();

    if enabled!(Level::DEBUG) {
        debug!("*****************************************");
        debug!(
            "* Sending cmd {:#04x}:{:#04x} ({}) to device {}:",
            command.operation_code(),
            command.service_action(),
            definition.name,
            device.name()
        );
        for line in cdb_table(command.cdb()) {
            debug!("{}", line);
        }
        debug!("*****************************************");
    }

    let completion = device.submit(command.request()).map_err(|e| {
        error!("{}: SG_IO ioctl failed: {}", device.name(), e);
        crate::Error::Io(e)
    })?;

    completion.check_status(device.name(), definition, command.sense())?;

    if completion.residual != 0 {
        debug!(
            "{}: Transfer missing {} B of data",
            device.name(),
            completion.residual
        );
        command.shrink_output(completion.residual);
    }

    debug!(
        "{}: Command {} executed in {} ms",
        device.name(),
        definition.name,
        completion.duration.as_millis()
    );

    Ok(())
}

/// Four bytes per row, the byte offset of the row's end on the left.
pub(crate) fn cdb_table(cdb: &[u8]) -> Vec<String> {
    let mut lines = vec![
        "* +==================================".to_owned(),
        "* |Byte |   0  |  1   |  2   |  3   |".to_owned(),
        "* |=====+======+======+======+======+".to_owned(),
    ];

    let rows = cdb.chunks(4).count();
    for (index, row) in cdb.chunks(4).enumerate() {
        let mut cells = String::new();
        for column in 0..4 {
            match row.get(column) {
                Some(byte) => cells.push_str(&format!(" {:#04x} |", byte)),
                None => cells.push_str("      |"),
            }
        }
        lines.push(format!("* | {:3} |{}", (index + 1) * 4, cells));

        if index + 1 < rows {
            lines.push("* |=====+======+======+======+======+".to_owned());
        }
    }
    lines.push("* +==================================".to_owned());

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::CommandCode,
        result_data::Completion,
        transport::mock::{MockTransport, Reply},
        DataDirection,
    };

    #[test]
    fn residual_shrinks_output() {
        let device = MockTransport::new([Reply {
            data: vec![0xEE; 4096],
            completion: Completion {
                residual: 1000,
                ..Default::default()
            },
            ..Default::default()
        }]);

        let mut command = SgCommand::with_allocation(CommandCode::ReportZones, 4096).unwrap();
        execute(&device, &mut command).unwrap();

        assert_eq!(command.output_size(), 3096);
        assert_eq!(command.data().len(), 3096);
    }

    #[test]
    fn host_failure_after_good_scsi_status() {
        let device = MockTransport::new([Reply {
            completion: Completion {
                host_status: 0x03,
                ..Default::default()
            },
            ..Default::default()
        }]);

        let mut command = SgCommand::new(CommandCode::ResetWritePointer);
        let error = execute(&device, &mut command).unwrap_err();

        assert!(matches!(
            error,
            crate::Error::HostStatus {
                command: "RESET WRITE POINTER",
                status: 0x03
            }
        ));
        assert!(error.is_transport());
    }

    #[test]
    fn scsi_status_reported_regardless_of_other_tiers() {
        let device = MockTransport::new([Reply {
            sense: vec![0x72, 0x05, 0x21, 0x04, 0, 0, 0, 0],
            completion: Completion {
                status: 0x02,
                host_status: 0x07,
                driver_status: 0x08,
                residual: 64,
                ..Default::default()
            },
            ..Default::default()
        }]);

        let mut command = SgCommand::with_allocation(CommandCode::ReportZones, 128).unwrap();
        let error = execute(&device, &mut command).unwrap_err();

        assert!(matches!(error, crate::Error::ScsiStatus { status: 0x02, .. }));
        assert_eq!(command.output_size(), 128);
        assert_eq!(&command.sense()[..4], &[0x72, 0x05, 0x21, 0x04]);
    }

    #[test]
    fn submission_failure_keeps_os_error() {
        let device = MockTransport::new([Reply {
            os_error: Some(16),
            ..Default::default()
        }]);

        let mut command = SgCommand::new(CommandCode::SynchronizeCache);
        match execute(&device, &mut command) {
            Err(crate::Error::Io(e)) => assert_eq!(e.raw_os_error(), Some(16)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn request_carries_command_fields() {
        let device = MockTransport::new([Reply::ok()]);

        let mut command = SgCommand::with_allocation(CommandCode::Write, 512).unwrap();
        command.set_direction(DataDirection::ToDevice);
        command.data_mut().fill(0x5A);
        command.cdb_mut()[13] = 1;
        execute(&device, &mut command).unwrap();

        let submitted = &device.submitted()[0];
        assert_eq!(submitted.command.len(), 16);
        assert_eq!(submitted.command[0], 0x8A);
        assert_eq!(submitted.command[13], 1);
        assert_eq!(submitted.direction, DataDirection::ToDevice);
        assert_eq!(submitted.data, vec![0x5A; 512]);
        assert_eq!(submitted.timeout, crate::command::DEFAULT_TIMEOUT);
    }

    #[test]
    fn cdb_table_layout() {
        let lines = cdb_table(&[0x12, 0x00, 0x00, 0x00, 0x60, 0x00]);

        assert_eq!(lines.len(), 3 + 2 + 1 + 1);
        assert_eq!(lines[3], "* |   4 | 0x12 | 0x00 | 0x00 | 0x00 |");
        assert_eq!(lines[4], "* |=====+======+======+======+======+");
        assert_eq!(lines[5], "* |   8 | 0x60 | 0x00 |      |      |");
        assert_eq!(lines[6], "* +==================================");
    }

    #[test]
    fn debug_tracing_renders_cdb() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let device = MockTransport::new([Reply::ok()]);
            let mut command = SgCommand::new(CommandCode::SynchronizeCache);
            command.set_direction(DataDirection::None);

            assert!(execute(&device, &mut command).is_ok());
        });
    }
}
