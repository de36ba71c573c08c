//! Command validation and queue draining.

use ringbuf::traits::Consumer;
use xmi_engine::CommandConsumer;
use xmi_ir::{XmiCommand, ALL_NOTES_OFF, ALL_SOUND_OFF};

use crate::sink::{MidiError, MidiSink};

/// Validate and send one command. Out-of-range commands are dropped
/// with a log entry rather than failing the stream.
pub fn dispatch(command: &XmiCommand, sink: &mut dyn MidiSink) -> Result<(), MidiError> {
    if !command.is_valid() {
        log::warn!("dropping out-of-range command {:?}", command);
        return Ok(());
    }
    sink.send(&command.to_bytes())
}

/// Drain every queued command into the sink. Returns how many messages
/// were sent.
pub fn pump(consumer: &mut CommandConsumer, sink: &mut dyn MidiSink) -> Result<usize, MidiError> {
    let mut sent = 0;
    while let Some(command) = consumer.try_pop() {
        dispatch(&command, sink)?;
        sent += 1;
    }
    Ok(sent)
}

/// Quiet every channel: All Notes Off then All Sound Off, 0 through 15.
/// Players send this on stop and teardown so nothing keeps sounding.
pub fn quiet_all(sink: &mut dyn MidiSink) -> Result<(), MidiError> {
    for channel in 0..16u8 {
        dispatch(
            &XmiCommand::ControllerChange { channel, controller: ALL_NOTES_OFF, value: 0 },
            sink,
        )?;
        dispatch(
            &XmiCommand::ControllerChange { channel, controller: ALL_SOUND_OFF, value: 0 },
            sink,
        )?;
    }
    Ok(())
}
