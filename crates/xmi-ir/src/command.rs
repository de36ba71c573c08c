//! MIDI channel commands produced by the sequencer.

use arrayvec::ArrayVec;

/// Controller number for All Sound Off.
pub const ALL_SOUND_OFF: u8 = 120;

/// Controller number for All Notes Off.
pub const ALL_NOTES_OFF: u8 = 123;

/// A decoded channel command, ready for a MIDI output device.
///
/// Channels are 0-15; key/velocity/controller/value/program fields are
/// 7-bit (0-127). Pitch bend carries the full 14-bit value, 8192 centre.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmiCommand {
    /// Start a note
    NoteOn { channel: u8, key: u8, velocity: u8 },
    /// Release a note
    NoteOff { channel: u8, key: u8 },
    /// Select a program (patch)
    ProgramChange { channel: u8, program: u8 },
    /// Change a continuous controller
    ControllerChange { channel: u8, controller: u8, value: u8 },
    /// Per-key pressure
    PolyphonicAftertouch { channel: u8, key: u8, value: u8 },
    /// 14-bit pitch wheel position
    PitchBend { channel: u8, value: u16 },
    /// Channel-wide pressure
    ChannelAftertouch { channel: u8, value: u8 },
}

impl XmiCommand {
    /// The channel this command addresses.
    pub fn channel(&self) -> u8 {
        match *self {
            XmiCommand::NoteOn { channel, .. }
            | XmiCommand::NoteOff { channel, .. }
            | XmiCommand::ProgramChange { channel, .. }
            | XmiCommand::ControllerChange { channel, .. }
            | XmiCommand::PolyphonicAftertouch { channel, .. }
            | XmiCommand::PitchBend { channel, .. }
            | XmiCommand::ChannelAftertouch { channel, .. } => channel,
        }
    }

    /// Returns true if every field is within its MIDI range.
    ///
    /// Consumers drop commands that fail this rather than sending them
    /// to the device.
    pub fn is_valid(&self) -> bool {
        if self.channel() > 15 {
            return false;
        }
        match *self {
            XmiCommand::NoteOn { key, velocity, .. } => key < 128 && velocity < 128,
            XmiCommand::NoteOff { key, .. } => key < 128,
            XmiCommand::ProgramChange { program, .. } => program < 128,
            XmiCommand::ControllerChange { controller, value, .. } => {
                controller < 128 && value < 128
            }
            XmiCommand::PolyphonicAftertouch { key, value, .. } => key < 128 && value < 128,
            XmiCommand::PitchBend { value, .. } => value < 16384,
            XmiCommand::ChannelAftertouch { value, .. } => value < 128,
        }
    }

    /// Encode as a raw MIDI message (2 or 3 bytes).
    pub fn to_bytes(&self) -> ArrayVec<u8, 3> {
        let mut out = ArrayVec::new();
        match *self {
            XmiCommand::NoteOn { channel, key, velocity } => {
                out.push(0x90 | channel);
                out.push(key);
                out.push(velocity);
            }
            XmiCommand::NoteOff { channel, key } => {
                out.push(0x80 | channel);
                out.push(key);
                out.push(0);
            }
            XmiCommand::ProgramChange { channel, program } => {
                out.push(0xC0 | channel);
                out.push(program);
            }
            XmiCommand::ControllerChange { channel, controller, value } => {
                out.push(0xB0 | channel);
                out.push(controller);
                out.push(value);
            }
            XmiCommand::PolyphonicAftertouch { channel, key, value } => {
                out.push(0xA0 | channel);
                out.push(key);
                out.push(value);
            }
            XmiCommand::PitchBend { channel, value } => {
                out.push(0xE0 | channel);
                out.push((value & 0x7F) as u8);
                out.push((value >> 7) as u8);
            }
            XmiCommand::ChannelAftertouch { channel, value } => {
                out.push(0xD0 | channel);
                out.push(value);
            }
        }
        out
    }
}
