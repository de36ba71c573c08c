//! XMI event stream decoding.
//!
//! The XMI encoding differs from SMF in three ways: delta-times are an
//! additive run of low bytes rather than a VLQ, Note-On carries its
//! duration inline so the stream holds no paired Note-Offs, and there
//! is no end-of-track meta: the stream simply ends at the chunk
//! boundary. VLQs still appear for meta-event lengths and for the
//! Note-On duration.

use xmi_ir::XmiCommand;

use crate::reader::ByteReader;
use crate::DecodeError;

const META_TEMPO: u8 = 0x51;
const META_TIME_SIG: u8 = 0x58;

/// One decoded stream event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvntEvent {
    /// A channel command. Note-On carries its duration in ticks; a
    /// Note-On with velocity zero arrives here as a plain NoteOff.
    Command {
        command: XmiCommand,
        duration: Option<u32>,
    },
    /// Set Tempo meta: microseconds per quarter note
    Tempo(u32),
    /// Time Signature meta: numerator and denominator power of two
    TimeSignature(u8, u8),
    /// Meta or SysEx data consumed without effect
    Skipped,
}

/// Read an XMI delta-time.
///
/// Bytes with the high bit clear accumulate additively. The run ends
/// at the first byte that is either a status byte (left unconsumed) or
/// not 127; 127 continues the sum, so deltas larger than one byte's
/// worth are spelled `7F 7F .. nn`.
pub fn read_delta(r: &mut ByteReader) -> Result<u32, DecodeError> {
    let mut total: u32 = 0;
    loop {
        let b = r.peek_u8()?;
        if b & 0x80 != 0 {
            // the next status byte; leave it for the event read
            return Ok(total);
        }
        r.skip(1)?;
        total += b as u32;
        if b != 0x7F {
            return Ok(total);
        }
    }
}

/// Read a standard SMF variable-length quantity.
pub fn read_vlq(r: &mut ByteReader) -> Result<u32, DecodeError> {
    let mut value: u32 = 0;
    for _ in 0..4 {
        let b = r.read_u8()?;
        value = (value << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Ok(value);
        }
    }
    // more than 28 bits of length is not a real file
    Err(DecodeError::UnexpectedEof)
}

/// Read one event at the cursor.
///
/// A first byte with the high bit clear reuses `running_status`; every
/// explicit status byte replaces it.
pub fn read_event(
    r: &mut ByteReader,
    running_status: &mut u8,
) -> Result<EvntEvent, DecodeError> {
    let first = r.peek_u8()?;
    let status = if first & 0x80 == 0 {
        if *running_status == 0 {
            return Err(DecodeError::RunningStatusWithoutPrior);
        }
        *running_status
    } else {
        r.skip(1)?;
        *running_status = first;
        first
    };

    if status == 0xFF {
        return read_meta(r);
    }
    if status == 0xF0 {
        // SysEx: consumed up to its terminator, nothing emitted
        while r.read_u8()? != 0xF7 {}
        return Ok(EvntEvent::Skipped);
    }

    let channel = status & 0x0F;
    let command = match status & 0xF0 {
        0x80 => {
            let key = r.read_u8()?;
            let _velocity = r.read_u8()?;
            XmiCommand::NoteOff { channel, key }
        }
        0x90 => {
            let key = r.read_u8()?;
            let velocity = r.read_u8()?;
            let duration = read_vlq(r)?;
            if velocity > 0 {
                return Ok(EvntEvent::Command {
                    command: XmiCommand::NoteOn { channel, key, velocity },
                    duration: Some(duration),
                });
            }
            // velocity zero is a release; nothing to schedule
            XmiCommand::NoteOff { channel, key }
        }
        0xA0 => {
            let key = r.read_u8()?;
            let value = r.read_u8()?;
            XmiCommand::PolyphonicAftertouch { channel, key, value }
        }
        0xB0 => {
            let controller = r.read_u8()?;
            let value = r.read_u8()?;
            XmiCommand::ControllerChange { channel, controller, value }
        }
        0xC0 => {
            let program = r.read_u8()?;
            XmiCommand::ProgramChange { channel, program }
        }
        0xD0 => {
            let value = r.read_u8()?;
            XmiCommand::ChannelAftertouch { channel, value }
        }
        0xE0 => {
            let lsb = r.read_u8()?;
            let msb = r.read_u8()?;
            XmiCommand::PitchBend {
                channel,
                value: (lsb as u16) | ((msb as u16) << 7),
            }
        }
        _ => return Err(DecodeError::UnknownStatus(status)),
    };
    Ok(EvntEvent::Command { command, duration: None })
}

/// Read a meta event. Only Set Tempo and Time Signature carry meaning;
/// everything else is length-skipped.
fn read_meta(r: &mut ByteReader) -> Result<EvntEvent, DecodeError> {
    let meta_type = r.read_u8()?;
    let len = read_vlq(r)? as usize;
    match meta_type {
        META_TEMPO if len >= 3 => {
            let b = [r.read_u8()?, r.read_u8()?, r.read_u8()?];
            r.skip(len - 3)?;
            let uspq = ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | b[2] as u32;
            Ok(EvntEvent::Tempo(uspq))
        }
        META_TIME_SIG if len >= 4 => {
            let numerator = r.read_u8()?;
            let denominator_power = r.read_u8()?;
            // clocks-per-click and 32nds-per-quarter are not used
            r.skip(len - 2)?;
            Ok(EvntEvent::TimeSignature(numerator, denominator_power))
        }
        _ => {
            r.skip(len)?;
            Ok(EvntEvent::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(bytes: &[u8]) -> ByteReader<'_> {
        ByteReader::new(bytes)
    }

    // === Delta-times ===

    #[test]
    fn delta_single_low_byte() {
        let mut r = reader(&[0x05, 0x90]);
        assert_eq!(read_delta(&mut r).unwrap(), 5);
        assert_eq!(r.pos(), 1);
    }

    #[test]
    fn delta_zero_before_status() {
        // a status byte immediately means delta zero, byte unconsumed
        let mut r = reader(&[0x90, 0x3C]);
        assert_eq!(read_delta(&mut r).unwrap(), 0);
        assert_eq!(r.pos(), 0);
    }

    #[test]
    fn delta_explicit_zero_byte() {
        let mut r = reader(&[0x00, 0x3C]);
        assert_eq!(read_delta(&mut r).unwrap(), 0);
        assert_eq!(r.pos(), 1);
    }

    #[test]
    fn delta_127_continues_sum() {
        let mut r = reader(&[0x7F, 0x7F, 0x05, 0x90]);
        assert_eq!(read_delta(&mut r).unwrap(), 127 + 127 + 5);
        assert_eq!(r.pos(), 3);
    }

    #[test]
    fn delta_127_run_ended_by_status() {
        let mut r = reader(&[0x7F, 0x90]);
        assert_eq!(read_delta(&mut r).unwrap(), 127);
        assert_eq!(r.pos(), 1);
    }

    #[test]
    fn delta_at_end_of_data_fails() {
        let mut r = reader(&[]);
        assert_eq!(read_delta(&mut r), Err(DecodeError::UnexpectedEof));
    }

    // === VLQ ===

    #[test]
    fn vlq_single_byte() {
        let mut r = reader(&[0x60]);
        assert_eq!(read_vlq(&mut r).unwrap(), 0x60);
    }

    #[test]
    fn vlq_multi_byte() {
        let mut r = reader(&[0x81, 0x00]);
        assert_eq!(read_vlq(&mut r).unwrap(), 128);
        let mut r = reader(&[0xFF, 0x7F]);
        assert_eq!(read_vlq(&mut r).unwrap(), 16383);
    }

    #[test]
    fn vlq_truncated_fails() {
        let mut r = reader(&[0x81]);
        assert_eq!(read_vlq(&mut r), Err(DecodeError::UnexpectedEof));
    }

    // === Channel events ===

    #[test]
    fn note_on_with_duration() {
        let mut r = reader(&[0x90, 0x3C, 0x40, 0x60]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(
            ev,
            EvntEvent::Command {
                command: XmiCommand::NoteOn { channel: 0, key: 0x3C, velocity: 0x40 },
                duration: Some(0x60),
            }
        );
        assert_eq!(status, 0x90);
    }

    #[test]
    fn note_on_velocity_zero_is_release() {
        let mut r = reader(&[0x93, 0x3C, 0x00, 0x60]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(
            ev,
            EvntEvent::Command {
                command: XmiCommand::NoteOff { channel: 3, key: 0x3C },
                duration: None,
            }
        );
    }

    #[test]
    fn note_off_discards_velocity() {
        let mut r = reader(&[0x81, 0x40, 0x7F]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(
            ev,
            EvntEvent::Command {
                command: XmiCommand::NoteOff { channel: 1, key: 0x40 },
                duration: None,
            }
        );
        assert_eq!(r.pos(), 3);
    }

    #[test]
    fn running_status_reuses_prior() {
        // explicit Note-On, then a second one without a status byte
        let mut r = reader(&[0x90, 0x3C, 0x40, 0x60, 0x3E, 0x40, 0x60]);
        let mut status = 0;
        let first = read_event(&mut r, &mut status).unwrap();
        let second = read_event(&mut r, &mut status).unwrap();
        let expect = |key| EvntEvent::Command {
            command: XmiCommand::NoteOn { channel: 0, key, velocity: 0x40 },
            duration: Some(0x60),
        };
        assert_eq!(first, expect(0x3C));
        assert_eq!(second, expect(0x3E));
    }

    #[test]
    fn running_status_without_prior_fails() {
        let mut r = reader(&[0x3C, 0x40, 0x60]);
        let mut status = 0;
        assert_eq!(
            read_event(&mut r, &mut status),
            Err(DecodeError::RunningStatusWithoutPrior)
        );
    }

    #[test]
    fn pitch_bend_is_14_bit() {
        let mut r = reader(&[0xE2, 0x45, 0x46]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(
            ev,
            EvntEvent::Command {
                command: XmiCommand::PitchBend { channel: 2, value: 0x2345 },
                duration: None,
            }
        );
    }

    #[test]
    fn program_change_single_operand() {
        let mut r = reader(&[0xC5, 0x17]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(
            ev,
            EvntEvent::Command {
                command: XmiCommand::ProgramChange { channel: 5, program: 0x17 },
                duration: None,
            }
        );
    }

    #[test]
    fn controller_change() {
        let mut r = reader(&[0xB0, 0x07, 0x64]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(
            ev,
            EvntEvent::Command {
                command: XmiCommand::ControllerChange { channel: 0, controller: 7, value: 100 },
                duration: None,
            }
        );
    }

    // === Meta and SysEx ===

    #[test]
    fn tempo_meta() {
        let mut r = reader(&[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(ev, EvntEvent::Tempo(500_000));
    }

    #[test]
    fn time_signature_meta() {
        let mut r = reader(&[0xFF, 0x58, 0x04, 0x06, 0x03, 0x24, 0x08]);
        let mut status = 0;
        let ev = read_event(&mut r, &mut status).unwrap();
        assert_eq!(ev, EvntEvent::TimeSignature(6, 3));
        assert_eq!(r.pos(), 7);
    }

    #[test]
    fn other_meta_is_skipped() {
        // marker meta with 4 payload bytes
        let mut r = reader(&[0xFF, 0x06, 0x04, b't', b'e', b's', b't', 0x90]);
        let mut status = 0;
        assert_eq!(read_event(&mut r, &mut status).unwrap(), EvntEvent::Skipped);
        assert_eq!(r.pos(), 7);
    }

    #[test]
    fn sysex_consumed_to_terminator() {
        let mut r = reader(&[0xF0, 0x41, 0x10, 0x42, 0xF7, 0x90]);
        let mut status = 0;
        assert_eq!(read_event(&mut r, &mut status).unwrap(), EvntEvent::Skipped);
        assert_eq!(r.pos(), 5);
    }

    #[test]
    fn system_status_is_fatal() {
        let mut r = reader(&[0xF8]);
        let mut status = 0;
        assert_eq!(
            read_event(&mut r, &mut status),
            Err(DecodeError::UnknownStatus(0xF8))
        );
    }

    #[test]
    fn truncated_operands_fail() {
        let mut r = reader(&[0x90, 0x3C]);
        let mut status = 0;
        assert_eq!(
            read_event(&mut r, &mut status),
            Err(DecodeError::UnexpectedEof)
        );
    }
}
