//! Metadata pass over an XMI file.
//!
//! Re-runs the container walk and the event decoder without a command
//! sink, so a browser can show duration and tempo without building a
//! sequencer.

use xmi_ir::TimeBase;

use crate::container::find_evnt;
use crate::event::{read_delta, read_event, EvntEvent};
use crate::reader::ByteReader;
use crate::LoadError;

/// Summary of an XMI file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XmiInfo {
    /// Time of the last event under the tempo map: the cumulative
    /// delta sum, not including note durations.
    pub duration_seconds: f64,
    /// Tempo after the last tempo event, or the default
    pub bpm: f64,
    pub time_sig_num: u8,
    pub time_sig_den: u8,
    /// Number of channel commands in the stream
    pub event_count: u64,
}

/// Scan an XMI file image and report its metadata.
pub fn probe(data: &[u8]) -> Result<XmiInfo, LoadError> {
    let evnt = find_evnt(data)?;
    let mut r = ByteReader::at(&data[..evnt.end], evnt.start);
    let mut timebase = TimeBase::default();
    let mut running_status: u8 = 0;
    let mut last_event_time = 0.0f64;
    let mut event_count = 0u64;

    while r.pos() < evnt.end {
        let delta = match read_delta(&mut r) {
            Ok(d) => d,
            Err(_) => break,
        };
        last_event_time += delta as f64 * timebase.seconds_per_tick;
        if r.pos() >= evnt.end {
            break;
        }
        match read_event(&mut r, &mut running_status) {
            Ok(EvntEvent::Command { .. }) => event_count += 1,
            Ok(EvntEvent::Tempo(uspq)) => timebase.set_tempo(uspq),
            Ok(EvntEvent::TimeSignature(num, pow)) => timebase.set_time_signature(num, pow),
            Ok(EvntEvent::Skipped) => {}
            // a malformed tail ends the pass; report what was gathered
            Err(_) => break,
        }
    }

    Ok(XmiInfo {
        duration_seconds: last_event_time,
        bpm: timebase.bpm,
        time_sig_num: timebase.time_sig_num,
        time_sig_den: timebase.time_sig_den,
        event_count,
    })
}
