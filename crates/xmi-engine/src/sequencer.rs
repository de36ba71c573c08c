//! The XMI sequencer.
//!
//! Mutated only by `advance` and `reset`, both called from one thread;
//! the command queue is the single cross-thread seam. `advance` never
//! performs I/O or allocation: the file image is read whole at
//! construction and every structure is sized up front.

use std::path::Path;

use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use xmi_formats::{find_evnt, read_delta, read_event, ByteReader, EvntEvent, LoadError};
use xmi_ir::{TimeBase, XmiCommand, ALL_NOTES_OFF, ALL_SOUND_OFF};

use crate::config::SequencerConfig;
use crate::pending::PendingNoteOffs;

/// Receiving half of the command queue.
pub type CommandConsumer = HeapCons<XmiCommand>;

/// Commands the queue holds before enqueues start dropping. Sized for
/// a dense chord burst plus the 32 controllers a reset injects.
const COMMAND_QUEUE_CAPACITY: usize = 2048;

fn push_command(queue: &mut HeapProd<XmiCommand>, command: XmiCommand) {
    if queue.try_push(command).is_err() {
        log::warn!("command queue full, dropping {:?}", command);
    }
}

/// Streams an XMI file as MIDI channel commands on a sample clock.
pub struct Sequencer {
    /// Full file image; all offsets index into this
    data: Vec<u8>,
    evnt_start: usize,
    evnt_end: usize,
    /// Read position inside the EVNT chunk
    cursor: usize,
    /// Running-status byte, 0 before any status has been seen
    last_status: u8,
    /// Song clock in seconds, derived from samples_processed
    song_time: f64,
    /// Absolute time of the next stream event
    next_event_time: f64,
    samples_processed: u64,
    sample_rate: u32,
    timebase: TimeBase,
    pending: PendingNoteOffs,
    commands: HeapProd<XmiCommand>,
    looping: bool,
    rescale_pending: bool,
    reached_end: bool,
    loaded: bool,
}

impl Sequencer {
    /// Build a sequencer over an XMI file image. Returns the sequencer
    /// and the consumer half of its command queue.
    pub fn new(
        data: Vec<u8>,
        config: SequencerConfig,
    ) -> Result<(Self, CommandConsumer), LoadError> {
        let evnt = find_evnt(&data)?;
        let (producer, consumer) = HeapRb::<XmiCommand>::new(COMMAND_QUEUE_CAPACITY).split();

        let mut seq = Self {
            data,
            evnt_start: evnt.start,
            evnt_end: evnt.end,
            cursor: evnt.start,
            last_status: 0,
            song_time: 0.0,
            next_event_time: 0.0,
            samples_processed: 0,
            sample_rate: config.sample_rate,
            timebase: TimeBase::default(),
            pending: PendingNoteOffs::new(config.pending_capacity),
            commands: producer,
            looping: config.looping,
            rescale_pending: config.rescale_pending,
            reached_end: false,
            loaded: true,
        };
        seq.prime_from(0.0);
        Ok((seq, consumer))
    }

    /// Read an XMI file from disk and build a sequencer over it.
    pub fn from_file(
        path: impl AsRef<Path>,
        config: SequencerConfig,
    ) -> Result<(Self, CommandConsumer), LoadError> {
        let data = std::fs::read(path.as_ref())
            .map_err(|e| LoadError::NotFound(e.to_string()))?;
        Self::new(data, config)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Song clock position in seconds.
    pub fn song_time(&self) -> f64 {
        self.song_time
    }

    pub fn timebase(&self) -> &TimeBase {
        &self.timebase
    }

    /// Number of notes currently awaiting release.
    pub fn pending_count(&self) -> usize {
        self.pending.active_count()
    }

    /// Rewind to the start of the stream.
    ///
    /// Synthesises All-Notes-Off and All-Sound-Off on every channel so
    /// the consumer silences anything still sounding, then restores the
    /// default timebase and re-primes the first delta.
    pub fn reset(&mut self) {
        for channel in 0..16u8 {
            self.emit(XmiCommand::ControllerChange {
                channel,
                controller: ALL_NOTES_OFF,
                value: 0,
            });
            self.emit(XmiCommand::ControllerChange {
                channel,
                controller: ALL_SOUND_OFF,
                value: 0,
            });
        }
        self.cursor = self.evnt_start;
        self.last_status = 0;
        self.pending.clear();
        self.timebase = TimeBase::default();
        self.samples_processed = 0;
        self.song_time = 0.0;
        self.reached_end = false;
        self.prime_from(0.0);
    }

    /// Advance the song clock by `samples` and emit everything now due.
    ///
    /// Within one call the order is: note-offs that have come due,
    /// then stream events in file order.
    pub fn advance(&mut self, samples: u64) {
        if !self.loaded {
            return;
        }
        self.samples_processed += samples;
        self.song_time = self.samples_processed as f64 / self.sample_rate as f64;

        let now = self.song_time;
        let commands = &mut self.commands;
        self.pending.drain_due(now, |cmd| push_command(commands, cmd));

        while self.loaded && !self.reached_end && self.next_event_time <= self.song_time {
            self.step();
        }

        if self.reached_end && self.pending.active_count() == 0 {
            if self.looping {
                self.reset();
            } else {
                self.loaded = false;
            }
        }
    }

    /// Parse one event at `next_event_time`, apply its side effects and
    /// prime the following delta.
    fn step(&mut self) {
        let event_time = self.next_event_time;

        let mut r = ByteReader::at(&self.data[..self.evnt_end], self.cursor);
        let mut status = self.last_status;
        let parsed = read_event(&mut r, &mut status);
        self.cursor = r.pos();
        self.last_status = status;

        match parsed {
            Ok(EvntEvent::Command { command, duration }) => {
                self.emit(command);
                if let (XmiCommand::NoteOn { channel, key, .. }, Some(ticks)) =
                    (command, duration)
                {
                    let due = event_time + ticks as f64 * self.timebase.seconds_per_tick;
                    self.pending.add(due, channel, key);
                }
            }
            Ok(EvntEvent::Tempo(uspq)) => {
                let old = self.timebase.seconds_per_tick;
                self.timebase.set_tempo(uspq);
                self.rescale_pending_from(old);
            }
            Ok(EvntEvent::TimeSignature(numerator, power)) => {
                let old = self.timebase.seconds_per_tick;
                self.timebase.set_time_signature(numerator, power);
                self.rescale_pending_from(old);
            }
            Ok(EvntEvent::Skipped) => {}
            Err(e) => {
                log::warn!("stopping playback: {}", e);
                self.loaded = false;
                return;
            }
        }

        // the next delta converts with whatever tick length the event
        // left behind
        if self.cursor < self.evnt_end {
            self.prime_from(event_time);
        } else {
            self.reached_end = true;
        }
    }

    /// Read the delta at the cursor and schedule the next event time
    /// relative to `anchor`.
    fn prime_from(&mut self, anchor: f64) {
        let mut r = ByteReader::at(&self.data[..self.evnt_end], self.cursor);
        match read_delta(&mut r) {
            Ok(delta) => {
                self.cursor = r.pos();
                self.next_event_time =
                    anchor + delta as f64 * self.timebase.seconds_per_tick;
            }
            Err(_) => self.reached_end = true,
        }
    }

    fn rescale_pending_from(&mut self, old_seconds_per_tick: f64) {
        let new = self.timebase.seconds_per_tick;
        if self.rescale_pending && new != old_seconds_per_tick {
            self.pending.adjust(self.song_time, new / old_seconds_per_tick);
        }
    }

    fn emit(&mut self, command: XmiCommand) {
        push_command(&mut self.commands, command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Consumer;

    const RATE: u32 = 44100;

    /// Wrap an event stream in a FORM XMID / EVNT container.
    fn xmi(events: &[u8]) -> Vec<u8> {
        let mut evnt = Vec::from(*b"EVNT");
        evnt.extend((events.len() as u32).to_be_bytes());
        evnt.extend(events);
        let mut payload = Vec::from(*b"XMID");
        payload.extend(&evnt);
        let mut file = Vec::from(*b"FORM");
        file.extend((payload.len() as u32).to_be_bytes());
        file.extend(&payload);
        file
    }

    fn sequencer(events: &[u8], config: SequencerConfig) -> (Sequencer, CommandConsumer) {
        Sequencer::new(xmi(events), config).unwrap()
    }

    fn drain(consumer: &mut CommandConsumer) -> Vec<XmiCommand> {
        let mut out = Vec::new();
        while let Some(cmd) = consumer.try_pop() {
            out.push(cmd);
        }
        out
    }

    // Two Note-Ons at time zero: C4 for 96 ticks, E4 on channel 1 for
    // 48 ticks. At the primed tick length those last 1.6 s and 0.8 s.
    const TWO_NOTES: &[u8] = &[0x90, 0x3C, 0x40, 0x60, 0x91, 0x40, 0x50, 0x30];

    #[test]
    fn loads_and_reports_state() {
        let (seq, _consumer) = sequencer(TWO_NOTES, SequencerConfig::default());
        assert!(seq.is_loaded());
        assert_eq!(seq.song_time(), 0.0);
        assert_eq!(seq.pending_count(), 0);
    }

    #[test]
    fn missing_evnt_fails_to_load() {
        let err = Sequencer::new(b"FORM".to_vec(), SequencerConfig::default()).unwrap_err();
        assert_eq!(err, LoadError::NoEvntChunk);
    }

    #[test]
    fn note_ons_then_note_offs() {
        let (mut seq, mut consumer) = sequencer(TWO_NOTES, SequencerConfig::default());

        seq.advance(RATE as u64); // 1.0 s
        let cmds = drain(&mut consumer);
        assert_eq!(
            cmds,
            vec![
                XmiCommand::NoteOn { channel: 0, key: 0x3C, velocity: 0x40 },
                XmiCommand::NoteOn { channel: 1, key: 0x40, velocity: 0x50 },
            ]
        );
        assert_eq!(seq.pending_count(), 2);

        seq.advance(RATE as u64); // 2.0 s: both releases due
        let cmds = drain(&mut consumer);
        assert_eq!(
            cmds,
            vec![
                XmiCommand::NoteOff { channel: 0, key: 0x3C },
                XmiCommand::NoteOff { channel: 1, key: 0x40 },
            ]
        );
        assert_eq!(seq.pending_count(), 0);
    }

    #[test]
    fn note_off_waits_for_its_time() {
        // one note, 96 ticks = 1.6 s
        let (mut seq, mut consumer) =
            sequencer(&[0x90, 0x3C, 0x40, 0x60], SequencerConfig::default());

        seq.advance(RATE as u64);
        assert_eq!(drain(&mut consumer).len(), 1); // the Note-On
        seq.advance((RATE / 2) as u64); // 1.5 s: not yet
        assert!(drain(&mut consumer).is_empty());
        seq.advance((RATE / 5) as u64); // 1.7 s
        assert_eq!(
            drain(&mut consumer),
            vec![XmiCommand::NoteOff { channel: 0, key: 0x3C }]
        );
    }

    #[test]
    fn velocity_zero_note_on_releases_immediately() {
        let (mut seq, mut consumer) =
            sequencer(&[0x90, 0x3C, 0x00, 0x60], SequencerConfig::default());
        seq.advance(100);
        assert_eq!(
            drain(&mut consumer),
            vec![XmiCommand::NoteOff { channel: 0, key: 0x3C }]
        );
        assert_eq!(seq.pending_count(), 0);
    }

    #[test]
    fn running_status_decodes_repeated_notes() {
        // explicit status, then two running-status Note-Ons separated
        // by explicit zero deltas
        let events = [
            0x90, 0x3C, 0x40, 0x60, //
            0x00, 0x3E, 0x40, 0x60, //
            0x00, 0x40, 0x40, 0x60,
        ];
        let (mut seq, mut consumer) = sequencer(&events, SequencerConfig::default());
        seq.advance(100);
        let cmds = drain(&mut consumer);
        let keys: Vec<u8> = cmds
            .iter()
            .map(|c| match c {
                XmiCommand::NoteOn { key, velocity: 0x40, channel: 0 } => *key,
                other => panic!("unexpected command {:?}", other),
            })
            .collect();
        assert_eq!(keys, vec![0x3C, 0x3E, 0x40]);
    }

    #[test]
    fn tempo_change_scales_later_deltas() {
        // Set Tempo to 60 BPM, then a 139-tick delta before a note.
        // At 60 BPM the quantised tick is 1/139 s, so the note lands
        // at 1.0 s.
        let events = [
            0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40, //
            0x7F, 0x0C, 0x90, 0x3C, 0x40, 0x00,
        ];
        let (mut seq, mut consumer) = sequencer(&events, SequencerConfig::default());

        seq.advance((RATE - 100) as u64); // just before 1.0 s
        assert!(drain(&mut consumer).is_empty());
        assert!((seq.timebase().bpm - 60.0).abs() < 1e-9);

        seq.advance(200); // past 1.0 s
        let cmds = drain(&mut consumer);
        assert!(matches!(cmds[0], XmiCommand::NoteOn { key: 0x3C, .. }));
    }

    #[test]
    fn pending_overflow_drops_third_release() {
        let config = SequencerConfig {
            pending_capacity: 2,
            ..SequencerConfig::default()
        };
        // three long notes on distinct keys, back to back
        let events = [
            0x90, 0x3C, 0x40, 0x60, //
            0x00, 0x3E, 0x40, 0x60, //
            0x00, 0x40, 0x40, 0x60,
        ];
        let (mut seq, mut consumer) = sequencer(&events, config);

        seq.advance(100);
        assert_eq!(drain(&mut consumer).len(), 3); // all Note-Ons emitted
        assert_eq!(seq.pending_count(), 2);

        seq.advance(RATE as u64 * 2);
        let offs = drain(&mut consumer);
        assert_eq!(offs.len(), 2); // the overflowed release never fires
        assert!(offs.iter().all(|c| matches!(c, XmiCommand::NoteOff { .. })));
    }

    #[test]
    fn end_of_stream_unloads_after_pending_drains() {
        let (mut seq, mut consumer) =
            sequencer(&[0x90, 0x3C, 0x40, 0x60], SequencerConfig::default());
        seq.advance(RATE as u64); // Note-On, release pending
        assert!(seq.is_loaded());
        seq.advance(RATE as u64); // release fires, nothing pending
        assert!(!seq.is_loaded());
        drain(&mut consumer);
        // further calls are inert
        seq.advance(RATE as u64);
        assert!(drain(&mut consumer).is_empty());
    }

    #[test]
    fn truncated_event_stops_cleanly() {
        // EVNT holding only a status byte and a key: the loader
        // succeeds, the first advance decodes nothing and stops
        let (mut seq, mut consumer) = sequencer(&[0x90, 0x3C], SequencerConfig::default());
        assert!(seq.is_loaded());
        seq.advance(1_000_000);
        assert!(drain(&mut consumer).is_empty());
        assert!(!seq.is_loaded());
    }

    #[test]
    fn looping_replays_identical_stream() {
        let config = SequencerConfig {
            looping: true,
            ..SequencerConfig::default()
        };
        let (mut seq, mut consumer) = sequencer(TWO_NOTES, config);

        seq.advance(RATE as u64); // Note-Ons
        seq.advance(RATE as u64); // releases drain, loop resets
        let mut first_pass = drain(&mut consumer);

        // the reset controllers separate the iterations
        let tail: Vec<XmiCommand> = first_pass.split_off(4);
        assert_eq!(tail.len(), 32);
        assert!(tail.iter().all(|c| matches!(
            c,
            XmiCommand::ControllerChange { controller: ALL_NOTES_OFF, .. }
                | XmiCommand::ControllerChange { controller: ALL_SOUND_OFF, .. }
        )));

        assert!(seq.is_loaded());
        seq.advance(RATE as u64); // second pass restarts from zero
        seq.advance(RATE as u64);
        let mut second_pass = drain(&mut consumer);
        second_pass.truncate(4);
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn reset_requires_no_terminal_state() {
        let (mut seq, mut consumer) = sequencer(TWO_NOTES, SequencerConfig::default());
        seq.advance(100);
        drain(&mut consumer);
        seq.reset();
        let cmds = drain(&mut consumer);
        assert_eq!(cmds.len(), 32);
        assert_eq!(seq.song_time(), 0.0);
        assert_eq!(seq.pending_count(), 0);

        // the stream replays from the top
        seq.advance(100);
        let replay = drain(&mut consumer);
        assert!(matches!(
            replay[0],
            XmiCommand::NoteOn { channel: 0, key: 0x3C, velocity: 0x40 }
        ));
    }

    #[test]
    fn rescale_pending_stretches_releases() {
        let config = SequencerConfig {
            rescale_pending: true,
            ..SequencerConfig::default()
        };
        // note for 96 ticks (1.6 s), then zero delta, then tempo 60 BPM.
        // The new tick is 1/139 s, ratio (1/139)/(1/60): the remaining
        // 1.6 s shrinks to about 0.69 s.
        let events = [
            0x90, 0x3C, 0x40, 0x60, //
            0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40,
        ];
        let (mut seq, mut consumer) = sequencer(&events, config);
        seq.advance(100);
        assert_eq!(drain(&mut consumer).len(), 1);

        seq.advance(RATE as u64); // just past 1.0 s
        let cmds = drain(&mut consumer);
        assert_eq!(
            cmds,
            vec![XmiCommand::NoteOff { channel: 0, key: 0x3C }]
        );
    }
}
