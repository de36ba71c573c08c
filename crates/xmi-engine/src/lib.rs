//! XMI playback engine.
//!
//! Owns the event cursor and the song clock, and produces MIDI channel
//! commands into a lock-free queue as `advance` is fed samples.

mod config;
mod pending;
mod sequencer;

pub use config::SequencerConfig;
pub use pending::{PendingNoteOff, PendingNoteOffs};
pub use sequencer::{CommandConsumer, Sequencer};
