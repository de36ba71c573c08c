//! MIDI output glue.
//!
//! Validates sequencer commands, encodes them as raw MIDI messages and
//! hands them to a `MidiSink` backend.

mod dispatch;
mod midir_backend;
mod sink;

pub use dispatch::{dispatch, pump, quiet_all};
pub use midir_backend::MidirOutput;
pub use sink::{MidiError, MidiSink};
