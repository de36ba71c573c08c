//! Core value types for the xmiplay sequencer.
//!
//! Format parsing emits these types and the playback engine consumes
//! them. Designed to be `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

mod command;
mod timebase;

pub use command::{XmiCommand, ALL_NOTES_OFF, ALL_SOUND_OFF};
pub use timebase::{TimeBase, DEFAULT_BPM, DEFAULT_TPQN, QUANT_TIME};
