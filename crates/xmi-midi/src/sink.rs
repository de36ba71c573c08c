//! MIDI sink trait and error types.

/// Error type for MIDI output operations.
#[derive(Debug)]
pub enum MidiError {
    /// No MIDI output port available
    NoPort,
    /// Failed to open the output connection
    Connect(String),
    /// Failed to send a message
    Send(String),
}

impl std::fmt::Display for MidiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MidiError::NoPort => write!(f, "no MIDI output port available"),
            MidiError::Connect(msg) => write!(f, "MIDI connect error: {}", msg),
            MidiError::Send(msg) => write!(f, "MIDI send error: {}", msg),
        }
    }
}

impl std::error::Error for MidiError {}

/// Trait for MIDI output backends.
pub trait MidiSink {
    /// Send one raw MIDI message (2 or 3 bytes).
    fn send(&mut self, message: &[u8]) -> Result<(), MidiError>;
}
