//! Sequencer configuration.

/// Options for building a `Sequencer`.
#[derive(Clone, Copy, Debug)]
pub struct SequencerConfig {
    /// Output sample rate the song clock runs against
    pub sample_rate: u32,
    /// Restart from the top once the stream and pending releases drain
    pub looping: bool,
    /// Slots in the pending note-off buffer
    pub pending_capacity: usize,
    /// Rescale pending note-off times when tempo changes. Off by
    /// default: already-scheduled releases keep the absolute times
    /// computed when their notes started.
    pub rescale_pending: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            looping: false,
            pending_capacity: 512,
            rescale_pending: false,
        }
    }
}
