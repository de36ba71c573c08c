//! Tempo-derived tick timing.
//!
//! XMI ties its tick rate to real time rather than to a file-declared
//! resolution: the effective ticks-per-quarter-note is recomputed from
//! the AIL quantisation constant whenever tempo or time signature
//! changes. Deltas in the event stream are then worth
//! `seconds_per_tick` each.

/// AIL quantisation constant. Ticks per quarter are derived from this
/// and the current tempo/time signature on every meta-event update.
pub const QUANT_TIME: u32 = 8333;

/// Tempo assumed until the stream says otherwise.
pub const DEFAULT_BPM: f64 = 120.0;

/// Ticks per quarter note primed at load time. The quantised value
/// replaces this on the first tempo or time-signature event.
pub const DEFAULT_TPQN: u32 = 30;

/// Current tempo, time signature and the tick length they imply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeBase {
    /// Beats per minute
    pub bpm: f64,
    /// Time signature numerator
    pub time_sig_num: u8,
    /// Time signature denominator (decoded from its power-of-two form)
    pub time_sig_den: u8,
    /// Ticks per quarter note
    pub tpqn: u32,
    /// Length of one tick in seconds: (60 / bpm) / tpqn
    pub seconds_per_tick: f64,
}

impl Default for TimeBase {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            time_sig_num: 4,
            time_sig_den: 4,
            tpqn: DEFAULT_TPQN,
            seconds_per_tick: (60.0 / DEFAULT_BPM) / DEFAULT_TPQN as f64,
        }
    }
}

impl TimeBase {
    /// Apply a Set Tempo meta event (24-bit microseconds per quarter).
    /// A zero value is ignored.
    pub fn set_tempo(&mut self, microseconds_per_quarter: u32) {
        if microseconds_per_quarter == 0 {
            return;
        }
        self.bpm = 60_000_000.0 / microseconds_per_quarter as f64;
        self.recalc();
    }

    /// Apply a Time Signature meta event. The denominator arrives as a
    /// power of two, per the SMF meta encoding.
    pub fn set_time_signature(&mut self, numerator: u8, denominator_power: u8) {
        if numerator == 0 {
            return;
        }
        self.time_sig_num = numerator;
        self.time_sig_den = 1u8 << denominator_power.min(7);
        self.recalc();
    }

    /// Requantise tpqn and the tick length from the current state.
    fn recalc(&mut self) {
        let beats = self.bpm * self.time_sig_num as f64 / self.time_sig_den as f64;
        // round half up; tpqn must stay positive
        self.tpqn = ((QUANT_TIME as f64 / beats) + 0.5) as u32;
        if self.tpqn == 0 {
            self.tpqn = 1;
        }
        self.seconds_per_tick = (60.0 / self.bpm) / self.tpqn as f64;
    }
}
