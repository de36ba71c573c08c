//! Scheduled note-off storage.
//!
//! XMI Note-Ons carry their duration inline, so the sequencer must
//! remember a release time for every sounding note. The buffer is a
//! fixed array of slots scanned linearly: capacity is small, nothing
//! allocates after construction, and worst-case work per `advance`
//! stays bounded.

use xmi_ir::XmiCommand;

/// A note awaiting release.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PendingNoteOff {
    /// Song time at which the note ends
    pub due: f64,
    pub channel: u8,
    pub key: u8,
}

/// Fixed-capacity set of pending note-offs (None = free slot).
pub struct PendingNoteOffs {
    slots: Vec<Option<PendingNoteOff>>,
}

impl PendingNoteOffs {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Schedule a release in the first free slot. Returns false when
    /// every slot is taken; the note then sounds until the next
    /// All-Notes-Off.
    pub fn add(&mut self, due: f64, channel: u8, key: u8) -> bool {
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(PendingNoteOff { due, channel, key });
                true
            }
            None => {
                log::warn!(
                    "pending note-off buffer full, dropping release for ch {} key {}",
                    channel,
                    key
                );
                false
            }
        }
    }

    /// Emit a NoteOff for every entry due at or before `now`, freeing
    /// its slot.
    pub fn drain_due(&mut self, now: f64, mut emit: impl FnMut(XmiCommand)) {
        for slot in &mut self.slots {
            if let Some(p) = *slot {
                if p.due <= now {
                    emit(XmiCommand::NoteOff { channel: p.channel, key: p.key });
                    *slot = None;
                }
            }
        }
    }

    /// Rescale the remaining time of every active entry, for tempo
    /// changes: due becomes `now + (due - now) * ratio`.
    pub fn adjust(&mut self, now: f64, ratio: f64) {
        for slot in &mut self.slots {
            if let Some(p) = slot {
                p.due = now + (p.due - now) * ratio;
            }
        }
    }

    /// Free every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
