//! Control -> render event handoff.
//!
//! The control thread appends [`MidiEvent`]s to a pending queue under a short
//! lock. Once per render cycle the render thread swaps the pending queue with its
//! (empty) draining queue under the same lock, then encodes the drained events into
//! a fixed arena that is handed to the plugin as one `VstEvents` batch.
//!
//! Both queues are reserved to [`EVENT_CAPACITY`] up front and only ever swapped,
//! so neither side allocates after construction.

use std::ptr;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::abi::{self, VstEvent, VstEvents, VstMidiEvent};
use crate::error::{HostError, Result};

/// Maximum events delivered per render cycle.
pub const EVENT_CAPACITY: usize = 512;

/// Velocity used for every note-on.
pub const NOTE_VELOCITY: u8 = 0x64;

/// Release velocity carried in every encoded event.
pub const NOTE_OFF_VELOCITY: u8 = 100;

const STATUS_NOTE_ON: u8 = 0x90;
const STATUS_NOTE_OFF: u8 = 0x80;

/// A performance event on MIDI channel 0 at buffer offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiEvent {
    NoteOn { note: u8 },
    NoteOff { note: u8 },
}

impl MidiEvent {
    /// Note-on for `note`, masked to 0-127.
    pub fn note_on(note: u8) -> Self {
        MidiEvent::NoteOn { note: note & 0x7F }
    }

    /// Note-off for `note`, masked to 0-127.
    pub fn note_off(note: u8) -> Self {
        MidiEvent::NoteOff { note: note & 0x7F }
    }

    pub fn note(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { note } | MidiEvent::NoteOff { note } => note,
        }
    }

    pub fn to_vst(self) -> VstMidiEvent {
        let status = match self {
            MidiEvent::NoteOn { .. } => STATUS_NOTE_ON,
            MidiEvent::NoteOff { .. } => STATUS_NOTE_OFF,
        };
        VstMidiEvent {
            event_type: abi::MIDI_TYPE,
            byte_size: std::mem::size_of::<VstMidiEvent>() as i32,
            delta_frames: 0,
            flags: abi::MIDI_EVENT_IS_REALTIME,
            note_length: 0,
            note_offset: 0,
            midi_data: [status, self.note(), NOTE_VELOCITY, 0],
            detune: 0,
            note_off_velocity: NOTE_OFF_VELOCITY,
            reserved1: 0,
            reserved2: 0,
        }
    }

    /// Decode a channel-voice note event. Note-on with velocity 0 reads as note-off.
    pub fn from_vst(event: &VstMidiEvent) -> Option<Self> {
        if event.event_type != abi::MIDI_TYPE {
            return None;
        }
        let [status, note, velocity, _] = event.midi_data;
        match status & 0xF0 {
            STATUS_NOTE_ON if velocity > 0 => Some(MidiEvent::note_on(note)),
            STATUS_NOTE_ON | STATUS_NOTE_OFF => Some(MidiEvent::note_off(note)),
            _ => None,
        }
    }
}

/// Pending events waiting for the next render cycle.
pub struct EventQueue {
    pending: Mutex<Vec<MidiEvent>>,
    capacity: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CAPACITY)
    }

    /// Queue holding at most `capacity` events, capped at [`EVENT_CAPACITY`] so a
    /// full queue always fits in one batch.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(EVENT_CAPACITY);
        Self {
            pending: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event. Fails instead of growing once `capacity` events are pending.
    pub fn push(&self, event: MidiEvent) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.len() >= self.capacity {
            return Err(HostError::EventQueueFull {
                capacity: self.capacity,
            });
        }
        pending.push(event);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Exchange the pending queue with `draining`, which must be empty.
    fn swap(&self, draining: &mut Vec<MidiEvent>) {
        debug_assert!(draining.is_empty());
        std::mem::swap(&mut *self.pending.lock(), draining);
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable producer handle for the control thread.
#[derive(Clone)]
pub struct EventSender {
    queue: Arc<EventQueue>,
}

impl EventSender {
    pub fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }

    pub fn send(&self, event: MidiEvent) -> Result<()> {
        self.queue.push(event).inspect_err(|_| {
            tracing::warn!(?event, "event queue full, dropping event");
        })
    }

    pub fn note_on(&self, note: u8) -> Result<()> {
        self.send(MidiEvent::note_on(note))
    }

    pub fn note_off(&self, note: u8) -> Result<()> {
        self.send(MidiEvent::note_off(note))
    }
}

/// Reusable per-cycle batch storage owned by the render side.
pub struct EventBatch {
    drained: Vec<MidiEvent>,
    events: Box<[VstMidiEvent]>,
    header: Box<VstEvents<EVENT_CAPACITY>>,
}

// SAFETY: the raw pointers in `header` only ever point into `events`, which the
// batch owns; the batch is moved between threads as a unit.
unsafe impl Send for EventBatch {}

impl EventBatch {
    pub fn new() -> Self {
        Self {
            drained: Vec::with_capacity(EVENT_CAPACITY),
            events: vec![VstMidiEvent::default(); EVENT_CAPACITY].into_boxed_slice(),
            header: Box::new(VstEvents {
                num_events: 0,
                reserved: 0,
                events: [ptr::null_mut(); EVENT_CAPACITY],
            }),
        }
    }

    /// Take everything pending in `queue` and encode it. Returns the event count.
    pub fn fill_from(&mut self, queue: &EventQueue) -> usize {
        self.clear();
        queue.swap(&mut self.drained);

        // Queue capacity never exceeds the arena.
        debug_assert!(self.drained.len() <= EVENT_CAPACITY);
        let count = self.drained.len().min(EVENT_CAPACITY);
        for (i, event) in self.drained.iter().take(count).enumerate() {
            self.events[i] = event.to_vst();
            self.header.events[i] = &mut self.events[i] as *mut VstMidiEvent as *mut VstEvent;
        }
        self.header.num_events = count as i32;
        count
    }

    pub fn len(&self) -> usize {
        self.header.num_events as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events encoded by the last [`fill_from`](Self::fill_from).
    pub fn events(&self) -> &[MidiEvent] {
        &self.drained[..self.len()]
    }

    /// Batch pointer for `effProcessEvents`, valid until the next fill or clear.
    pub fn as_vst_events(&mut self) -> *mut VstEvents<EVENT_CAPACITY> {
        &mut *self.header
    }

    pub fn clear(&mut self) {
        self.drained.clear();
        self.header.num_events = 0;
    }
}

impl Default for EventBatch {
    fn default() -> Self {
        Self::new()
    }
}
