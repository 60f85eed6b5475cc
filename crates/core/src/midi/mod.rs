pub mod router;
pub mod sequencer;
pub mod types;

pub use router::{Dispatch, MidiRouter, RouterAction};
pub use sequencer::{
    all_notes_off, clock_tick_interval, load_track_events, routes_internally, ScheduledEvent,
    MIDI_CLOCK_CONTINUE, MIDI_CLOCK_PPQN, MIDI_CLOCK_START, MIDI_CLOCK_STOP, MIDI_CLOCK_TICK,
};
pub use types::MidiMessage;
