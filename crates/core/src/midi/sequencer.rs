use std::path::Path;
use std::time::Duration;

use midly::{MetaMessage, MidiMessage as MidlyMessage, Smf, Timing, TrackEventKind};

use crate::error::{LumenError, Result};
use crate::show::INTERNAL_DMX_PORT_TRIGGER;

pub const MIDI_CLOCK_START: u8 = 0xFA;
pub const MIDI_CLOCK_TICK: u8 = 0xF8;
pub const MIDI_CLOCK_STOP: u8 = 0xFC;
pub const MIDI_CLOCK_CONTINUE: u8 = 0xFB;
pub const MIDI_CLOCK_PPQN: u32 = 24;

/// Tick interval for the outgoing MIDI clock at the given BPM:
/// `(60 / bpm) / 24` seconds.
pub fn clock_tick_interval(bpm: f64) -> Duration {
    Duration::from_secs_f64((60.0 / bpm) / MIDI_CLOCK_PPQN as f64)
}

/// All-Notes-Off: CC 123, value 0, on one channel.
pub fn all_notes_off(channel: u8) -> Vec<u8> {
    vec![0xB0 | (channel & 0x0F), 123, 0]
}

/// Whether a MIDI track's configured output port routes to the internal
/// input router rather than any hardware port.
pub fn routes_internally(port_name: &str) -> bool {
    port_name == INTERNAL_DMX_PORT_TRIGGER
}

/// One scheduled output event: wait `delta` since the previous event, then
/// send `bytes` on `channel`.
#[derive(Clone, Debug)]
pub struct ScheduledEvent {
    pub delta: Duration,
    pub channel: u8,
    pub bytes: Vec<u8>,
}

/// Parses a Standard MIDI File into a flat, time-ordered list of events
/// with delta-since-previous timing, honoring tempo meta-events and
/// merging all tracks. `channel_override`, when set, replaces every
/// event's channel (used when a song's track maps to a single output
/// channel regardless of what the file itself specifies).
pub fn load_track_events(path: &Path, channel_override: Option<u8>) -> Result<Vec<ScheduledEvent>> {
    let data = std::fs::read(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    let smf = Smf::parse(&data).map_err(|e| LumenError::IoDecode(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as f64,
        Timing::Timecode(fps, subframe) => fps.as_f32() as f64 * subframe as f64,
    };

    let mut micros_per_beat = 500_000.0_f64; // 120 BPM default until a Tempo meta-event appears
    let mut absolute: Vec<(f64, u8, Vec<u8>)> = Vec::new();

    for track in smf.tracks.iter() {
        let mut elapsed_ticks: f64 = 0.0;
        let mut seconds: f64 = 0.0;
        for event in track {
            let delta_ticks = event.delta.as_int() as f64;
            seconds += (delta_ticks / ticks_per_beat) * (micros_per_beat / 1_000_000.0);
            elapsed_ticks += delta_ticks;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    micros_per_beat = t.as_int() as f64;
                }
                TrackEventKind::Midi { channel, message } => {
                    let out_channel = channel_override.unwrap_or(channel.as_int());
                    if let Some(bytes) = encode(message, out_channel) {
                        absolute.push((seconds, out_channel, bytes));
                    }
                }
                _ => {}
            }
        }
        let _ = elapsed_ticks;
    }

    absolute.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    let mut events = Vec::with_capacity(absolute.len());
    let mut previous = 0.0_f64;
    for (seconds, channel, bytes) in absolute {
        let delta = Duration::from_secs_f64((seconds - previous).max(0.0));
        previous = seconds;
        events.push(ScheduledEvent { delta, channel, bytes });
    }

    Ok(events)
}

fn encode(message: MidlyMessage, channel: u8) -> Option<Vec<u8>> {
    let status_channel = channel & 0x0F;
    match message {
        MidlyMessage::NoteOn { key, vel } => {
            if vel.as_int() > 0 {
                Some(vec![0x90 | status_channel, key.as_int(), vel.as_int()])
            } else {
                Some(vec![0x80 | status_channel, key.as_int(), 0])
            }
        }
        MidlyMessage::NoteOff { key, vel } => {
            Some(vec![0x80 | status_channel, key.as_int(), vel.as_int()])
        }
        MidlyMessage::Controller { controller, value } => {
            Some(vec![0xB0 | status_channel, controller.as_int(), value.as_int()])
        }
        MidlyMessage::ProgramChange { program } => {
            Some(vec![0xC0 | status_channel, program.as_int()])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_tick_interval_at_120_bpm_matches_spec_formula() {
        let interval = clock_tick_interval(120.0);
        let expected = (60.0 / 120.0) / 24.0;
        assert!((interval.as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn all_notes_off_uses_cc_123_value_0() {
        let bytes = all_notes_off(5);
        assert_eq!(bytes, vec![0xB5, 123, 0]);
    }

    #[test]
    fn internal_trigger_sentinel_is_recognized() {
        assert!(routes_internally(INTERNAL_DMX_PORT_TRIGGER));
        assert!(!routes_internally("IAC Driver Bus 1"));
    }
}
