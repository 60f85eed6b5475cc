use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::DecodedAudio;
use crate::show::song::LyricLine;

/// Unique identifier for each module type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Dmx,
    Audio,
    Midi,
    Lyrics,
}

/// One decoded track plus its routing, handed to the audio module when a
/// song is loaded. Carries the already-decoded PCM so the module never has
/// to touch the filesystem itself.
#[derive(Debug, Clone)]
pub struct AudioTrackSpec {
    pub audio: Arc<DecodedAudio>,
    pub channels_used: usize,
    pub output_start_channel: usize,
}

/// Events that can be sent between modules and the coordinator.
#[derive(Debug, Clone)]
pub enum ModuleEvent {
    /// DMX frame to output for the given universe.
    DmxOutput(u8, Vec<u8>),

    AudioPlay { offset_secs: f64 },
    AudioPause,
    AudioResume,
    AudioStop,
    AudioSeek { offset_secs: f64 },
    AudioSetVolume(f32),
    AudioPosition { position_secs: f64 },
    /// Replaces the track set the audio clock mixes, called on song load.
    AudioLoadTracks(Vec<AudioTrackSpec>),
    /// All loaded tracks reached end of file at or past the song duration;
    /// the audio module has already stopped itself.
    AudioEndOfSong,

    /// Inbound MIDI input event, already decoded.
    MidiInput { channel: u8, message: Vec<u8> },
    /// Request to send an outbound MIDI message on a named port.
    MidiOutput { port: String, message: Vec<u8> },
    /// Sets the BPM the outgoing MIDI clock ticks at, called on song load.
    SetClockBpm(f64),

    /// Active lyric line index changed.
    LyricIndexChanged(usize),
    /// No lyric line is active (clock stopped near the start).
    LyricsIdle,
    /// The lyric scheduler's clock reached the song's duration while stopped.
    LyricsEndOfSong,
    /// Replaces the scheduler's lyric lines and song duration, called on song load.
    LoadLyrics { lines: Vec<LyricLine>, duration_secs: f64 },

    Shutdown,
}

/// Messages passed between modules and the module manager.
#[derive(Debug)]
pub enum ModuleMessage {
    Event(ModuleEvent),
    Status(String),
    Error(String),
}

/// Trait every async module implements.
#[async_trait]
pub trait AsyncModule: Send + Sync {
    fn id(&self) -> ModuleId;

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn run(
        &mut self,
        rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn status(&self) -> HashMap<String, String>;
}
