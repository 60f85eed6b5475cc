use std::path::PathBuf;

use crate::show::{ActiveScene, Chaser, Scene};

/// Commands accepted by the show coordinator.
#[derive(Debug, Clone)]
pub enum ShowCommand {
    Initialize,
    Shutdown,

    NewProject,
    LoadProject { path: PathBuf },
    SaveProject { path: PathBuf },

    LoadSong { path: PathBuf },
    SaveSong { path: PathBuf },

    PatchFixture { model_name: String, universe: u8, address: u16, user_name: String },
    UnpatchFixture { instance_id: usize },

    SetFaderValue { instance_id: usize, channel_index: usize, value: u8 },
    ClearProgrammer,

    AddScene { scene_name: String },
    RemoveActiveScene { scene_name: String },
    CaptureScene { name: String },
    SaveScene { scene: Scene },

    StartChaser { chaser_name: String },
    StopChaser,
    SaveChaser { chaser: Chaser },

    SetMasterDimmer { value: u8 },

    Play,
    Pause,
    Stop,
    Seek { offset_secs: f64 },

    AddMidiMapping { mapping: crate::show::MidiMapping },
    RemoveMidiMapping { index: usize },
    InjectMidiEvent { channel: u8, message: Vec<u8> },
}

/// Events emitted by the show coordinator.
#[derive(Debug, Clone)]
pub enum ShowEvent {
    Initialized,
    ShutdownComplete,
    Error { message: String },

    ProjectLoaded,
    ProjectSaved { path: PathBuf },
    SongLoaded { name: String },
    SongSaved { path: PathBuf },

    FixturePatched { instance_id: usize },
    FixtureUnpatched { instance_id: usize },

    ActiveScenesChanged { scenes: Vec<ActiveScene> },
    ChaserStarted { chaser_name: String },
    ChaserStopped,
    ChaserStepChanged { step_index: usize },

    MasterDimmerChanged { value: u8 },

    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    PositionChanged { position_secs: f64 },

    LyricLineChanged { index: usize, line: String },
    LyricsIdle,
    LyricsEndOfSong,

    SongEnded,

    MidiMappingTriggered { index: usize },
}
