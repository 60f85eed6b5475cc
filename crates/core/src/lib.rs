pub use config::{ConfigError, ConfigManager, ConfigSchema, Settings};
pub use coordinator::ShowCoordinator;
pub use error::{LumenError, Result};
pub use messages::{ShowCommand, ShowEvent};
pub use modules::{
    AsyncModule, AudioModule, DmxModule, LyricsModule, MidiModule, ModuleEvent, ModuleId,
    ModuleManager, ModuleMessage,
};

pub mod audio;
pub mod chaser_runtime;
pub mod config;
pub mod coordinator;
pub mod dmx;
pub mod error;
pub mod layering;
pub mod lyrics;
pub mod messages;
pub mod midi;
pub mod modules;
pub mod programmer;
pub mod show;
