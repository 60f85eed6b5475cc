pub mod project;
pub mod scene;
pub mod song;

pub use project::{Project, ProjectUniverse};
pub use scene::{ActiveScene, Chaser, ChaserStep, MidiActionKind, MidiMapping, MidiTriggerType, Scene};
pub use song::{Song, INTERNAL_DMX_PORT_TRIGGER};
