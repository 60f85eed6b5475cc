pub mod clock;
pub mod decode;

pub use clock::AudioClock;
pub use clock::RoutedTrack;
pub use decode::{decode_file, DecodedAudio};
