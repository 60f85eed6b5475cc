use std::fmt;

/// The error taxonomy shared by every component of the show engine.
///
/// Each variant corresponds to a distinct recovery policy; see the module that
/// raises it for what happens after construction (most are logged and
/// recovered locally rather than propagated to a caller that would abort).
#[derive(Debug, Clone)]
pub enum LumenError {
    /// A serial/MIDI transport failed to open or dropped mid-session.
    PortUnavailable(String),
    /// Malformed JSON or an unreadable media file.
    IoDecode(String),
    /// A fixture's address range collides with an already-patched instance.
    AddressOverlap { start: u16, end: u16 },
    /// A chaser step has hold, fade_in, and fade_out all zero.
    InvalidStep { step_index: usize },
    /// A MIDI mapping or command references a scene/chaser index that doesn't exist.
    ActionOutOfRange { index: i32 },
    /// No audio track is available to drive the master clock.
    ClockUnavailable,
    /// A bounded MIDI event queue overflowed and had to drop a message.
    EventLost,
}

impl fmt::Display for LumenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LumenError::PortUnavailable(name) => write!(f, "port unavailable: {}", name),
            LumenError::IoDecode(detail) => write!(f, "decode error: {}", detail),
            LumenError::AddressOverlap { start, end } => {
                write!(f, "address range {}..={} overlaps an existing instance", start, end)
            }
            LumenError::InvalidStep { step_index } => {
                write!(f, "chaser step {} has hold, fade_in and fade_out all zero", step_index)
            }
            LumenError::ActionOutOfRange { index } => {
                write!(f, "action references out-of-range index {}", index)
            }
            LumenError::ClockUnavailable => write!(f, "no audio track available to drive the master clock"),
            LumenError::EventLost => write!(f, "MIDI event queue overflowed, event dropped"),
        }
    }
}

impl std::error::Error for LumenError {}

pub type Result<T> = std::result::Result<T, LumenError>;
