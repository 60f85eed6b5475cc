use std::sync::Arc;

use parking_lot::RwLock;

use crate::show::{MidiActionKind, MidiMapping, MidiTriggerType};

use super::types::MidiMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterAction {
    ActivateScene(i32),
    ActivateChaser(i32),
    Stop,
}

/// A dispatch result: the index of the mapping that fired, the action it
/// names, and whether it is `internal_only` (meaning the matched message
/// should not also be forwarded to any external output port).
#[derive(Debug, Clone, Copy)]
pub struct Dispatch {
    pub mapping_index: usize,
    pub action: RouterAction,
    pub internal_only: bool,
}

/// Routes inbound MIDI input events to scene/chaser/stop actions.
///
/// The mapping set is held behind an `Arc` swapped atomically on update, so
/// a dispatch in progress always sees a consistent snapshot even if the
/// mapping list is replaced concurrently.
pub struct MidiRouter {
    mappings: RwLock<Arc<Vec<MidiMapping>>>,
    filter_channel: RwLock<u8>,
}

impl MidiRouter {
    pub fn new() -> Self {
        Self {
            mappings: RwLock::new(Arc::new(Vec::new())),
            filter_channel: RwLock::new(0),
        }
    }

    pub fn set_mappings(&self, mappings: Vec<MidiMapping>) {
        *self.mappings.write() = Arc::new(mappings);
    }

    /// 0 means "all channels".
    pub fn set_filter_channel(&self, channel: u8) {
        *self.filter_channel.write() = channel;
    }

    /// Current mapping set, for callers that need to read (and then
    /// append to, or edit) the list rather than replace it wholesale.
    pub fn mappings_snapshot(&self) -> Arc<Vec<MidiMapping>> {
        self.mappings.read().clone()
    }

    /// Returns at most one dispatch for the given inbound event, matching
    /// mappings in order and stopping at the first match.
    pub fn dispatch(&self, channel: u8, message: &MidiMessage) -> Option<Dispatch> {
        let filter = *self.filter_channel.read();
        if filter != 0 && channel != filter {
            return None;
        }

        let mappings = self.mappings.read().clone();
        for (mapping_index, mapping) in mappings.iter().enumerate() {
            if Self::matches(mapping, message) {
                let action = match mapping.action_type {
                    MidiActionKind::Scene => RouterAction::ActivateScene(mapping.action_index),
                    MidiActionKind::Chaser => RouterAction::ActivateChaser(mapping.action_index),
                    MidiActionKind::Stop => RouterAction::Stop,
                };
                return Some(Dispatch { mapping_index, action, internal_only: mapping.internal_only });
            }
        }
        None
    }

    fn matches(mapping: &MidiMapping, message: &MidiMessage) -> bool {
        match (mapping.trigger_type, message) {
            (MidiTriggerType::Note, MidiMessage::NoteOn { note, velocity }) => {
                *note == mapping.number && *velocity >= mapping.threshold
            }
            (MidiTriggerType::Cc, MidiMessage::ControlChange { controller, value }) => {
                *controller == mapping.number && *value >= mapping.threshold
            }
            (MidiTriggerType::Pc, MidiMessage::ProgramChange { program }) => {
                *program as u16 + 1 == mapping.number as u16
            }
            _ => false,
        }
    }
}

impl Default for MidiRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_mapping(number: u8, threshold: u8, action_index: i32, internal_only: bool) -> MidiMapping {
        MidiMapping {
            trigger_type: MidiTriggerType::Note,
            number,
            threshold,
            action_type: MidiActionKind::Scene,
            action_index,
            internal_only,
        }
    }

    #[test]
    fn note_on_above_threshold_triggers_scene() {
        let router = MidiRouter::new();
        router.set_mappings(vec![note_mapping(48, 1, 0, false)]);

        let dispatch = router
            .dispatch(3, &MidiMessage::NoteOn { note: 48, velocity: 64 })
            .unwrap();
        assert_eq!(dispatch.action, RouterAction::ActivateScene(0));
        assert!(!dispatch.internal_only);
    }

    #[test]
    fn note_off_does_not_match_a_note_on_mapping() {
        let router = MidiRouter::new();
        router.set_mappings(vec![note_mapping(48, 1, 0, false)]);
        assert!(router.dispatch(3, &MidiMessage::NoteOff { note: 48 }).is_none());
    }

    #[test]
    fn filter_channel_rejects_other_channels() {
        let router = MidiRouter::new();
        router.set_filter_channel(3);
        router.set_mappings(vec![note_mapping(48, 1, 0, false)]);
        assert!(router
            .dispatch(4, &MidiMessage::NoteOn { note: 48, velocity: 64 })
            .is_none());
    }

    #[test]
    fn first_match_wins_among_overlapping_mappings() {
        let router = MidiRouter::new();
        router.set_mappings(vec![note_mapping(48, 1, 0, false), note_mapping(48, 1, 1, false)]);
        let dispatch = router
            .dispatch(0, &MidiMessage::NoteOn { note: 48, velocity: 64 })
            .unwrap();
        assert_eq!(dispatch.mapping_index, 0);
    }

    #[test]
    fn program_change_matches_one_based_number() {
        let router = MidiRouter::new();
        router.set_mappings(vec![MidiMapping {
            trigger_type: MidiTriggerType::Pc,
            number: 5,
            threshold: 0,
            action_type: MidiActionKind::Chaser,
            action_index: 2,
            internal_only: false,
        }]);
        let dispatch = router
            .dispatch(0, &MidiMessage::ProgramChange { program: 4 })
            .unwrap();
        assert_eq!(dispatch.action, RouterAction::ActivateChaser(2));
    }
}
