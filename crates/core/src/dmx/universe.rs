use std::collections::{BTreeMap, HashMap};

use lumen_fixtures::{ChannelKind, FixtureInstance, FixtureLibrary, FixtureModel};

use super::frame::{blank_frame, Frame};
use crate::error::{LumenError, Result};
use crate::show::scene::Scene;

/// One active 512-channel universe: a set of patched fixture instances plus
/// the frame derived from them. The frame is always a cache, never the
/// source of truth — it is recomputed from `instances` on demand.
pub struct Universe {
    pub id: u8,
    pub name: String,
    pub instances: Vec<FixtureInstance>,
}

impl Universe {
    pub fn new(id: u8, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            instances: Vec::new(),
        }
    }

/// Adds an instance, rejecting it with `AddressOverlap` if its address
    /// range collides with any existing instance or runs past channel 512.
    /// The universe is left unmutated on failure. `model` must be the
    /// instance's own model (for its channel count); existing instances'
    /// channel counts are resolved from `library` by their stored model name.
    pub fn add_instance(
        &mut self,
        instance: FixtureInstance,
        model: &FixtureModel,
        library: &FixtureLibrary,
    ) -> Result<()> {
        let new_start = instance.start_address;
        let new_end = instance.end_address(model.channel_count());

        if new_end > 512 {
            return Err(LumenError::AddressOverlap {
                start: new_start,
                end: new_end,
            });
        }

        for existing in &self.instances {
            let existing_count = library
                .get(&existing.model_name)
                .map(|m| m.channel_count())
                .unwrap_or(existing.current_values.len());
            let existing_end = existing.end_address(existing_count);
            let overlaps = new_start <= existing_end && new_end >= existing.start_address;
            if overlaps {
                return Err(LumenError::AddressOverlap {
                    start: new_start,
                    end: new_end,
                });
            }
        }

        self.instances.push(instance);
        Ok(())
    }

    pub fn remove_instance(&mut self, instance_id: usize) {
        self.instances.retain(|i| i.id != instance_id);
    }

    pub fn set_value(&mut self, instance_id: usize, channel_index: usize, value: u8) {
        if let Some(instance) = self.instances.iter_mut().find(|i| i.id == instance_id) {
            instance.set_value(channel_index, value);
        }
    }

    /// Recomputes the 512-byte output frame from `instances` and their
    /// `current_values`. Two passes: classify each covered address as
    /// HTP/LTP, then write HTP addresses as the max across covering
    /// instances and LTP addresses as the last writer in iteration order.
    pub fn snapshot_frame(&self, library: &FixtureLibrary) -> Frame {
        let mut frame = blank_frame();
        let mut classification: HashMap<usize, ChannelKind> = HashMap::new();

        for instance in &self.instances {
            let Some(model) = library.get(&instance.model_name) else {
                continue;
            };
            for (offset, descriptor) in model.channels.iter().enumerate() {
                let address = instance.start_address as usize + offset - 1;
                if address >= 512 {
                    continue;
                }
                let kind = ChannelKind::classify(descriptor);
                classification
                    .entry(address)
                    .and_modify(|existing| {
                        if kind == ChannelKind::Htp {
                            *existing = ChannelKind::Htp;
                        }
                    })
                    .or_insert(kind);
            }
        }

        for instance in &self.instances {
            let Some(model) = library.get(&instance.model_name) else {
                continue;
            };
            for (offset, value) in instance.current_values.iter().enumerate() {
                let address = instance.start_address as usize + offset - 1;
                if address >= 512 {
                    continue;
                }
                match classification.get(&address) {
                    Some(ChannelKind::Htp) => {
                        frame[address] = frame[address].max(*value);
                    }
                    _ => {
                        frame[address] = *value;
                    }
                }
            }
            let _ = model;
        }

        frame
    }

    /// Copies each instance's current values into `{absolute_address: value}`,
    /// covering only addresses actually occupied by an instance.
    pub fn capture_scene(&self, name: impl Into<String>) -> Scene {
        let mut values = BTreeMap::new();
        for instance in &self.instances {
            for (offset, value) in instance.current_values.iter().enumerate() {
                let address = instance.start_address as usize + offset;
                values.insert(address as u16, *value);
            }
        }
        Scene {
            name: name.into(),
            values,
        }
    }

    /// Writes scene entries into the covered instance's channel slot.
    /// Addresses not covered by any instance are silently ignored.
    pub fn apply_scene(&mut self, scene: &Scene) {
        for (&address, &value) in &scene.values {
            for instance in &mut self.instances {
                let count = instance.current_values.len();
                if count == 0 {
                    continue;
                }
                let start = instance.start_address;
                let end = start + count as u16 - 1;
                if address >= start && address <= end {
                    let offset = (address - start) as usize;
                    instance.set_value(offset, value);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_fixtures::{ChannelDescriptor, FixtureModel};

    fn dimmer_par() -> FixtureModel {
        FixtureModel {
            name: "Par".to_string(),
            channels: vec![ChannelDescriptor {
                name: "Dimmer".to_string(),
                function: "intensity".to_string(),
                default_value: 0,
            }],
        }
    }

    fn rgb_fixture() -> FixtureModel {
        FixtureModel {
            name: "Rgb".to_string(),
            channels: vec![
                ChannelDescriptor {
                    name: "Red".to_string(),
                    function: "colour".to_string(),
                    default_value: 0,
                },
                ChannelDescriptor {
                    name: "Green".to_string(),
                    function: "colour".to_string(),
                    default_value: 0,
                },
            ],
        }
    }

    #[test]
    fn overlap_rejection_leaves_universe_unmutated() {
        let mut library = FixtureLibrary::new();
        library.insert(rgb_fixture());
        let mut universe = Universe::new(0, "stage");

        let model = library.get("Rgb").unwrap().clone();
        let a = FixtureInstance::new(0, "A", &model, 0, 10);
        universe.add_instance(a, &model, &library).unwrap();
        assert_eq!(universe.instances.len(), 1);

        let b = FixtureInstance::new(1, "B", &model, 0, 11);
        let err = universe.add_instance(b, &model, &library).unwrap_err();
        assert!(matches!(err, LumenError::AddressOverlap { .. }));
        assert_eq!(universe.instances.len(), 1);
    }

    #[test]
    fn htp_merge_takes_max_across_instances() {
        let mut library = FixtureLibrary::new();
        library.insert(dimmer_par());
        let mut universe = Universe::new(0, "stage");

        let mut a = FixtureInstance::new(0, "A", library.get("Par").unwrap(), 0, 1);
        a.set_value(0, 200);
        let mut b = FixtureInstance::new(1, "B", library.get("Par").unwrap(), 0, 1);
        b.set_value(0, 50);

        // Same address deliberately, to exercise the max-across-instances rule.
        universe.instances.push(a);
        universe.instances.push(b);

        let frame = universe.snapshot_frame(&library);
        assert_eq!(frame[0], 200);
    }

    #[test]
    fn capture_then_apply_round_trips_values() {
        let mut library = FixtureLibrary::new();
        library.insert(rgb_fixture());
        let mut universe = Universe::new(0, "stage");
        let model = library.get("Rgb").unwrap().clone();
        let mut a = FixtureInstance::new(0, "A", &model, 0, 1);
        a.set_value(0, 77);
        a.set_value(1, 12);
        universe.add_instance(a, &model, &library).unwrap();

        let before = universe.snapshot_frame(&library);
        let scene = universe.capture_scene("cap");

        universe.instances[0].set_value(0, 0);
        universe.instances[0].set_value(1, 0);
        universe.apply_scene(&scene);

        let after = universe.snapshot_frame(&library);
        assert_eq!(before, after);
    }
}
