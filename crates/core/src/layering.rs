use std::collections::HashMap;

use lumen_fixtures::FixtureLibrary;

use crate::dmx::frame::Frame;
use crate::dmx::universe::Universe;
use crate::show::scene::{ActiveScene, Scene};

/// Where a covered address's owning instance/channel live, rebuilt whenever
/// the patch changes. Used to write composed values back into instance
/// buffers after every pipeline pass.
#[derive(Clone, Copy)]
struct Coverage {
    instance_id: usize,
    channel_index: usize,
}

/// Composes the four-layer DMX output: Default (Blackout/manual programmer
/// values) → Scene Layer Result → Chaser Step Layer → Master Dimmer
/// Attenuation. Produces both the undimmed (pre-MDA) and dimmed (post-MDA)
/// 512-byte frames so that fader positions can reflect pre-MDA values while
/// the driver only ever sees the dimmed frame (see `DESIGN.md`'s resolution
/// of the double-dimming open question).
///
/// The Default layer is not a cached snapshot: it is read live from each
/// instance's `current_values` at composition time, via the same HTP/LTP
/// merge `Universe::snapshot_frame` already performs. This is deliberate —
/// a fader written through the programmer mutates `current_values`
/// directly, so it is already "the default" the next composition falls
/// back to wherever no active scene or chaser step covers that address.
pub struct LayeringPipeline {
    coverage: HashMap<usize, Coverage>,
}

impl LayeringPipeline {
    pub fn new() -> Self {
        Self {
            coverage: HashMap::new(),
        }
    }

    /// Rebuilds the address→instance/channel map from the current patch.
    /// Call after any fixture add/remove.
    ///
    /// Addresses here are 1-based DMX addresses, matching `Scene::values`
    /// and `Universe::capture_scene`; they are converted to 0-based frame
    /// indices at the point of use.
    pub fn rebuild_coverage(&mut self, universe: &Universe, library: &FixtureLibrary) {
        self.coverage.clear();

        for instance in &universe.instances {
            let Some(model) = library.get(&instance.model_name) else {
                continue;
            };
            for (channel_index, _) in model.channels.iter().enumerate() {
                let address = instance.start_address as usize + channel_index;
                if address == 0 || address > 512 {
                    continue;
                }
                self.coverage.insert(
                    address,
                    Coverage {
                        instance_id: instance.id,
                        channel_index,
                    },
                );
            }
        }
    }

    /// The Scene Layer Result: HTP combination of all active scenes, each
    /// scaled by its submaster. Addresses absent from every active scene
    /// fall through to the live Default layer.
    pub fn scene_layer_result(
        &self,
        universe: &Universe,
        library: &FixtureLibrary,
        active_scenes: &[ActiveScene],
        scenes: &HashMap<String, Scene>,
    ) -> Frame {
        let mut frame = universe.snapshot_frame(library);
        let mut touched = [false; 512];

        for active in active_scenes {
            let Some(scene) = scenes.get(&active.scene_name) else {
                continue;
            };
            for (&address, &value) in &scene.values {
                let address = address as usize;
                if address == 0 || address > 512 {
                    continue;
                }
                let idx = address - 1;
                let scaled = ((value as u32 * active.master as u32) / 255) as u8;
                if touched[idx] {
                    frame[idx] = frame[idx].max(scaled);
                } else {
                    frame[idx] = scaled;
                    touched[idx] = true;
                }
            }
        }

        frame
    }

    /// The Chaser Step Layer: addresses present in `step_scene` selectively
    /// override the Scene Layer Result (last-writer, not blended).
    pub fn chaser_step_layer(&self, slr: &Frame, step_scene: &Scene) -> Frame {
        let mut frame = *slr;
        for (&address, &value) in &step_scene.values {
            let address = address as usize;
            if address >= 1 && address <= 512 {
                frame[address - 1] = value;
            }
        }
        frame
    }

    /// Master Dimmer Attenuation: multiply every byte by `master/255`,
    /// integer-truncated, applied non-selectively.
    pub fn apply_mda(&self, frame: &Frame, master_dimmer: u8) -> Frame {
        let mut out = *frame;
        for byte in out.iter_mut() {
            *byte = ((*byte as u32 * master_dimmer as u32) / 255) as u8;
        }
        out
    }

    /// Full pipeline with no chaser running: Default → SLR → MDA.
    pub fn compose(
        &self,
        universe: &Universe,
        library: &FixtureLibrary,
        active_scenes: &[ActiveScene],
        scenes: &HashMap<String, Scene>,
        master_dimmer: u8,
    ) -> (Frame, Frame) {
        let slr = self.scene_layer_result(universe, library, active_scenes, scenes);
        let dimmed = self.apply_mda(&slr, master_dimmer);
        (slr, dimmed)
    }

    /// Full pipeline with a chaser step applied (no fade in progress):
    /// Default → SLR → CSL → MDA.
    #[allow(clippy::too_many_arguments)]
    pub fn compose_with_step(
        &self,
        universe: &Universe,
        library: &FixtureLibrary,
        active_scenes: &[ActiveScene],
        scenes: &HashMap<String, Scene>,
        step_scene: &Scene,
        master_dimmer: u8,
    ) -> (Frame, Frame) {
        let slr = self.scene_layer_result(universe, library, active_scenes, scenes);
        let csl = self.chaser_step_layer(&slr, step_scene);
        let dimmed = self.apply_mda(&csl, master_dimmer);
        (csl, dimmed)
    }

    /// Writes the undimmed composed frame back into each covered instance's
    /// `current_values`, so faders and any colour simulation track pre-MDA
    /// programmer values. Addresses with no covering instance are ignored.
    pub fn write_back(&self, universe: &mut Universe, undimmed: &Frame) {
        for (&address, coverage) in &self.coverage {
            if let Some(instance) = universe
                .instances
                .iter_mut()
                .find(|i| i.id == coverage.instance_id)
            {
                instance.set_value(coverage.channel_index, undimmed[address - 1]);
            }
        }
    }
}

impl Default for LayeringPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_fixtures::{ChannelDescriptor, FixtureInstance, FixtureModel};
    use std::collections::BTreeMap;

    fn scene(values: &[(u16, u8)]) -> Scene {
        Scene {
            name: "s".to_string(),
            values: values.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }

    fn two_channel_dimmer_model() -> FixtureModel {
        FixtureModel {
            name: "Dual".to_string(),
            channels: vec![
                ChannelDescriptor { name: "Dimmer 1".to_string(), function: "intensity".to_string(), default_value: 0 },
                ChannelDescriptor { name: "Dimmer 2".to_string(), function: "intensity".to_string(), default_value: 0 },
            ],
        }
    }

    fn patched_universe() -> (Universe, FixtureLibrary) {
        let mut library = FixtureLibrary::new();
        library.insert(two_channel_dimmer_model());
        let model = library.get("Dual").unwrap().clone();
        let mut universe = Universe::new(0, "stage");
        let instance = FixtureInstance::new(0, "Dual 1", &model, 0, 1);
        universe.add_instance(instance, &model, &library).unwrap();
        (universe, library)
    }

    #[test]
    fn htp_dimmer_merge_across_two_scenes() {
        let (universe, library) = patched_universe();
        let mut pipeline = LayeringPipeline::new();
        pipeline.rebuild_coverage(&universe, &library);

        let mut scenes = HashMap::new();
        scenes.insert("X".to_string(), scene(&[(1, 200), (2, 100)]));
        scenes.insert("Y".to_string(), scene(&[(1, 50), (2, 180)]));

        let active = vec![
            ActiveScene { scene_name: "X".to_string(), master: 255 },
            ActiveScene { scene_name: "Y".to_string(), master: 255 },
        ];

        let (_, dimmed) = pipeline.compose(&universe, &library, &active, &scenes, 255);
        assert_eq!(dimmed[0], 200);
        assert_eq!(dimmed[1], 180);

        let (_, dimmed_half) = pipeline.compose(&universe, &library, &active, &scenes, 128);
        assert!((dimmed_half[0] as i32 - 100).abs() <= 1);
        assert!((dimmed_half[1] as i32 - 90).abs() <= 1);
    }

    #[test]
    fn master_dimmer_pipeline_is_linear_within_one_lsb() {
        let (universe, library) = patched_universe();
        let mut pipeline = LayeringPipeline::new();
        pipeline.rebuild_coverage(&universe, &library);

        let mut scenes = HashMap::new();
        scenes.insert("X".to_string(), scene(&[(1, 200)]));
        let active = vec![ActiveScene { scene_name: "X".to_string(), master: 255 }];

        let (_, full) = pipeline.compose(&universe, &library, &active, &scenes, 255);
        let (_, at_128) = pipeline.compose(&universe, &library, &active, &scenes, 128);

        let expected = ((full[0] as u32 * 128) / 255) as i32;
        assert!((at_128[0] as i32 - expected).abs() <= 1);
    }

    #[test]
    fn addresses_absent_from_every_active_scene_fall_back_to_manual_value() {
        let (mut universe, library) = patched_universe();
        universe.instances[0].set_value(1, 77);
        let mut pipeline = LayeringPipeline::new();
        pipeline.rebuild_coverage(&universe, &library);

        let mut scenes = HashMap::new();
        scenes.insert("X".to_string(), scene(&[(1, 200)]));
        let active = vec![ActiveScene { scene_name: "X".to_string(), master: 255 }];

        let (_, dimmed) = pipeline.compose(&universe, &library, &active, &scenes, 255);
        assert_eq!(dimmed[0], 200);
        assert_eq!(dimmed[1], 77);
    }
}
