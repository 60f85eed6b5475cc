use std::collections::HashMap;
use std::time::{Duration, Instant};

use lumen_fixtures::FixtureLibrary;

use crate::dmx::frame::Frame;
use crate::dmx::universe::Universe;
use crate::layering::LayeringPipeline;
use crate::show::scene::{ActiveScene, Chaser, Scene};

/// Rate at which a fading chaser step is advanced and re-rendered.
pub const FADE_TICK_HZ: u64 = 100;

#[derive(Clone)]
enum ChaserState {
    Idle,
    Holding {
        step_index: usize,
        deadline: Instant,
    },
    FadingIn {
        step_index: usize,
        start: Instant,
        duration: Duration,
        step_deadline: Instant,
        start_frame: Frame,
        target_frame: Frame,
    },
}

/// Drives one running chaser. Step timing uses a single monotonic
/// `step_deadline` (`fade_start + fade_in + hold`) rather than two
/// independently-ticking timers, so fade and hold never drift apart.
pub struct ChaserRuntime {
    chaser: Option<Chaser>,
    state: ChaserState,
}

impl ChaserRuntime {
    pub fn new() -> Self {
        Self {
            chaser: None,
            state: ChaserState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.state, ChaserState::Idle)
    }

    pub fn current_step_index(&self) -> Option<usize> {
        match self.state {
            ChaserState::Idle => None,
            ChaserState::Holding { step_index, .. } => Some(step_index),
            ChaserState::FadingIn { step_index, .. } => Some(step_index),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn start(
        &mut self,
        chaser: Chaser,
        universe: &Universe,
        library: &FixtureLibrary,
        pipeline: &LayeringPipeline,
        scenes: &HashMap<String, Scene>,
        active_scenes: &[ActiveScene],
        master_dimmer: u8,
        now: Instant,
    ) {
        self.chaser = Some(chaser);
        self.enter_step(0, universe, library, pipeline, scenes, active_scenes, master_dimmer, now);
    }

    /// Idempotent: transitions to Idle regardless of current state.
    pub fn stop(&mut self) {
        self.chaser = None;
        self.state = ChaserState::Idle;
    }

    #[allow(clippy::too_many_arguments)]
    fn enter_step(
        &mut self,
        step_index: usize,
        universe: &Universe,
        library: &FixtureLibrary,
        pipeline: &LayeringPipeline,
        scenes: &HashMap<String, Scene>,
        active_scenes: &[ActiveScene],
        master_dimmer: u8,
        now: Instant,
    ) {
        let Some(chaser) = &self.chaser else {
            self.state = ChaserState::Idle;
            return;
        };
        let Some(step) = chaser.steps.get(step_index) else {
            self.state = ChaserState::Idle;
            return;
        };
        let Some(step_scene) = scenes.get(&step.scene_name) else {
            self.state = ChaserState::Idle;
            return;
        };

        let fade_in = step.fade_in_secs.max(0.0);
        let hold = step.hold_secs.max(0.0);
        // A step with no hold and no fade-in would otherwise re-enter itself
        // on every call with the same `now`, recursing forever in `tick`. Give
        // it a 10ms one-shot instead, per the zero-duration edge policy.
        let step_deadline = if fade_in + hold <= 0.0 {
            now + Duration::from_millis(10)
        } else {
            now + Duration::from_secs_f64(fade_in + hold)
        };

        if fade_in > 0.0 {
            let (_, start_frame) = pipeline.compose(universe, library, active_scenes, scenes, master_dimmer);
            let (_, target_frame) = pipeline.compose_with_step(
                universe,
                library,
                active_scenes,
                scenes,
                step_scene,
                master_dimmer,
            );
            self.state = ChaserState::FadingIn {
                step_index,
                start: now,
                duration: Duration::from_secs_f64(fade_in),
                step_deadline,
                start_frame,
                target_frame,
            };
        } else {
            self.state = ChaserState::Holding {
                step_index,
                deadline: step_deadline,
            };
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn advance(
        &mut self,
        step_index: usize,
        universe: &Universe,
        library: &FixtureLibrary,
        pipeline: &LayeringPipeline,
        scenes: &HashMap<String, Scene>,
        active_scenes: &[ActiveScene],
        master_dimmer: u8,
        now: Instant,
    ) {
        let Some(chaser) = &self.chaser else { return };
        if chaser.steps.is_empty() {
            self.state = ChaserState::Idle;
            return;
        }
        let next = (step_index + 1) % chaser.steps.len();
        self.enter_step(next, universe, library, pipeline, scenes, active_scenes, master_dimmer, now);
    }

    /// Advances past any elapsed deadlines and returns the frame to output
    /// for `now`, or `None` if no chaser is running. Call at `FADE_TICK_HZ`.
    #[allow(clippy::too_many_arguments)]
    pub fn tick(
        &mut self,
        now: Instant,
        universe: &Universe,
        library: &FixtureLibrary,
        pipeline: &LayeringPipeline,
        scenes: &HashMap<String, Scene>,
        active_scenes: &[ActiveScene],
        master_dimmer: u8,
    ) -> Option<Frame> {
        match self.state.clone() {
            ChaserState::Idle => None,
            ChaserState::Holding { step_index, deadline } => {
                if now >= deadline {
                    self.advance(step_index, universe, library, pipeline, scenes, active_scenes, master_dimmer, now);
                    return self.tick(now, universe, library, pipeline, scenes, active_scenes, master_dimmer);
                }
                let chaser = self.chaser.as_ref()?;
                let step = chaser.steps.get(step_index)?;
                let step_scene = scenes.get(&step.scene_name)?;
                let (_, dimmed) = pipeline.compose_with_step(
                    universe,
                    library,
                    active_scenes,
                    scenes,
                    step_scene,
                    master_dimmer,
                );
                Some(dimmed)
            }
            ChaserState::FadingIn {
                step_index,
                start,
                duration,
                step_deadline,
                start_frame,
                target_frame,
            } => {
                if now >= step_deadline {
                    self.advance(step_index, universe, library, pipeline, scenes, active_scenes, master_dimmer, now);
                    return self.tick(now, universe, library, pipeline, scenes, active_scenes, master_dimmer);
                }
                let elapsed = now.saturating_duration_since(start);
                let t = if duration.is_zero() {
                    1.0
                } else {
                    (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
                };
                Some(interpolate(&start_frame, &target_frame, t))
            }
        }
    }
}

impl Default for ChaserRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear interpolation between two already-attenuated (post-MDA) frames,
/// rounding each byte half-away-from-zero rather than truncating.
fn interpolate(start: &Frame, target: &Frame, t: f64) -> Frame {
    let mut out = [0u8; 512];
    for i in 0..512 {
        let s = start[i] as f64;
        let e = target[i] as f64;
        let v = s + (e - s) * t;
        out[i] = round_half_away_from_zero(v).clamp(0.0, 255.0) as u8;
    }
    out
}

fn round_half_away_from_zero(v: f64) -> f64 {
    if v >= 0.0 {
        (v + 0.5).floor()
    } else {
        (v - 0.5).ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_fixtures::{ChannelDescriptor, FixtureInstance, FixtureModel};
    use std::collections::BTreeMap;

    fn scene(name: &str, values: &[(u16, u8)]) -> Scene {
        Scene {
            name: name.to_string(),
            values: values.iter().cloned().collect::<BTreeMap<_, _>>(),
        }
    }

    fn two_step_chaser() -> Chaser {
        Chaser {
            name: "chase".to_string(),
            steps: vec![
                crate::show::scene::ChaserStep {
                    scene_name: "a".to_string(),
                    hold_secs: 1.0,
                    fade_in_secs: 0.0,
                    fade_out_secs: 0.0,
                },
                crate::show::scene::ChaserStep {
                    scene_name: "b".to_string(),
                    hold_secs: 1.0,
                    fade_in_secs: 0.0,
                    fade_out_secs: 0.0,
                },
            ],
        }
    }

    fn patched_universe() -> (Universe, FixtureLibrary) {
        let mut library = FixtureLibrary::new();
        library.insert(FixtureModel {
            name: "Dimmer".to_string(),
            channels: vec![ChannelDescriptor {
                name: "Dimmer".to_string(),
                function: "intensity".to_string(),
                default_value: 0,
            }],
        });
        let model = library.get("Dimmer").unwrap().clone();
        let mut universe = Universe::new(0, "stage");
        let instance = FixtureInstance::new(0, "D1", &model, 0, 1);
        universe.add_instance(instance, &model, &library).unwrap();
        (universe, library)
    }

    #[test]
    fn instant_steps_cycle_through_hold_deadlines() {
        let (universe, library) = patched_universe();
        let pipeline = LayeringPipeline::new();
        let mut scenes = HashMap::new();
        scenes.insert("a".to_string(), scene("a", &[(1, 100)]));
        scenes.insert("b".to_string(), scene("b", &[(1, 200)]));
        let active = vec![];

        let mut runtime = ChaserRuntime::new();
        let t0 = Instant::now();
        runtime.start(two_step_chaser(), &universe, &library, &pipeline, &scenes, &active, 255, t0);
        assert_eq!(runtime.current_step_index(), Some(0));

        let frame = runtime
            .tick(t0 + Duration::from_millis(10), &universe, &library, &pipeline, &scenes, &active, 255)
            .unwrap();
        assert_eq!(frame[0], 100);

        let frame = runtime
            .tick(t0 + Duration::from_millis(1100), &universe, &library, &pipeline, &scenes, &active, 255)
            .unwrap();
        assert_eq!(frame[0], 200);
        assert_eq!(runtime.current_step_index(), Some(1));
    }

    #[test]
    fn fade_interpolates_between_start_and_target() {
        let (universe, library) = patched_universe();
        let pipeline = LayeringPipeline::new();
        let mut scenes = HashMap::new();
        scenes.insert("a".to_string(), scene("a", &[(1, 0)]));
        scenes.insert("b".to_string(), scene("b", &[(1, 200)]));
        let active = vec![];

        let chaser = Chaser {
            name: "fade".to_string(),
            steps: vec![crate::show::scene::ChaserStep {
                scene_name: "b".to_string(),
                hold_secs: 0.0,
                fade_in_secs: 1.0,
                fade_out_secs: 0.0,
            }],
        };

        let mut runtime = ChaserRuntime::new();
        let t0 = Instant::now();
        runtime.start(chaser, &universe, &library, &pipeline, &scenes, &active, 255, t0);

        let mid = runtime
            .tick(t0 + Duration::from_millis(500), &universe, &library, &pipeline, &scenes, &active, 255)
            .unwrap();
        assert!(mid[0] > 50 && mid[0] < 150);
    }

    #[test]
    fn stop_returns_to_idle() {
        let (universe, library) = patched_universe();
        let pipeline = LayeringPipeline::new();
        let scenes = HashMap::new();
        let active = vec![];
        let mut runtime = ChaserRuntime::new();
        runtime.start(
            Chaser { name: "empty".to_string(), steps: vec![] },
            &universe,
            &library,
            &pipeline,
            &scenes,
            &active,
            255,
            Instant::now(),
        );
        assert!(!runtime.is_running());
        runtime.stop();
        assert!(!runtime.is_running());
    }

    #[test]
    fn manual_override_stop_then_fader_leaves_only_manual_value() {
        let (mut universe, library) = patched_universe();
        let pipeline = LayeringPipeline::new();
        let mut scenes = HashMap::new();
        scenes.insert("a".to_string(), scene("a", &[(1, 100)]));
        let active = vec![];

        let mut runtime = ChaserRuntime::new();
        runtime.start(
            Chaser {
                name: "solo".to_string(),
                steps: vec![crate::show::scene::ChaserStep {
                    scene_name: "a".to_string(),
                    hold_secs: 5.0,
                    fade_in_secs: 0.0,
                    fade_out_secs: 0.0,
                }],
            },
            &universe,
            &library,
            &pipeline,
            &scenes,
            &active,
            255,
            Instant::now(),
        );
        assert!(runtime.is_running());

        runtime.stop();
        universe.instances[0].set_value(0, 255);

        assert!(!runtime.is_running());
        let frame = universe.snapshot_frame(&library);
        assert_eq!(frame[0], 255);
    }
}
