use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lumen_fixtures::{FixtureInstance, FixtureLibrary};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::audio::decode_file;
use crate::chaser_runtime::{ChaserRuntime, FADE_TICK_HZ};
use crate::dmx::Universe;
use crate::layering::LayeringPipeline;
use crate::messages::{ShowCommand, ShowEvent};
use crate::midi::{self, MidiMessage, MidiRouter, RouterAction};
use crate::modules::traits::AudioTrackSpec;
use crate::modules::{AsyncModule, AudioModule, DmxModule, LyricsModule, MidiModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage};
use crate::programmer::Programmer;
use crate::show::song::{colocate_media, AudioTrack};
use crate::show::{ActiveScene, Chaser, MidiMapping, Project, Scene, Song};

/// Master-dimmer slider events are coalesced into at most one pipeline pass
/// per window; the latest value wins.
const MASTER_DIMMER_DEBOUNCE: Duration = Duration::from_millis(20);

/// Cadence at which the video seek-slave hook is (re-)commanded to the
/// audio position.
const VIDEO_SYNC_INTERVAL: Duration = Duration::from_millis(50);

/// Video position is only corrected when it has drifted more than this
/// far from the audio clock, to avoid constant micro-seeks.
const VIDEO_DRIFT_THRESHOLD_SECS: f64 = 0.04;

/// Holds the loaded project, the active song, the active-scene/chaser
/// state, and orchestrates play/pause/stop/seek across the audio, MIDI and
/// lyrics modules. Runs as a single coordination task; module I/O is
/// offloaded to the tasks `ModuleManager` already owns.
pub struct ShowCoordinator {
    library: FixtureLibrary,
    data_root: PathBuf,
    project: Project,
    universe: Universe,
    pipeline: LayeringPipeline,
    scenes: HashMap<String, Scene>,
    chasers: HashMap<String, Chaser>,
    active_scenes: Vec<ActiveScene>,
    chaser_runtime: ChaserRuntime,
    master_dimmer: u8,
    pending_master_dimmer: Option<u8>,
    programmer: Programmer,
    router: Arc<MidiRouter>,
    modules: ModuleManager,
    current_song: Option<Song>,
    next_instance_id: usize,
    last_known_audio_position: f64,
    last_video_position: f64,
    self_tx: mpsc::Sender<ShowCommand>,
}

impl ShowCoordinator {
    /// Builds a coordinator with its module fleet registered (not yet
    /// started) and spawns its coordination task, returning the command
    /// sender and event receiver callers use to drive it.
    pub fn spawn(
        library: FixtureLibrary,
        data_root: PathBuf,
        dmx_port: String,
        audio_device: String,
        midi_device: String,
    ) -> (mpsc::Sender<ShowCommand>, mpsc::Receiver<ShowEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);

        let router = Arc::new(MidiRouter::new());

        let mut modules = ModuleManager::new();
        modules.register_module(Box::new(DmxModule::new(dmx_port)));
        modules.register_module(Box::new(AudioModule::new(audio_device)));
        modules.register_module(Box::new(MidiModule::new(midi_device, router.clone())));
        modules.register_module(Box::new(LyricsModule::new(Vec::new(), 1.0, 0.0)));

        let coordinator = Self {
            library,
            data_root,
            project: Project::default(),
            universe: Universe::new(0, "stage"),
            pipeline: LayeringPipeline::new(),
            scenes: HashMap::new(),
            chasers: HashMap::new(),
            active_scenes: Vec::new(),
            chaser_runtime: ChaserRuntime::new(),
            master_dimmer: 255,
            pending_master_dimmer: None,
            programmer: Programmer::new(),
            router,
            modules,
            current_song: None,
            next_instance_id: 0,
            last_known_audio_position: 0.0,
            last_video_position: 0.0,
            self_tx: cmd_tx.clone(),
        };

        tokio::spawn(coordinator.run(cmd_rx, event_tx));
        (cmd_tx, event_rx)
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<ShowCommand>, event_tx: mpsc::Sender<ShowEvent>) {
        if let Err(e) = self.modules.initialize().await {
            log::error!("module initialization failed: {}", e);
            let _ = event_tx.send(ShowEvent::Error { message: e.to_string() }).await;
        }
        if let Err(e) = self.modules.start().await {
            log::error!("module manager failed to start: {}", e);
            let _ = event_tx.send(ShowEvent::Error { message: e.to_string() }).await;
        }
        let _ = event_tx.send(ShowEvent::Initialized).await;

        let mut message_rx = self
            .modules
            .take_message_receiver()
            .expect("message receiver taken exactly once");

        let mut fade_ticker = interval(Duration::from_millis(1000 / FADE_TICK_HZ));
        let mut video_ticker = interval(VIDEO_SYNC_INTERVAL);
        let mut debounce_ticker = interval(MASTER_DIMMER_DEBOUNCE);
        let mut shutdown = false;

        while !shutdown {
            tokio::select! {
                Some(cmd) = cmd_rx.recv() => {
                    if matches!(cmd, ShowCommand::Shutdown) {
                        shutdown = true;
                    } else {
                        self.handle_command(cmd, &event_tx).await;
                    }
                }
                Some(message) = message_rx.recv() => {
                    self.handle_module_message(message, &event_tx).await;
                }
                _ = fade_ticker.tick() => {
                    self.tick_chaser(&event_tx).await;
                }
                _ = video_ticker.tick() => {
                    self.sync_video(&event_tx).await;
                }
                _ = debounce_ticker.tick() => {
                    self.flush_master_dimmer(&event_tx).await;
                }
            }
        }

        let _ = self.modules.shutdown().await;
        let _ = event_tx.send(ShowEvent::ShutdownComplete).await;
    }

    async fn handle_command(&mut self, cmd: ShowCommand, event_tx: &mpsc::Sender<ShowEvent>) {
        match cmd {
            ShowCommand::Initialize | ShowCommand::Shutdown => {}

            ShowCommand::NewProject => {
                self.project = Project::default();
                self.reset_show_state();
                let _ = event_tx.send(ShowEvent::ProjectLoaded).await;
            }
            ShowCommand::LoadProject { path } => {
                self.load_project(&path);
                let _ = event_tx.send(ShowEvent::ProjectLoaded).await;
            }
            ShowCommand::SaveProject { path } => match self.save_project(&path) {
                Ok(()) => {
                    let _ = event_tx.send(ShowEvent::ProjectSaved { path }).await;
                }
                Err(e) => {
                    let _ = event_tx.send(ShowEvent::Error { message: e.to_string() }).await;
                }
            },

            ShowCommand::LoadSong { path } => {
                self.load_song(&path, event_tx).await;
            }
            ShowCommand::SaveSong { path } => {
                if let Some(song) = &self.current_song {
                    match song.save(&path) {
                        Ok(()) => {
                            let _ = event_tx.send(ShowEvent::SongSaved { path }).await;
                        }
                        Err(e) => {
                            let _ = event_tx.send(ShowEvent::Error { message: e.to_string() }).await;
                        }
                    }
                }
            }

            ShowCommand::PatchFixture { model_name, universe, address, user_name } => {
                self.patch_fixture(model_name, universe, address, user_name, event_tx).await;
            }
            ShowCommand::UnpatchFixture { instance_id } => {
                self.universe.remove_instance(instance_id);
                self.pipeline.rebuild_coverage(&self.universe, &self.library);
                let _ = event_tx.send(ShowEvent::FixtureUnpatched { instance_id }).await;
            }

            ShowCommand::SetFaderValue { instance_id, channel_index, value } => {
                // Manual override: force the chaser to Idle before applying the fader change.
                self.chaser_runtime.stop();
                self.universe.set_value(instance_id, channel_index, value);
                self.recompose(event_tx).await;
            }
            ShowCommand::ClearProgrammer => {
                self.programmer.clear();
            }

            ShowCommand::AddScene { scene_name } => {
                if self.scenes.contains_key(&scene_name) {
                    self.active_scenes.push(ActiveScene { scene_name: scene_name.clone(), master: 255 });
                    self.recompose(event_tx).await;
                    let _ = event_tx
                        .send(ShowEvent::ActiveScenesChanged { scenes: self.active_scenes.clone() })
                        .await;
                } else {
                    let _ = event_tx
                        .send(ShowEvent::Error { message: format!("unknown scene '{}'", scene_name) })
                        .await;
                }
            }
            ShowCommand::RemoveActiveScene { scene_name } => {
                self.active_scenes.retain(|a| a.scene_name != scene_name);
                self.recompose(event_tx).await;
                let _ = event_tx
                    .send(ShowEvent::ActiveScenesChanged { scenes: self.active_scenes.clone() })
                    .await;
            }
            ShowCommand::CaptureScene { name } => {
                let scene = self.universe.capture_scene(name.clone());
                self.scenes.insert(name, scene);
            }
            ShowCommand::SaveScene { scene } => {
                self.scenes.insert(scene.name.clone(), scene);
            }

            ShowCommand::StartChaser { chaser_name } => {
                if let Some(chaser) = self.chasers.get(&chaser_name).cloned() {
                    self.chaser_runtime.start(
                        chaser,
                        &self.universe,
                        &self.library,
                        &self.pipeline,
                        &self.scenes,
                        &self.active_scenes,
                        self.master_dimmer,
                        Instant::now(),
                    );
                    let _ = event_tx.send(ShowEvent::ChaserStarted { chaser_name }).await;
                } else {
                    let _ = event_tx
                        .send(ShowEvent::Error { message: format!("unknown chaser '{}'", chaser_name) })
                        .await;
                }
            }
            ShowCommand::StopChaser => {
                self.chaser_runtime.stop();
                let _ = event_tx.send(ShowEvent::ChaserStopped).await;
            }
            ShowCommand::SaveChaser { chaser } => {
                if let Some(index) = chaser.steps.iter().position(|step| !step.is_valid()) {
                    let _ = event_tx
                        .send(ShowEvent::Error {
                            message: format!(
                                "chaser '{}' step {} has hold, fade_in and fade_out all zero",
                                chaser.name, index
                            ),
                        })
                        .await;
                } else {
                    self.chasers.insert(chaser.name.clone(), chaser);
                }
            }

            ShowCommand::SetMasterDimmer { value } => {
                self.pending_master_dimmer = Some(value);
            }

            ShowCommand::Play => {
                self.start_playback(event_tx).await;
            }
            ShowCommand::Pause => {
                self.broadcast_playback_event(ModuleEvent::AudioPause).await;
                let _ = event_tx.send(ShowEvent::PlaybackPaused).await;
            }
            ShowCommand::Stop => {
                self.broadcast_playback_event(ModuleEvent::AudioStop).await;
                let _ = self.modules.send_to_module(ModuleId::Midi, ModuleEvent::Shutdown).await;
                self.last_known_audio_position = 0.0;
                let _ = event_tx.send(ShowEvent::PlaybackStopped).await;
            }
            ShowCommand::Seek { offset_secs } => {
                self.broadcast_playback_event(ModuleEvent::AudioSeek { offset_secs }).await;
            }

            ShowCommand::AddMidiMapping { mapping } => {
                self.add_mapping(mapping);
            }
            ShowCommand::RemoveMidiMapping { index } => {
                let mut mappings = self.current_mappings();
                if index < mappings.len() {
                    mappings.remove(index);
                    self.router.set_mappings(mappings);
                }
            }
            ShowCommand::InjectMidiEvent { channel, message } => {
                if let Some(decoded) = MidiMessage::decode(&message) {
                    self.dispatch_midi(channel, &decoded, event_tx).await;
                }
            }
        }
    }

    async fn handle_module_message(&mut self, message: ModuleMessage, event_tx: &mpsc::Sender<ShowEvent>) {
        match message {
            ModuleMessage::Event(ModuleEvent::AudioPosition { position_secs }) => {
                self.last_known_audio_position = position_secs;
                let _ = self
                    .modules
                    .send_to_module(ModuleId::Lyrics, ModuleEvent::AudioPosition { position_secs })
                    .await;
                let _ = event_tx.send(ShowEvent::PositionChanged { position_secs }).await;
            }
            ModuleMessage::Event(ModuleEvent::LyricIndexChanged(index)) => {
                let line = self
                    .current_song
                    .as_ref()
                    .and_then(|song| song.lyrics.get(index))
                    .map(|l| l.line.clone())
                    .unwrap_or_default();
                let _ = event_tx.send(ShowEvent::LyricLineChanged { index, line }).await;
            }
            ModuleMessage::Event(ModuleEvent::MidiInput { channel, message }) => {
                if let Some(decoded) = MidiMessage::decode(&message) {
                    self.dispatch_midi(channel, &decoded, event_tx).await;
                }
            }
            ModuleMessage::Event(ModuleEvent::LyricsIdle) => {
                let _ = event_tx.send(ShowEvent::LyricsIdle).await;
            }
            ModuleMessage::Event(ModuleEvent::LyricsEndOfSong) => {
                let _ = event_tx.send(ShowEvent::LyricsEndOfSong).await;
            }
            ModuleMessage::Event(ModuleEvent::AudioEndOfSong) => {
                self.broadcast_playback_event(ModuleEvent::AudioStop).await;
                self.last_known_audio_position = 0.0;
                let _ = event_tx.send(ShowEvent::SongEnded).await;
            }
            ModuleMessage::Error(message) => {
                log::warn!("module error: {}", message);
                let _ = event_tx.send(ShowEvent::Error { message }).await;
            }
            ModuleMessage::Status(status) => {
                log::debug!("module status: {}", status);
            }
            _ => {}
        }
    }

    async fn dispatch_midi(&mut self, channel: u8, message: &MidiMessage, event_tx: &mpsc::Sender<ShowEvent>) {
        let Some(dispatch) = self.router.dispatch(channel, message) else { return };

        if dispatch.internal_only {
            // Nothing echoes dispatched input to an external port today; this
            // logs the suppression so a future echo path has to check the flag
            // rather than silently forward it.
            log::debug!(
                "MIDI mapping {} fired as internal_only; not eligible for external echo",
                dispatch.mapping_index
            );
        }

        match dispatch.action {
            RouterAction::ActivateScene(index) => match self.scene_name_at(index) {
                Some(scene_name) => {
                    if !self.active_scenes.iter().any(|a| a.scene_name == scene_name) {
                        self.active_scenes.push(ActiveScene { scene_name, master: 255 });
                        self.recompose(event_tx).await;
                    }
                }
                None => log::warn!("{}", crate::error::LumenError::ActionOutOfRange { index }),
            },
            RouterAction::ActivateChaser(index) => match self.chaser_at(index) {
                Some(chaser) => {
                    self.chaser_runtime.start(
                        chaser,
                        &self.universe,
                        &self.library,
                        &self.pipeline,
                        &self.scenes,
                        &self.active_scenes,
                        self.master_dimmer,
                        Instant::now(),
                    );
                }
                None => log::warn!("{}", crate::error::LumenError::ActionOutOfRange { index }),
            },
            RouterAction::Stop => {
                self.chaser_runtime.stop();
                self.active_scenes.clear();
                self.recompose(event_tx).await;
            }
        }

        let _ = event_tx
            .send(ShowEvent::MidiMappingTriggered { index: dispatch.mapping_index })
            .await;
    }

    fn scene_name_at(&self, index: i32) -> Option<String> {
        self.scenes.keys().nth(usize::try_from(index).ok()?).cloned()
    }

    fn chaser_at(&self, index: i32) -> Option<Chaser> {
        self.chasers.values().nth(usize::try_from(index).ok()?).cloned()
    }

    fn current_mappings(&self) -> Vec<MidiMapping> {
        (*self.router.mappings_snapshot()).clone()
    }

    fn add_mapping(&mut self, mapping: MidiMapping) {
        let mut mappings = self.current_mappings();
        mappings.push(mapping);
        self.router.set_mappings(mappings);
    }

    async fn patch_fixture(
        &mut self,
        model_name: String,
        universe_id: u8,
        address: u16,
        user_name: String,
        event_tx: &mpsc::Sender<ShowEvent>,
    ) {
        if universe_id != self.universe.id {
            log::warn!("patching into universe {} while only universe {} is active", universe_id, self.universe.id);
        }
        let Some(model) = self.library.get(&model_name).cloned() else {
            let _ = event_tx
                .send(ShowEvent::Error { message: format!("unknown fixture model '{}'", model_name) })
                .await;
            return;
        };

        let id = self.next_instance_id;
        let instance = FixtureInstance::new(id, &user_name, &model, self.universe.id, address);
        match self.universe.add_instance(instance, &model, &self.library) {
            Ok(()) => {
                self.next_instance_id += 1;
                self.pipeline.rebuild_coverage(&self.universe, &self.library);
                let _ = event_tx.send(ShowEvent::FixturePatched { instance_id: id }).await;
            }
            Err(e) => {
                let _ = event_tx.send(ShowEvent::Error { message: e.to_string() }).await;
            }
        }
    }

    fn reset_show_state(&mut self) {
        self.universe = Universe::new(0, "stage");
        self.pipeline = LayeringPipeline::new();
        self.scenes.clear();
        self.chasers.clear();
        self.active_scenes.clear();
        self.chaser_runtime.stop();
        self.programmer.clear();
        self.next_instance_id = 0;
    }

    fn load_project(&mut self, path: &Path) {
        self.project = Project::load_or_default(path);
        self.reset_show_state();

        let Some(universe) = self.project.universes.first().cloned() else {
            return;
        };

        for (index, patched) in universe.instances.iter().enumerate() {
            let Some(model) = self.library.get(&patched.model_name).cloned() else {
                log::warn!("project references unknown fixture model '{}'", patched.model_name);
                continue;
            };
            let instance = FixtureInstance::new(index, &patched.user_name, &model, universe.id, patched.addr);
            if let Err(e) = self.universe.add_instance(instance, &model, &self.library) {
                log::warn!("skipping overlapping patch for '{}': {}", patched.user_name, e);
            }
        }
        self.next_instance_id = universe.instances.len();

        for scene in &universe.scene {
            self.scenes.insert(scene.name.clone(), scene.clone());
        }
        for chaser in &universe.chasers {
            self.chasers.insert(chaser.name.clone(), chaser.clone());
        }
        self.router.set_mappings(universe.midi_mappings.clone());
        self.router.set_filter_channel(universe.midi_channel);
        self.pipeline.rebuild_coverage(&self.universe, &self.library);
    }

    fn save_project(&mut self, path: &Path) -> crate::error::Result<()> {
        self.sync_active_universe_into_project();
        self.project.save(path)
    }

    fn sync_active_universe_into_project(&mut self) {
        use crate::show::project::PatchedInstance;

        let instances = self
            .universe
            .instances
            .iter()
            .map(|instance| PatchedInstance {
                model_name: instance.model_name.clone(),
                addr: instance.start_address,
                x: 0.0,
                y: 0.0,
                user_name: instance.user_name.clone(),
            })
            .collect();

        if self.project.universes.is_empty() {
            self.project.universes.push(crate::show::ProjectUniverse {
                id: self.universe.id,
                nome: self.universe.name.clone(),
                instances,
                scene: self.scenes.values().cloned().collect(),
                chasers: self.chasers.values().cloned().collect(),
                midi_mappings: self.current_mappings(),
                midi_channel: 0,
                midi_controller_port_name: None,
                dmx_port_name: None,
            });
        } else {
            let universe = &mut self.project.universes[0];
            universe.instances = instances;
            universe.scene = self.scenes.values().cloned().collect();
            universe.chasers = self.chasers.values().cloned().collect();
            universe.midi_mappings = self.current_mappings();
        }
    }

    /// Serializes only `{scene_name, master_value}` tuples; scenes
    /// themselves remain addressable by name in `self.scenes`.
    pub fn save_active_scenes(&self) -> Vec<(String, u8)> {
        self.active_scenes.iter().map(|a| (a.scene_name.clone(), a.master)).collect()
    }

    async fn load_song(&mut self, path: &Path, event_tx: &mpsc::Sender<ShowEvent>) {
        let song = match Song::load(path) {
            Ok(song) => song,
            Err(e) => {
                let _ = event_tx.send(ShowEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        let mut track_specs = Vec::new();
        for track in &song.audio_tracks {
            match self.decode_audio_track(track) {
                Ok(spec) => track_specs.push(spec),
                Err(e) => log::warn!("failed to decode audio track {}: {}", track.file.display(), e),
            }
        }

        let duration_secs = track_specs
            .iter()
            .filter_map(|s| s.audio.duration())
            .map(|d| d.as_secs_f64())
            .fold(0.0_f64, f64::max);

        let _ = self
            .modules
            .send_to_module(ModuleId::Audio, ModuleEvent::AudioLoadTracks(track_specs))
            .await;
        let _ = self
            .modules
            .send_to_module(
                ModuleId::Lyrics,
                ModuleEvent::LoadLyrics { lines: song.lyrics.clone(), duration_secs },
            )
            .await;

        let bpm = song.audio_tracks.first().and_then(|t| t.bpm).unwrap_or(120.0);
        let _ = self.modules.send_to_module(ModuleId::Midi, ModuleEvent::SetClockBpm(bpm)).await;

        self.spawn_midi_file_tasks(&song);

        let name = song.name.clone();
        self.current_song = Some(song);
        self.last_known_audio_position = 0.0;
        self.last_video_position = 0.0;
        let _ = event_tx.send(ShowEvent::SongLoaded { name }).await;
    }

    fn decode_audio_track(&self, track: &AudioTrack) -> crate::error::Result<AudioTrackSpec> {
        let audio = decode_file(&track.file)?;
        Ok(AudioTrackSpec {
            audio: Arc::new(audio),
            channels_used: track.channels_used,
            output_start_channel: track.output_start_channel,
        })
    }

    /// Spawns one playback task per MIDI track, per the concurrency model's
    /// "one task per playing MIDI file". Internally-routed tracks loop
    /// their events back through `InjectMidiEvent`; externally-routed
    /// tracks are forwarded to the MIDI module's output port.
    fn spawn_midi_file_tasks(&self, song: &Song) {
        let midi_sender = self.modules.sender_for(ModuleId::Midi);

        for track in &song.midi_tracks {
            let events = match midi::load_track_events(&track.file, Some(track.channel)) {
                Ok(events) => events,
                Err(e) => {
                    log::warn!("failed to parse MIDI file {}: {}", track.file.display(), e);
                    continue;
                }
            };

            let self_tx = self.self_tx.clone();
            let routes_internally = track.routes_internally();
            let port = track.port.clone();
            let midi_sender = midi_sender.clone();

            tokio::spawn(async move {
                for event in events {
                    tokio::time::sleep(event.delta).await;
                    if routes_internally {
                        let _ = self_tx
                            .send(ShowCommand::InjectMidiEvent { channel: event.channel, message: event.bytes })
                            .await;
                    } else if let Some(sender) = &midi_sender {
                        let _ = sender
                            .send(ModuleEvent::MidiOutput { port: port.clone(), message: event.bytes })
                            .await;
                    }
                }
            });
        }
    }

    async fn start_playback(&mut self, event_tx: &mpsc::Sender<ShowEvent>) {
        self.broadcast_playback_event(ModuleEvent::AudioPlay { offset_secs: self.last_known_audio_position }).await;
        let _ = event_tx.send(ShowEvent::PlaybackStarted).await;
    }

    /// Sends a playback transport event to every module that tracks
    /// playback state (audio, lyrics, and the outgoing MIDI clock), not
    /// just the audio driver.
    async fn broadcast_playback_event(&self, event: ModuleEvent) {
        let _ = self.modules.send_to_module(ModuleId::Audio, event.clone()).await;
        let _ = self.modules.send_to_module(ModuleId::Lyrics, event.clone()).await;
        let _ = self.modules.send_to_module(ModuleId::Midi, event).await;
    }

    async fn recompose(&mut self, _event_tx: &mpsc::Sender<ShowEvent>) {
        let (undimmed, dimmed) =
            self.pipeline.compose(&self.universe, &self.library, &self.active_scenes, &self.scenes, self.master_dimmer);
        self.pipeline.write_back(&mut self.universe, &undimmed);
        let _ = self
            .modules
            .send_to_module(ModuleId::Dmx, ModuleEvent::DmxOutput(self.universe.id, dimmed.to_vec()))
            .await;
    }

    async fn tick_chaser(&mut self, event_tx: &mpsc::Sender<ShowEvent>) {
        self.flush_master_dimmer(event_tx).await;

        let previous_step = self.chaser_runtime.current_step_index();
        if let Some(dimmed) = self.chaser_runtime.tick(
            Instant::now(),
            &self.universe,
            &self.library,
            &self.pipeline,
            &self.scenes,
            &self.active_scenes,
            self.master_dimmer,
        ) {
            let _ = self
                .modules
                .send_to_module(ModuleId::Dmx, ModuleEvent::DmxOutput(self.universe.id, dimmed.to_vec()))
                .await;

            let current_step = self.chaser_runtime.current_step_index();
            if current_step != previous_step {
                if let Some(step_index) = current_step {
                    let _ = event_tx.send(ShowEvent::ChaserStepChanged { step_index }).await;
                }
            }
        }
    }

    async fn flush_master_dimmer(&mut self, event_tx: &mpsc::Sender<ShowEvent>) {
        let Some(value) = self.pending_master_dimmer.take() else { return };
        self.master_dimmer = value;
        self.recompose(event_tx).await;
        let _ = event_tx.send(ShowEvent::MasterDimmerChanged { value }).await;
    }

    /// Seek-slave hook: re-commands the video consumer to the audio
    /// position only when drift exceeds the threshold, so a well-behaved
    /// consumer free-runs between corrections.
    async fn sync_video(&mut self, event_tx: &mpsc::Sender<ShowEvent>) {
        if self.current_song.as_ref().and_then(|s| s.video_file.as_ref()).is_none() {
            return;
        }
        let drift = (self.last_known_audio_position - self.last_video_position).abs();
        if drift > VIDEO_DRIFT_THRESHOLD_SECS {
            self.last_video_position = self.last_known_audio_position;
            let _ = event_tx
                .send(ShowEvent::PositionChanged { position_secs: self.last_known_audio_position })
                .await;
        }
    }

    /// Copies an imported media file into the current song's data
    /// directory (or leaves it in place for the internal-trigger port).
    pub fn import_media(&self, song_name: &str, source: &Path, port: Option<&str>) -> crate::error::Result<PathBuf> {
        colocate_media(&self.data_root, song_name, source, port)
    }
}
