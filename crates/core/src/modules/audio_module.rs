use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::audio::{AudioClock, RoutedTrack};
use crate::error::LumenError;

/// How often position updates are published to the coordinator while
/// playing, independent of the lyrics scheduler's own 50ms poll.
const POSITION_PUBLISH_INTERVAL: Duration = Duration::from_millis(200);

pub struct AudioModule {
    clock: AudioClock,
    playing: bool,
    status: HashMap<String, String>,
}

impl AudioModule {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self { clock: AudioClock::new(device_name), playing: false, status: HashMap::new() }
    }

    pub fn clock_mut(&mut self) -> &mut AudioClock {
        &mut self.clock
    }
}

#[async_trait]
impl AsyncModule for AudioModule {
    fn id(&self) -> ModuleId {
        ModuleId::Audio
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.status.insert("status".to_string(), "initialized".to_string());
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut position_ticker = interval(POSITION_PUBLISH_INTERVAL);
        let mut shutdown = false;

        while !shutdown {
            tokio::select! {
                Some(event) = rx.recv() => {
                    match event {
                        ModuleEvent::AudioPlay { offset_secs } => {
                            match self.clock.start(offset_secs) {
                                Ok(_) => {
                                    self.playing = true;
                                    self.status.insert("status".to_string(), "playing".to_string());
                                }
                                Err(LumenError::PortUnavailable(msg)) => {
                                    log::warn!("audio device unavailable: {}", msg);
                                    let _ = tx.send(ModuleMessage::Error(msg)).await;
                                }
                                Err(e) => log::error!("audio start failed: {}", e),
                            }
                        }
                        ModuleEvent::AudioPause => {
                            self.clock.pause();
                            self.playing = false;
                            self.status.insert("status".to_string(), "paused".to_string());
                        }
                        ModuleEvent::AudioResume => {
                            self.clock.resume();
                            self.playing = true;
                            self.status.insert("status".to_string(), "playing".to_string());
                        }
                        ModuleEvent::AudioStop => {
                            self.clock.stop();
                            self.playing = false;
                            self.status.insert("status".to_string(), "stopped".to_string());
                        }
                        ModuleEvent::AudioSeek { offset_secs } => {
                            if let Err(e) = self.clock.seek(offset_secs) {
                                log::warn!("audio seek failed: {}", e);
                            }
                        }
                        ModuleEvent::AudioLoadTracks(specs) => {
                            self.clock.stop();
                            self.playing = false;
                            let tracks = specs
                                .into_iter()
                                .map(|spec| RoutedTrack::new(spec.audio, spec.channels_used, spec.output_start_channel))
                                .collect();
                            self.clock.load_tracks(tracks);
                            log::info!("audio module loaded a new track set");
                        }
                        ModuleEvent::Shutdown => {
                            log::info!("audio module received shutdown signal");
                            shutdown = true;
                        }
                        _ => {}
                    }
                }
                _ = position_ticker.tick() => {
                    if self.playing {
                        if self.clock.is_song_ended() {
                            self.clock.stop();
                            self.playing = false;
                            self.status.insert("status".to_string(), "stopped".to_string());
                            let _ = tx.send(ModuleMessage::Event(ModuleEvent::AudioEndOfSong)).await;
                        } else {
                            let position_secs = self.clock.current_position();
                            let _ = tx
                                .send(ModuleMessage::Event(ModuleEvent::AudioPosition { position_secs }))
                                .await;
                        }
                    }
                }
            }
        }

        self.clock.stop();
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.clock.stop();
        self.status.insert("status".to_string(), "shutdown".to_string());
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
