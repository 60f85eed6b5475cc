use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::lyrics::{LyricsScheduler, LyricsUpdate, LYRICS_POLL_MS};
use crate::show::song::LyricLine;

/// Polls the audio module's position updates at a 50ms cadence and
/// publishes the active lyric-line index.
pub struct LyricsModule {
    scheduler: LyricsScheduler,
    read_ahead_secs: f64,
    duration_secs: f64,
    current_time_secs: f64,
    stopped: bool,
    status: HashMap<String, String>,
}

impl LyricsModule {
    pub fn new(lines: Vec<LyricLine>, read_ahead_secs: f64, duration_secs: f64) -> Self {
        Self {
            scheduler: LyricsScheduler::new(lines, read_ahead_secs),
            read_ahead_secs,
            duration_secs,
            current_time_secs: 0.0,
            stopped: true,
            status: HashMap::new(),
        }
    }
}

#[async_trait]
impl AsyncModule for LyricsModule {
    fn id(&self) -> ModuleId {
        ModuleId::Lyrics
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
        let mut ticker = interval(Duration::from_millis(LYRICS_POLL_MS));
        let mut shutdown = false;

        while !shutdown {
            tokio::select! {
                Some(event) = rx.recv() => {
                    match event {
                        ModuleEvent::AudioPosition { position_secs } => {
                            self.current_time_secs = position_secs;
                            self.stopped = false;
                        }
                        ModuleEvent::AudioPlay { .. } | ModuleEvent::AudioResume => {
                            self.stopped = false;
                        }
                        ModuleEvent::AudioStop => {
                            self.stopped = true;
                            self.current_time_secs = 0.0;
                        }
                        ModuleEvent::AudioPause => {
                            self.stopped = true;
                        }
                        ModuleEvent::LoadLyrics { lines, duration_secs } => {
                            self.scheduler = LyricsScheduler::new(lines, self.read_ahead_secs);
                            self.duration_secs = duration_secs;
                            self.current_time_secs = 0.0;
                            self.stopped = true;
                        }
                        ModuleEvent::Shutdown => {
                            shutdown = true;
                        }
                        _ => {}
                    }
                }
                _ = ticker.tick() => {
                    if let Some(update) = self.scheduler.poll(self.current_time_secs, self.duration_secs, self.stopped) {
                        let event = match update {
                            LyricsUpdate::ActiveIndex { index, .. } => ModuleEvent::LyricIndexChanged(index),
                            LyricsUpdate::Idle => ModuleEvent::LyricsIdle,
                            LyricsUpdate::EndOfSong => ModuleEvent::LyricsEndOfSong,
                        };
                        let _ = tx.send(ModuleMessage::Event(event)).await;
                        log::debug!("lyrics update: {:?}", update);
                    }
                }
            }
        }

        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.status.insert("status".to_string(), "shutdown".to_string());
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
