use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::interval;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::error::LumenError;
use crate::midi::{
    clock_tick_interval, MidiMessage, MidiRouter, MIDI_CLOCK_CONTINUE, MIDI_CLOCK_START,
    MIDI_CLOCK_STOP, MIDI_CLOCK_TICK,
};

/// How often the dropped-input-event counter is allowed to reach the log,
/// so a jammed input port doesn't spam one line per message.
const EVENT_LOST_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Wraps MIDI input listening (dispatched through a [`MidiRouter`]) and MIDI
/// output (outgoing clock, file-track events) on one named device pair.
pub struct MidiModule {
    device_name: String,
    router: Arc<MidiRouter>,
    input_connection: Option<MidiInputConnection<()>>,
    output_connection: Option<MidiOutputConnection>,
    clock_bpm: f64,
    dropped_input_events: Arc<AtomicU64>,
    last_event_lost_log: Arc<Mutex<Instant>>,
    status: HashMap<String, String>,
}

impl MidiModule {
    pub fn new(device_name: String, router: Arc<MidiRouter>) -> Self {
        Self {
            device_name,
            router,
            input_connection: None,
            output_connection: None,
            clock_bpm: 120.0,
            dropped_input_events: Arc::new(AtomicU64::new(0)),
            last_event_lost_log: Arc::new(Mutex::new(Instant::now() - EVENT_LOST_LOG_INTERVAL)),
            status: HashMap::new(),
        }
    }

    async fn connect_midi(
        &mut self,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let midi_in = MidiInput::new("lumen_midi_input")?;
        let midi_out = MidiOutput::new("lumen_midi_output")?;

        let in_port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.contains(&self.device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| format!("{} input not found", self.device_name))?;

        let tx_clone = tx.clone();
        let router = self.router.clone();
        let dropped_input_events = self.dropped_input_events.clone();
        let last_event_lost_log = self.last_event_lost_log.clone();
        let connection = midi_in
            .connect(
                &in_port,
                "lumen-midi-input",
                move |_timestamp, message, _| {
                    let Some(channel) = MidiMessage::channel(message) else { return };
                    let Some(decoded) = MidiMessage::decode(message) else { return };

                    if let Some(dispatch) = router.dispatch(channel, &decoded) {
                        log::debug!(
                            "MIDI mapping {} fired: {:?}",
                            dispatch.mapping_index,
                            dispatch.action
                        );
                    }

                    let event = ModuleEvent::MidiInput { channel, message: message.to_vec() };
                    if tx_clone.try_send(ModuleMessage::Event(event)).is_err() {
                        let dropped = dropped_input_events.fetch_add(1, Ordering::Relaxed) + 1;
                        let mut last_log = last_event_lost_log.lock();
                        if last_log.elapsed() >= EVENT_LOST_LOG_INTERVAL {
                            log::warn!("{} ({} dropped in the last second)", LumenError::EventLost, dropped);
                            dropped_input_events.store(0, Ordering::Relaxed);
                            *last_log = Instant::now();
                        }
                    }
                },
                (),
            )
            .map_err(|_| "Failed to connect MIDI input")?;

        let out_port = midi_out
            .ports()
            .into_iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.contains(&self.device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| format!("{} output not found", self.device_name))?;

        let output_connection = midi_out
            .connect(&out_port, "lumen-midi-output")
            .map_err(|_| "Failed to connect MIDI output")?;

        self.input_connection = Some(connection);
        self.output_connection = Some(output_connection);

        self.status.insert("input_connected".to_string(), "true".to_string());
        self.status.insert("output_connected".to_string(), "true".to_string());
        self.status.insert("device".to_string(), self.device_name.clone());

        Ok(())
    }

    pub fn send_midi_message(&mut self, data: &[u8]) -> Result<(), String> {
        if let Some(output) = &mut self.output_connection {
            output.send(data).map_err(|e| format!("Failed to send MIDI: {}", e))?;
            Ok(())
        } else {
            Err("MIDI output not connected".to_string())
        }
    }
}

#[async_trait]
impl AsyncModule for MidiModule {
    fn id(&self) -> ModuleId {
        ModuleId::Midi
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("Initializing MIDI module for device: {}", self.device_name);

        self.status.insert("device_name".to_string(), self.device_name.clone());
        self.status.insert("status".to_string(), "initialized".to_string());
        self.status.insert("input_connected".to_string(), "false".to_string());
        self.status.insert("output_connected".to_string(), "false".to_string());

        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("MIDI module starting for device: {}", self.device_name);

        match self.connect_midi(tx.clone()).await {
            Ok(_) => {
                let _ = tx
                    .send(ModuleMessage::Status(format!("MIDI device '{}' connected", self.device_name)))
                    .await;
            }
            Err(e) => {
                let error_msg = format!("Failed to connect MIDI device '{}': {}", self.device_name, e);
                log::warn!("{}", error_msg);
                let _ = tx.send(ModuleMessage::Error(error_msg)).await;
                // Keep running so the system works without MIDI hardware attached.
            }
        }

        let mut clock_ticker: Option<tokio::time::Interval> = None;
        let mut shutdown = false;

        while !shutdown {
            tokio::select! {
                Some(event) = rx.recv() => {
                    match event {
                        ModuleEvent::MidiOutput { message, .. } => {
                            if let Err(e) = self.send_midi_message(&message) {
                                log::warn!("MIDI send failed: {}", e);
                            }
                        }
                        ModuleEvent::SetClockBpm(bpm) => {
                            self.clock_bpm = bpm.max(1.0);
                        }
                        ModuleEvent::AudioPlay { .. } => {
                            if let Err(e) = self.send_midi_message(&[MIDI_CLOCK_START]) {
                                log::warn!("MIDI clock start send failed: {}", e);
                            }
                            clock_ticker = Some(interval(clock_tick_interval(self.clock_bpm)));
                        }
                        ModuleEvent::AudioResume => {
                            if let Err(e) = self.send_midi_message(&[MIDI_CLOCK_CONTINUE]) {
                                log::warn!("MIDI clock continue send failed: {}", e);
                            }
                            clock_ticker = Some(interval(clock_tick_interval(self.clock_bpm)));
                        }
                        ModuleEvent::AudioPause => {
                            clock_ticker = None;
                        }
                        ModuleEvent::AudioStop | ModuleEvent::AudioEndOfSong => {
                            if clock_ticker.take().is_some() {
                                if let Err(e) = self.send_midi_message(&[MIDI_CLOCK_STOP]) {
                                    log::warn!("MIDI clock stop send failed: {}", e);
                                }
                            }
                        }
                        ModuleEvent::Shutdown => {
                            log::info!("MIDI module received shutdown signal");
                            shutdown = true;
                        }
                        _ => {}
                    }
                }
                _ = async { clock_ticker.as_mut().unwrap().tick().await }, if clock_ticker.is_some() => {
                    if let Err(e) = self.send_midi_message(&[MIDI_CLOCK_TICK]) {
                        log::warn!("MIDI clock tick send failed: {}", e);
                    }
                }
            }
        }

        log::info!("MIDI module shutting down");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.input_connection = None;
        self.output_connection = None;

        self.status.insert("status".to_string(), "shutdown".to_string());
        self.status.insert("input_connected".to_string(), "false".to_string());
        self.status.insert("output_connected".to_string(), "false".to_string());

        log::info!("MIDI module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
