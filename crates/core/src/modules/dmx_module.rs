use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant};

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::dmx::{DmxTransport, SerialDmxTransport};

pub struct DmxModule {
    transport: Box<dyn DmxTransport>,
    port_name: String,
    last_frame_time: Option<Instant>,
    frames_sent: u64,
    target_fps: f64,
    status: HashMap<String, String>,
}

impl DmxModule {
    pub fn new(port_name: impl Into<String>) -> Self {
        let port_name = port_name.into();
        Self {
            transport: Box::new(SerialDmxTransport::new(port_name.clone())),
            port_name,
            last_frame_time: None,
            frames_sent: 0,
            target_fps: 44.0,
            status: HashMap::new(),
        }
    }

    pub fn set_target_fps(&mut self, fps: f64) {
        self.target_fps = fps;
    }
}

#[async_trait]
impl AsyncModule for DmxModule {
    fn id(&self) -> ModuleId {
        ModuleId::Dmx
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("Initializing DMX module on port: {}", self.port_name);

        match self.transport.connect() {
            Ok(_) => {
                self.status.insert("port".to_string(), self.port_name.clone());
                self.status.insert("status".to_string(), "initialized".to_string());
                Ok(())
            }
            Err(e) => {
                log::warn!("DMX transport unavailable: {}", e);
                self.status.insert("status".to_string(), "disconnected".to_string());
                Ok(())
            }
        }
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.target_fps);
        let mut frame_interval = interval(frame_duration);

        let mut last_dmx_data: HashMap<u8, Vec<u8>> = HashMap::new();
        let mut shutdown = false;

        log::info!("DMX module started, running at {}Hz", self.target_fps);

        let _ = tx
            .send(ModuleMessage::Status(format!(
                "DMX module running at {}Hz",
                self.target_fps
            )))
            .await;

        while !shutdown {
            tokio::select! {
                Some(event) = rx.recv() => {
                    match event {
                        ModuleEvent::DmxOutput(universe, data) => {
                            last_dmx_data.insert(universe, data);
                        }
                        ModuleEvent::Shutdown => {
                            log::info!("DMX module received shutdown signal");
                            shutdown = true;
                            break;
                        }
                        _ => {}
                    }
                }

                _ = frame_interval.tick() => {
                    let now = Instant::now();

                    for (universe, data) in &last_dmx_data {
                        if data.len() == 512 {
                            let mut frame = [0u8; 512];
                            frame.copy_from_slice(data);
                            if let Err(e) = self.transport.send_frame(*universe, &frame) {
                                log::warn!("dropped DMX frame for universe {}: {}", universe, e);
                            }
                        }
                    }

                    self.frames_sent += 1;
                    self.last_frame_time = Some(now);

                    if self.frames_sent % (self.target_fps as u64 * 5) == 0 {
                        self.status.insert("frames_sent".to_string(), self.frames_sent.to_string());
                        self.status.insert("fps".to_string(), format!("{:.1}", self.target_fps));
                        self.status.insert("universes".to_string(), last_dmx_data.len().to_string());

                        let _ = tx.send(ModuleMessage::Status(format!(
                            "DMX: {} frames sent, {} universes active",
                            self.frames_sent,
                            last_dmx_data.len()
                        ))).await;
                    }
                }
            }
        }

        log::info!("DMX module shutting down after sending {} frames", self.frames_sent);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.transport.disable();
        self.status.insert("status".to_string(), "shutdown".to_string());
        log::info!("DMX module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
