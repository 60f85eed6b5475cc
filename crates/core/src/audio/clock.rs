use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;

use crate::error::{LumenError, Result};

use super::decode::DecodedAudio;

/// A decoded track's routing within the mix: which source channels of the
/// file are used, and which output device channel they start at.
pub struct RoutedTrack {
    pub audio: Arc<DecodedAudio>,
    pub channels_used: usize,
    pub output_start_channel: usize,
    cursor: AtomicUsize,
}

impl RoutedTrack {
    pub fn new(audio: Arc<DecodedAudio>, channels_used: usize, output_start_channel: usize) -> Self {
        Self { audio, channels_used, output_start_channel, cursor: AtomicUsize::new(0) }
    }
}

/// Position oracle: tracks the playback position as wall-clock elapsed
/// time since `start_time_origin`, offset by `pause_time` across a
/// pause/resume cycle. Seeking is implemented as stop-then-start-at-offset.
#[derive(Default)]
struct PositionOracle {
    start_time_origin: Option<Instant>,
    pause_time: Option<f64>,
    offset: f64,
}

impl PositionOracle {
    fn start(&mut self, offset: f64, now: Instant) {
        self.start_time_origin = Some(now);
        self.pause_time = None;
        self.offset = offset;
    }

    fn pause(&mut self, now: Instant) {
        self.pause_time = Some(self.current_position(now));
        self.start_time_origin = None;
    }

    fn resume(&mut self, now: Instant) {
        if let Some(position) = self.pause_time.take() {
            self.offset = position;
            self.start_time_origin = Some(now);
        }
    }

    fn current_position(&self, now: Instant) -> f64 {
        if let Some(paused) = self.pause_time {
            return paused;
        }
        match self.start_time_origin {
            Some(origin) => self.offset + now.saturating_duration_since(origin).as_secs_f64(),
            None => self.offset,
        }
    }
}

/// One hour, used when no track can report a real duration.
const SYNTHETIC_FALLBACK: Duration = Duration::from_secs(3600);

/// Authoritative master clock for a loaded song: mixes all audio tracks
/// via one `cpal` output stream and exposes a wall-clock position oracle
/// that the lyrics scheduler and MIDI clock both read.
pub struct AudioClock {
    device_name: String,
    stream: Option<Stream>,
    tracks: Arc<Mutex<Vec<RoutedTrack>>>,
    oracle: Arc<Mutex<PositionOracle>>,
    output_channels: u16,
    output_sample_rate: u32,
}

impl AudioClock {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            stream: None,
            tracks: Arc::new(Mutex::new(Vec::new())),
            oracle: Arc::new(Mutex::new(PositionOracle::default())),
            output_channels: 2,
            output_sample_rate: 44_100,
        }
    }

    pub fn load_tracks(&mut self, tracks: Vec<RoutedTrack>) {
        *self.tracks.lock() = tracks;
    }

    /// Real duration of the longest loaded track, or the synthetic
    /// one-hour fallback when no track reports a valid duration.
    pub fn duration(&self) -> Duration {
        self.tracks
            .lock()
            .iter()
            .filter_map(|t| t.audio.duration())
            .max()
            .unwrap_or_else(|| {
                log::warn!("no track reported a valid duration, using synthetic 1h fallback");
                SYNTHETIC_FALLBACK
            })
    }

    fn find_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if self.device_name.is_empty() || self.device_name == "default" {
            return host
                .default_output_device()
                .ok_or_else(|| LumenError::PortUnavailable("no default audio output device".to_string()));
        }
        for device in host
            .output_devices()
            .map_err(|e| LumenError::PortUnavailable(e.to_string()))?
        {
            if device.name().map(|n| n.contains(&self.device_name)).unwrap_or(false) {
                return Ok(device);
            }
        }
        log::warn!("audio device '{}' not found, using default", self.device_name);
        host.default_output_device()
            .ok_or_else(|| LumenError::PortUnavailable("no default audio output device".to_string()))
    }

    fn build_stream(&mut self) -> Result<()> {
        let device = self.find_device()?;
        let supported = device
            .default_output_config()
            .map_err(|e| LumenError::PortUnavailable(e.to_string()))?;

        let config: StreamConfig = supported.config();
        self.output_channels = config.channels;
        self.output_sample_rate = config.sample_rate.0;

        let tracks = self.tracks.clone();
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    let tracks = tracks.lock();
                    for frame in data.chunks_mut(channels) {
                        for track in tracks.iter() {
                            let cursor = track.cursor.load(Ordering::Relaxed);
                            if cursor >= track.audio.frame_count() {
                                continue;
                            }
                            for c in 0..track.channels_used {
                                let out_index = track.output_start_channel + c;
                                if out_index >= frame.len() {
                                    continue;
                                }
                                let sample = track.audio.sample_at(cursor, c) * 0.5;
                                frame[out_index] += sample;
                            }
                        }
                    }
                    for track in tracks.iter() {
                        track.cursor.fetch_add(1, Ordering::Relaxed);
                    }
                },
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| LumenError::PortUnavailable(e.to_string()))?;

        if supported.sample_format() != SampleFormat::F32 {
            log::warn!("device default format is not f32; output may need resampling upstream");
        }

        stream.play().map_err(|e| LumenError::PortUnavailable(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn seek_cursors_to(&self, offset_secs: f64) {
        let tracks = self.tracks.lock();
        for track in tracks.iter() {
            let frame = (offset_secs * track.audio.sample_rate as f64).round().max(0.0) as usize;
            track.cursor.store(frame, Ordering::Relaxed);
        }
    }

    pub fn start(&mut self, offset_secs: f64) -> Result<()> {
        if self.tracks.lock().is_empty() {
            log::warn!("{}", LumenError::ClockUnavailable);
        }
        if self.stream.is_none() {
            self.build_stream()?;
        }
        self.seek_cursors_to(offset_secs);
        self.oracle.lock().start(offset_secs, Instant::now());
        Ok(())
    }

    /// True once every loaded track has exhausted its decoded buffer and the
    /// oracle's position has caught up to the longest track's duration.
    pub fn is_song_ended(&self) -> bool {
        let tracks = self.tracks.lock();
        if tracks.is_empty() {
            return false;
        }
        let all_eof = tracks
            .iter()
            .all(|t| t.cursor.load(Ordering::Relaxed) >= t.audio.frame_count());
        drop(tracks);
        all_eof && self.current_position() >= self.duration().as_secs_f64()
    }

    pub fn pause(&mut self) {
        self.oracle.lock().pause(Instant::now());
    }

    pub fn resume(&mut self) {
        let position = self.oracle.lock().current_position(Instant::now());
        self.seek_cursors_to(position);
        self.oracle.lock().resume(Instant::now());
    }

    pub fn stop(&mut self) {
        self.stream = None;
        self.seek_cursors_to(0.0);
        *self.oracle.lock() = PositionOracle::default();
    }

    /// Seeking is stop-then-start-at-offset: cursors reset and the oracle's
    /// origin is re-anchored to `now`.
    pub fn seek(&mut self, offset_secs: f64) -> Result<()> {
        self.start(offset_secs)
    }

    pub fn current_position(&self) -> f64 {
        self.oracle.lock().current_position(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_tracks_elapsed_time_while_playing() {
        let mut oracle = PositionOracle::default();
        let t0 = Instant::now();
        oracle.start(5.0, t0);
        let t1 = t0 + Duration::from_millis(250);
        let position = oracle.current_position(t1);
        assert!((position - 5.25).abs() < 0.001);
    }

    #[test]
    fn pause_then_resume_preserves_position() {
        let mut oracle = PositionOracle::default();
        let t0 = Instant::now();
        oracle.start(0.0, t0);
        let t_pause = t0 + Duration::from_millis(500);
        oracle.pause(t_pause);
        assert!((oracle.current_position(t_pause) - 0.5).abs() < 0.001);

        let t_resume = t_pause + Duration::from_millis(1000);
        oracle.resume(t_resume);
        assert!((oracle.current_position(t_resume) - 0.5).abs() < 0.001);

        let t_later = t_resume + Duration::from_millis(250);
        assert!((oracle.current_position(t_later) - 0.75).abs() < 0.001);
    }

    #[test]
    fn duration_falls_back_to_synthetic_hour_when_unknown() {
        let clock = AudioClock::new("default");
        assert_eq!(clock.duration(), SYNTHETIC_FALLBACK);
    }
}
