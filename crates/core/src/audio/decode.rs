use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{LumenError, Result};

/// A fully pre-decoded audio file: interleaved `f32` PCM at the file's own
/// sample rate and channel count. Tracks are decoded once on song load, not
/// streamed, so the realtime mixing callback never touches the filesystem
/// or a decoder.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// `None` once `channels` or `sample_rate` couldn't be determined (an
    /// empty or unreadable file) — callers fall back to a synthetic
    /// duration rather than propagate this.
    pub fn duration(&self) -> Option<Duration> {
        if self.channels == 0 || self.sample_rate == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64))
    }

    pub fn sample_at(&self, frame: usize, channel: usize) -> f32 {
        if self.channels == 0 {
            return 0.0;
        }
        let channel = channel.min(self.channels - 1);
        self.samples.get(frame * self.channels + channel).copied().unwrap_or(0.0)
    }
}

pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| LumenError::IoDecode(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LumenError::IoDecode("no supported audio track in file".to_string()))?
        .clone();

    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| LumenError::IoDecode(e.to_string()))?;

    let mut samples = Vec::new();
    let mut channels = 0usize;
    let mut sample_rate = 0u32;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(LumenError::IoDecode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(LumenError::IoDecode(e.to_string())),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        sample_rate = spec.rate;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok(DecodedAudio { samples, channels, sample_rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_decode_reports_no_duration() {
        let audio = DecodedAudio { samples: Vec::new(), channels: 0, sample_rate: 0 };
        assert_eq!(audio.duration(), None);
        assert_eq!(audio.frame_count(), 0);
    }

    #[test]
    fn sample_at_clamps_to_available_channels() {
        let audio = DecodedAudio { samples: vec![0.1, 0.2], channels: 2, sample_rate: 44100 };
        assert_eq!(audio.sample_at(0, 5), audio.sample_at(0, 1));
    }
}
