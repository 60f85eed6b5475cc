use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::error::{LumenError, Result};

/// Sentinel MIDI port name meaning "route to the internal input router
/// rather than any hardware port" (see `crate::midi`).
pub const INTERNAL_DMX_PORT_TRIGGER: &str = "INTERNAL_DMX_PORT_TRIGGER";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioTrack {
    pub file: PathBuf,
    pub output: usize,
    pub channels: usize,
    pub channels_used: usize,
    pub output_start_channel: usize,
    #[serde(default)]
    pub bpm: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiTrack {
    pub file: PathBuf,
    pub channel: u8,
    pub port: String,
}

impl MidiTrack {
    pub fn routes_internally(&self) -> bool {
        self.port == INTERNAL_DMX_PORT_TRIGGER
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LyricLine {
    pub line: String,
    pub time: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    #[serde(default)]
    pub audio_tracks: Vec<AudioTrack>,
    #[serde(default)]
    pub midi_tracks: Vec<MidiTrack>,
    #[serde(default)]
    pub video_file: Option<PathBuf>,
    #[serde(default)]
    pub lyrics: Vec<LyricLine>,
    #[serde(default)]
    pub lyrics_txt: Option<PathBuf>,
}

impl Song {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            audio_tracks: Vec::new(),
            midi_tracks: Vec::new(),
            video_file: None,
            lyrics: Vec::new(),
            lyrics_txt: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
        from_reader(file).map_err(|e| LumenError::IoDecode(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
        to_writer_pretty(file, self).map_err(|e| LumenError::IoDecode(e.to_string()))
    }

    /// Reads a lyrics text file, one line per entry, all timestamps at 0.0
    /// pending editor adjustment.
    pub fn load_lyrics_txt(path: &Path) -> Result<Vec<LyricLine>> {
        let text = fs::read_to_string(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
        Ok(text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| LyricLine { line: line.to_string(), time: 0.0 })
            .collect())
    }
}

/// Copies a media file into `data/songs/<song_name>/<basename>` and returns
/// the destination path, unless `port` is the internal sentinel (in which
/// case the source file is referenced in place and returned unchanged).
pub fn colocate_media(data_root: &Path, song_name: &str, source: &Path, port: Option<&str>) -> Result<PathBuf> {
    if port == Some(INTERNAL_DMX_PORT_TRIGGER) {
        return Ok(source.to_path_buf());
    }

    let song_dir = data_root.join("songs").join(song_name);
    fs::create_dir_all(&song_dir).map_err(|e| LumenError::IoDecode(e.to_string()))?;

    let basename = source
        .file_name()
        .ok_or_else(|| LumenError::IoDecode("media path has no file name".to_string()))?;
    let destination = song_dir.join(basename);

    fs::copy(source, &destination).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    Ok(destination)
}

/// Deletes a song's media directory, if present.
pub fn delete_song_media(data_root: &Path, song_name: &str) -> Result<()> {
    let song_dir = data_root.join("songs").join(song_name);
    if song_dir.exists() {
        fs::remove_dir_all(&song_dir).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_song_with_lyrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.scn");

        let mut song = Song::new("Test Song");
        song.lyrics.push(LyricLine { line: "hello".to_string(), time: 1.5 });
        song.midi_tracks.push(MidiTrack {
            file: PathBuf::from("cues.mid"),
            channel: 1,
            port: INTERNAL_DMX_PORT_TRIGGER.to_string(),
        });

        song.save(&path).unwrap();
        let reloaded = Song::load(&path).unwrap();
        assert_eq!(reloaded.lyrics[0].time, 1.5);
        assert!(reloaded.midi_tracks[0].routes_internally());
    }

    #[test]
    fn colocate_media_copies_into_song_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        let source = dir.path().join("track.wav");
        std::fs::write(&source, b"fake audio").unwrap();

        let dest = colocate_media(&data_root, "Test Song", &source, None).unwrap();
        assert!(dest.starts_with(data_root.join("songs").join("Test Song")));
        assert!(dest.exists());
    }

    #[test]
    fn internal_trigger_port_leaves_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let data_root = dir.path().join("data");
        let source = dir.path().join("cues.mid");
        std::fs::write(&source, b"fake midi").unwrap();

        let dest = colocate_media(&data_root, "Test Song", &source, Some(INTERNAL_DMX_PORT_TRIGGER)).unwrap();
        assert_eq!(dest, source);
    }
}
