use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A single DMX channel within a fixture model.
///
/// Classification into HTP/LTP is not stored; it is derived from `name`/`function`
/// by [`ChannelKind::classify`] so that it stays a pure function of the descriptor
/// text for the life of the profile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "funzione")]
    pub function: String,
    #[serde(rename = "default")]
    pub default_value: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    Htp,
    Ltp,
}

impl ChannelKind {
    /// HTP if the channel's name contains "dimmer" or its function contains
    /// "intensity" (case-insensitive substring match), else LTP.
    pub fn classify(descriptor: &ChannelDescriptor) -> Self {
        let name = descriptor.name.to_lowercase();
        let function = descriptor.function.to_lowercase();
        if name.contains("dimmer") || function.contains("intensity") {
            ChannelKind::Htp
        } else {
            ChannelKind::Ltp
        }
    }
}

/// A named list of channel descriptors. Count is simply `channels.len()`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureModel {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "canali")]
    pub channels: Vec<ChannelDescriptor>,
}

impl FixtureModel {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// A patched fixture: a reference to a model, a start address, and live values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixtureInstance {
    pub id: usize,
    #[serde(rename = "nome_utente")]
    pub user_name: String,
    #[serde(rename = "modello_nome")]
    pub model_name: String,
    pub universe: u8,
    #[serde(rename = "addr")]
    pub start_address: u16,
    #[serde(skip)]
    pub current_values: Vec<u8>,
}

impl FixtureInstance {
    pub fn new(id: usize, user_name: &str, model: &FixtureModel, universe: u8, start_address: u16) -> Self {
        let current_values = model.channels.iter().map(|c| c.default_value).collect();
        Self {
            id,
            user_name: user_name.to_string(),
            model_name: model.name.clone(),
            universe,
            start_address,
            current_values,
        }
    }

    pub fn end_address(&self, channel_count: usize) -> u16 {
        self.start_address + channel_count as u16 - 1
    }

    pub fn set_value(&mut self, channel_index: usize, value: u8) {
        if let Some(slot) = self.current_values.get_mut(channel_index) {
            *slot = value;
        }
    }
}

/// Catalog of known fixture models, keyed by model name. Loaded from a JSON list
/// of `{nome, canali}` objects; the catalog itself carries no hardcoded profiles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FixtureLibrary {
    models: HashMap<String, FixtureModel>,
}

impl FixtureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: FixtureModel) {
        self.models.insert(model.name.clone(), model);
    }

    pub fn get(&self, name: &str) -> Option<&FixtureModel> {
        self.models.get(name)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = fs::read_to_string(path)?;
        let models: Vec<FixtureModel> = serde_json::from_str(&content)?;
        let mut library = Self::new();
        for model in models {
            library.insert(model);
        }
        Ok(library)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let models: Vec<&FixtureModel> = self.models.values().collect();
        let content = serde_json::to_string_pretty(&models)?;
        fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimmer_model() -> FixtureModel {
        FixtureModel {
            name: "Par64".to_string(),
            channels: vec![
                ChannelDescriptor {
                    name: "Dimmer".to_string(),
                    function: "intensity".to_string(),
                    default_value: 0,
                },
                ChannelDescriptor {
                    name: "Red".to_string(),
                    function: "colour".to_string(),
                    default_value: 0,
                },
            ],
        }
    }

    #[test]
    fn classifies_dimmer_channel_as_htp_by_name() {
        let model = dimmer_model();
        assert_eq!(ChannelKind::classify(&model.channels[0]), ChannelKind::Htp);
        assert_eq!(ChannelKind::classify(&model.channels[1]), ChannelKind::Ltp);
    }

    #[test]
    fn classifies_intensity_function_as_htp_regardless_of_name() {
        let descriptor = ChannelDescriptor {
            name: "Master".to_string(),
            function: "Intensity".to_string(),
            default_value: 0,
        };
        assert_eq!(ChannelKind::classify(&descriptor), ChannelKind::Htp);
    }

    #[test]
    fn instance_values_initialize_from_model_defaults() {
        let model = dimmer_model();
        let instance = FixtureInstance::new(0, "Par 1", &model, 0, 10);
        assert_eq!(instance.current_values, vec![0, 0]);
        assert_eq!(instance.end_address(model.channel_count()), 11);
    }

    #[test]
    fn library_round_trips_models_by_name() {
        let mut library = FixtureLibrary::new();
        library.insert(dimmer_model());
        assert_eq!(library.get("Par64").unwrap().channel_count(), 2);
        assert!(library.get("missing").is_none());
    }
}
