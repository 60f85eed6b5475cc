use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{from_reader, to_writer_pretty};

use crate::error::{LumenError, Result};

use super::scene::{Chaser, MidiMapping, Scene};

/// A patched fixture's position within a project file. Channel values
/// themselves are not persisted; only the patch is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatchedInstance {
    #[serde(rename = "modello_nome")]
    pub model_name: String,
    pub addr: u16,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "nome_utente")]
    pub user_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectUniverse {
    pub id: u8,
    pub nome: String,
    #[serde(rename = "istanze", default)]
    pub instances: Vec<PatchedInstance>,
    #[serde(default)]
    pub scene: Vec<Scene>,
    #[serde(default)]
    pub chasers: Vec<Chaser>,
    #[serde(rename = "midi_mappings", default)]
    pub midi_mappings: Vec<MidiMapping>,
    #[serde(rename = "midi_channel", default)]
    pub midi_channel: u8,
    #[serde(rename = "midi_controller_port_name", default)]
    pub midi_controller_port_name: Option<String>,
    #[serde(rename = "dmx_port_name", default)]
    pub dmx_port_name: Option<String>,
}

/// Root of a project file: `{"universi": [...]}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "universi", default)]
    pub universes: Vec<ProjectUniverse>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
        from_reader(file).map_err(|e| LumenError::IoDecode(e.to_string()))
    }

    /// Loads a project, falling back to an empty one (logged) on malformed
    /// JSON so the application can still start.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(project) => project,
            Err(e) => {
                log::warn!("project file {} unreadable, starting empty: {}", path.display(), e);
                Project::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
        to_writer_pretty(file, self).map_err(|e| LumenError::IoDecode(e.to_string()))
    }
}

/// One entry in the separate fixture-profile catalog persisted alongside a
/// project, e.g. `{"nome": "Par64", "canali": [...]}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileCatalogEntry {
    pub nome: String,
    pub canali: Vec<ProfileChannel>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileChannel {
    pub nome: String,
    pub funzione: String,
    pub default: u8,
}

pub fn load_profile_catalog(path: &Path) -> Result<HashMap<String, ProfileCatalogEntry>> {
    let file = File::open(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    let entries: Vec<ProfileCatalogEntry> =
        from_reader(file).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    Ok(entries.into_iter().map(|e| (e.nome.clone(), e)).collect())
}

pub fn save_profile_catalog(path: &Path, catalog: &HashMap<String, ProfileCatalogEntry>) -> Result<()> {
    let entries: Vec<&ProfileCatalogEntry> = catalog.values().collect();
    let file = File::create(path).map_err(|e| LumenError::IoDecode(e.to_string()))?;
    to_writer_pretty(file, &entries).map_err(|e| LumenError::IoDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn round_trips_a_minimal_project() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.json");

        let mut values = BTreeMap::new();
        values.insert(1u16, 200u8);
        let project = Project {
            universes: vec![ProjectUniverse {
                id: 0,
                nome: "stage".to_string(),
                instances: vec![PatchedInstance {
                    model_name: "Par".to_string(),
                    addr: 1,
                    x: 0.0,
                    y: 0.0,
                    user_name: "Par 1".to_string(),
                }],
                scene: vec![Scene { name: "X".to_string(), values }],
                chasers: vec![],
                midi_mappings: vec![],
                midi_channel: 0,
                midi_controller_port_name: None,
                dmx_port_name: None,
            }],
        };

        project.save(&path).unwrap();
        let reloaded = Project::load(&path).unwrap();
        assert_eq!(reloaded.universes[0].scene[0].values, project.universes[0].scene[0].values);
    }

    #[test]
    fn malformed_project_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let project = Project::load_or_default(&path);
        assert!(project.universes.is_empty());
    }
}
