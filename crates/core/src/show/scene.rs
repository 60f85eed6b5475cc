use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named snapshot of channel values. Keys need not cover every address;
/// addresses absent from the map inherit from whatever layer sits below.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "valori_canali", with = "address_map")]
    pub values: BTreeMap<u16, u8>,
}

/// The scene file format keys its channel map by stringified address
/// (`{"1": 200, "2": 100}`), matching the on-disk project format.
mod address_map {
    use super::*;
    use serde::de::Error as _;
    use serde::{Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<u16, u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let stringified: BTreeMap<String, u8> =
            map.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        stringified.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u16, u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stringified: BTreeMap<String, u8> = BTreeMap::deserialize(deserializer)?;
        stringified
            .into_iter()
            .map(|(k, v)| k.parse::<u16>().map(|k| (k, v)).map_err(D::Error::custom))
            .collect()
    }
}

/// A step in a chaser: a scene reference (by name) plus its three durations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChaserStep {
    #[serde(rename = "scena_nome")]
    pub scene_name: String,
    #[serde(rename = "tempo_permanenza")]
    pub hold_secs: f64,
    #[serde(rename = "tempo_fade_in")]
    pub fade_in_secs: f64,
    #[serde(rename = "tempo_fade_out")]
    pub fade_out_secs: f64,
}

impl ChaserStep {
    /// All three durations zero is illegal (see `InvalidStep`).
    pub fn is_valid(&self) -> bool {
        self.hold_secs > 0.0 || self.fade_in_secs > 0.0 || self.fade_out_secs > 0.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chaser {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "passi")]
    pub steps: Vec<ChaserStep>,
}

/// A scene currently contributing to the Scene Layer Result, with its
/// submaster value (fixed at 255 until submasters are implemented).
#[derive(Clone, Debug)]
pub struct ActiveScene {
    pub scene_name: String,
    pub master: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MidiTriggerType {
    Note,
    Cc,
    Pc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MidiActionKind {
    Scene,
    Chaser,
    Stop,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiMapping {
    #[serde(rename = "midi_type")]
    pub trigger_type: MidiTriggerType,
    #[serde(rename = "midi_number")]
    pub number: u8,
    #[serde(rename = "value")]
    pub threshold: u8,
    pub action_type: MidiActionKind,
    /// -1 means "stop"; otherwise an index into the scene or chaser list.
    pub action_index: i32,
    #[serde(default)]
    pub internal_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_with_all_zero_durations_is_invalid() {
        let step = ChaserStep {
            scene_name: "s".to_string(),
            hold_secs: 0.0,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
        };
        assert!(!step.is_valid());
    }

    #[test]
    fn scene_values_serialize_with_stringified_addresses() {
        let mut values = BTreeMap::new();
        values.insert(1u16, 200u8);
        let scene = Scene {
            name: "X".to_string(),
            values,
        };
        let json = serde_json::to_string(&scene).unwrap();
        assert!(json.contains("\"1\":200"));
    }
}
