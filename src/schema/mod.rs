// schema/mod.rs - Serde documents exchanged with editors and config files
//
// Keys are camelCase to match what the editor front-end sends.

use crate::eval::bounds::Bounds;
use crate::eval::error::{DocumentError, SettingsError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Generator configuration that lives outside the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneratorSettings {
    /// Multiplier applied to the raw program output to get the final SDF.
    pub iso_scale: f64,
    /// Blocks whose scaled bound lies entirely beyond `±clip_threshold` are
    /// filled uniformly instead of being evaluated per voxel.
    pub clip_threshold: f64,
    pub bounds: Bounds,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            iso_scale: 0.1,
            clip_threshold: 1.0,
            bounds: Bounds::None,
        }
    }
}

impl GeneratorSettings {
    /// Parse settings from JSON and reject invalid values.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let settings: GeneratorSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// `iso_scale` must be finite and `clip_threshold` finite and
    /// non-negative. A negative threshold would swap the inside and outside
    /// fills of the interval shortcut.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.iso_scale.is_finite() {
            return Err(SettingsError::NonFiniteIsoScale(self.iso_scale));
        }
        if !(self.clip_threshold.is_finite() && self.clip_threshold >= 0.0) {
            return Err(SettingsError::InvalidClipThreshold(self.clip_threshold));
        }
        self.bounds.validate()?;
        Ok(())
    }
}

/// A serialized graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    pub connections: Vec<ConnectionDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: u32,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Numbers for numeric parameters, library names (or `null`) for
    /// resources. Missing entries keep their defaults.
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub position: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDocument {
    pub src_node: u32,
    pub src_port: u32,
    pub dst_node: u32,
    pub dst_port: u32,
}
