//! Lobby options for fog of war and pre-explored maps.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lobby option id for fog of war.
pub const FOG_OPTION: &str = "fog";
/// Lobby option id for starting with the map explored.
pub const EXPLORED_OPTION: &str = "explored";

/// Flags a `Shroud` reads once, at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShroudOptions {
    pub fog_enabled: bool,
    pub explore_map_enabled: bool,
}

impl Default for ShroudOptions {
    fn default() -> Self {
        Self {
            fog_enabled: true,
            explore_map_enabled: false,
        }
    }
}

/// A boolean lobby checkbox definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyCheckbox {
    /// Value used when the lobby has not set the option.
    pub enabled: bool,
    /// Locked options ignore the lobby value.
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub display_order: i32,
}

fn default_visible() -> bool {
    true
}

impl LobbyCheckbox {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            locked: false,
            visible: true,
            display_order: 0,
        }
    }

    fn resolve(&self, lobby: &LobbyOptions, id: &str) -> bool {
        if self.locked {
            return self.enabled;
        }
        lobby.get(id).unwrap_or(self.enabled)
    }
}

/// Shroud rules, loaded from YAML.
///
/// ```yaml
/// fog:
///   enabled: true
/// explored_map:
///   enabled: false
///   locked: true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShroudConfig {
    pub fog: LobbyCheckbox,
    pub explored_map: LobbyCheckbox,
}

impl Default for ShroudConfig {
    fn default() -> Self {
        Self {
            fog: LobbyCheckbox::new(true),
            explored_map: LobbyCheckbox::new(false),
        }
    }
}

impl ShroudConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Combine the rule defaults with what the lobby chose.
    pub fn resolve(&self, lobby: &LobbyOptions) -> ShroudOptions {
        ShroudOptions {
            fog_enabled: self.fog.resolve(lobby, FOG_OPTION),
            explore_map_enabled: self.explored_map.resolve(lobby, EXPLORED_OPTION),
        }
    }
}

/// Global boolean settings chosen in the lobby, keyed by option id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyOptions {
    values: BTreeMap<String, bool>,
}

impl LobbyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, value: bool) -> Self {
        self.set(id, value);
        self
    }

    pub fn set(&mut self, id: impl Into<String>, value: bool) {
        self.values.insert(id.into(), value);
    }

    pub fn get(&self, id: &str) -> Option<bool> {
        self.values.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_fog_only() {
        let options = ShroudConfig::default().resolve(&LobbyOptions::new());
        assert_eq!(options, ShroudOptions::default());
        assert!(options.fog_enabled);
        assert!(!options.explore_map_enabled);
    }

    #[test]
    fn lobby_overrides_unlocked_options() {
        let lobby = LobbyOptions::new()
            .with(FOG_OPTION, false)
            .with(EXPLORED_OPTION, true);
        let options = ShroudConfig::default().resolve(&lobby);
        assert!(!options.fog_enabled);
        assert!(options.explore_map_enabled);
    }

    #[test]
    fn locked_options_ignore_lobby() {
        let config = ShroudConfig::from_yaml_str(
            "fog:\n  enabled: true\n  locked: true\nexplored_map:\n  enabled: false\n",
        )
        .unwrap();
        let lobby = LobbyOptions::new().with(FOG_OPTION, false);
        assert!(config.resolve(&lobby).fog_enabled);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ShroudConfig::from_yaml_str("explored_map:\n  enabled: true\n").unwrap();
        assert!(config.fog.enabled);
        assert!(config.explored_map.enabled);
        assert!(config.explored_map.visible);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = ShroudConfig::from_yaml_str("fog: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
