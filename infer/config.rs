use crate::error::BifsgError;
use crate::files::{TableFormat, TableLayout};
use crate::types::{Direction, Resolution};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which Bayesian formula the engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    /// Surname and geography.
    Bisg,
    /// Surname, first name and geography.
    Bifsg,
}

/// Which direction of the geography table the engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeographyDirection {
    /// `p(geography | race)`: the column-normalized table.
    #[default]
    GeographyGivenRace,
    /// `p(race | geography)`: the row-normalized table. BISG only.
    RaceGivenGeography,
}

impl GeographyDirection {
    pub fn table_direction(self) -> Direction {
        match self {
            GeographyDirection::GeographyGivenRace => Direction::ProxyGivenRace,
            GeographyDirection::RaceGivenGeography => Direction::RaceGivenProxy,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_vintage() -> String {
    "2010".to_string()
}

fn default_first_name_source() -> String {
    "harvard".to_string()
}

/// Engine configuration, normally loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub model: Model,
    pub resolution: Resolution,
    #[serde(default)]
    pub geography_direction: GeographyDirection,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub format: TableFormat,
    #[serde(default = "default_vintage")]
    pub vintage: String,
    #[serde(default = "default_first_name_source")]
    pub first_name_source: String,
}

impl EngineConfig {
    pub fn new(model: Model, resolution: Resolution, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            resolution,
            geography_direction: GeographyDirection::default(),
            data_dir: data_dir.into(),
            format: TableFormat::default(),
            vintage: default_vintage(),
            first_name_source: default_first_name_source(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, BifsgError> {
        // Surface a bad resolution as its own error kind rather than a generic parse error.
        let raw: toml::Table = toml::from_str(text)?;
        if let Some(resolution) = raw.get("resolution").and_then(toml::Value::as_str) {
            resolution.parse::<Resolution>()?;
        }
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, BifsgError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// BIFSG is defined over `p(g|r)` only.
    pub fn validate(&self) -> Result<(), BifsgError> {
        if self.model == Model::Bifsg
            && self.geography_direction != GeographyDirection::GeographyGivenRace
        {
            return Err(BifsgError::ModelMismatch(
                "BIFSG requires geography_direction = \"geography_given_race\"".to_string(),
            ));
        }
        Ok(())
    }

    pub fn layout(&self) -> TableLayout {
        TableLayout {
            vintage: self.vintage.clone(),
            first_name_source: self.first_name_source.clone(),
            format: self.format,
        }
    }
}
