use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use providers::{InMemoryMetadataClient, LayerRegistration, ServiceInfo, ServiceLegend};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_render_legends")]
    pub render_legends: bool,
    #[serde(default)]
    pub layers: Vec<LayerRegistration>,
    /// Canned service metadata keyed by service URL. When present, no
    /// network requests are made.
    #[serde(default)]
    pub fixtures: BTreeMap<String, ServiceFixture>,
}

fn default_render_legends() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ServiceFixture {
    #[serde(default)]
    pub info: ServiceInfo,
    #[serde(default)]
    pub legend: ServiceLegend,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn offline_client(&self) -> Option<InMemoryMetadataClient> {
        if self.fixtures.is_empty() {
            return None;
        }
        let mut client = InMemoryMetadataClient::new();
        for (url, fixture) in &self.fixtures {
            client.insert(url.as_str(), fixture.info.clone(), fixture.legend.clone());
        }
        Some(client)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Config::parse(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
