//! Editor configuration read from an optional TOML file.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use gridboard_core::{
    GeometryError, Lattice, SurfaceMargins, DEFAULT_CELL_SIZE, DEFAULT_DOUBLE_CLICK_WINDOW,
    DEFAULT_FOOTPRINT,
};
use serde::Deserialize;
use thiserror::Error;

/// File consulted when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_PATH: &str = "gridboard.toml";

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}")]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// The lattice dimensions are unusable.
    #[error("invalid lattice: {0}")]
    Lattice(#[from] GeometryError),
    /// Persistence is enabled without anywhere to send snapshots.
    #[error("persistence is enabled but the endpoint is empty")]
    MissingEndpoint,
    /// Double clicks could never be recognised.
    #[error("double click window must be longer than zero milliseconds")]
    ZeroDoubleClickWindow,
}

/// Complete editor configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) lattice: LatticeConfig,
    pub(crate) margins: MarginsConfig,
    pub(crate) interaction: InteractionConfig,
    pub(crate) persistence: PersistenceConfig,
    pub(crate) palette: PaletteConfig,
    pub(crate) window: WindowConfig,
}

/// `[lattice]` section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LatticeConfig {
    pub(crate) cell_size: u32,
    pub(crate) footprint: u32,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            footprint: DEFAULT_FOOTPRINT,
        }
    }
}

/// `[margins]` section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MarginsConfig {
    pub(crate) horizontal: u32,
    pub(crate) top: u32,
    pub(crate) bottom: u32,
}

impl Default for MarginsConfig {
    fn default() -> Self {
        let margins = SurfaceMargins::default();
        Self {
            horizontal: margins.horizontal,
            top: margins.top,
            bottom: margins.bottom,
        }
    }
}

/// `[interaction]` section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct InteractionConfig {
    pub(crate) double_click_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            double_click_ms: u64::try_from(DEFAULT_DOUBLE_CLICK_WINDOW.as_millis())
                .unwrap_or(250),
        }
    }
}

/// `[persistence]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PersistenceConfig {
    pub(crate) endpoint: String,
    pub(crate) enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/grid/update".to_owned(),
            enabled: true,
        }
    }
}

/// `[palette]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PaletteConfig {
    pub(crate) directory: PathBuf,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("static/icons"),
        }
    }
}

/// `[window]` section.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct WindowConfig {
    pub(crate) title: String,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Gridboard".to_owned(),
            width: 1280,
            height: 900,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Overrides {
    pub(crate) icons: Option<PathBuf>,
    pub(crate) endpoint: Option<String>,
    pub(crate) offline: bool,
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is
    /// read when present and the built-in defaults are used otherwise.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_PATH);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Reads and parses a configuration file.
    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub(crate) fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Applies command-line overrides.
    pub(crate) fn apply(&mut self, overrides: Overrides) {
        if let Some(icons) = overrides.icons {
            self.palette.directory = icons;
        }
        if let Some(endpoint) = overrides.endpoint {
            self.persistence.endpoint = endpoint;
        }
        if overrides.offline {
            self.persistence.enabled = false;
        }
    }

    /// Rejects settings the editor cannot run with.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let _ = self.lattice()?;
        if self.interaction.double_click_ms == 0 {
            return Err(ConfigError::ZeroDoubleClickWindow);
        }
        if self.persistence.enabled && self.persistence.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }

    /// Lattice described by the `[lattice]` section.
    pub(crate) fn lattice(&self) -> Result<Lattice, ConfigError> {
        Ok(Lattice::new(self.lattice.cell_size, self.lattice.footprint)?)
    }

    /// Margins described by the `[margins]` section.
    #[must_use]
    pub(crate) fn margins(&self) -> SurfaceMargins {
        SurfaceMargins {
            horizontal: self.margins.horizontal,
            top: self.margins.top,
            bottom: self.margins.bottom,
        }
    }

    /// Double-click window described by the `[interaction]` section.
    #[must_use]
    pub(crate) fn double_click_window(&self) -> Duration {
        Duration::from_millis(self.interaction.double_click_ms)
    }
}
