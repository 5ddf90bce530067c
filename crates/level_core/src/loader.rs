//! JSON loader for module catalogs and generator configs.
//!
//! A catalog file lists the modules together with the ids of the start and
//! goal modules:
//!
//! ```json
//! {
//!   "modules": [
//!     { "id": "open", "edges": ["Open", "Open", "Open", "Open"], "glyph": "." },
//!     { "id": "wall", "edges": ["Block", "Block", "Block", "Block"], "glyph": "#" }
//!   ],
//!   "start": "start",
//!   "goal": "goal"
//! }
//! ```
//!
//! Edges are listed `[bottom, right, top, left]`.

use crate::config::{ConfigError, GeneratorConfig};
use crate::module::{Module, ModuleCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Error type for reading catalogs, configs and snapshots.
#[derive(Debug)]
pub enum LoadError {
    /// File cannot be read or written
    Io(std::io::Error),
    /// Malformed JSON or unknown edge label
    Json(serde_json::Error),
    /// Well-formed file describing an invalid catalog
    Catalog(ConfigError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "io error: {}", e),
            LoadError::Json(e) => write!(f, "JSON error: {}", e),
            LoadError::Catalog(e) => write!(f, "invalid catalog: {}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            LoadError::Json(e) => Some(e),
            LoadError::Catalog(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        LoadError::Catalog(e)
    }
}

/// On-disk form of a [`ModuleCatalog`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFile {
    pub modules: Vec<Module>,
    pub start: String,
    pub goal: String,
}

impl CatalogFile {
    pub fn from_catalog(catalog: &ModuleCatalog) -> Self {
        Self {
            modules: catalog.modules().to_vec(),
            start: catalog.get(catalog.start()).id.clone(),
            goal: catalog.get(catalog.goal()).id.clone(),
        }
    }

    pub fn into_catalog(self) -> Result<ModuleCatalog, ConfigError> {
        ModuleCatalog::new(self.modules, &self.start, &self.goal)
    }
}

/// Parse and validate a catalog from a JSON string.
pub fn catalog_from_str(json: &str) -> Result<ModuleCatalog, LoadError> {
    let file: CatalogFile = serde_json::from_str(json)?;
    Ok(file.into_catalog()?)
}

/// Load a catalog from a JSON file.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<ModuleCatalog, LoadError> {
    let content = std::fs::read_to_string(path)?;
    catalog_from_str(&content)
}

/// Write a catalog as pretty JSON.
pub fn save_catalog(catalog: &ModuleCatalog, path: impl AsRef<Path>) -> Result<(), LoadError> {
    let json = serde_json::to_string_pretty(&CatalogFile::from_catalog(catalog))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a generator config from a JSON file. Missing fields take defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<GeneratorConfig, LoadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
