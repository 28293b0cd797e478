//! Checklist Catalog: the fixed, ordered registry of symptom entries.
//!
//! Loaded once at startup (built-in JSON, or `SYMPTOM_CATALOG_PATH` override) and
//! shared read-only through `AppState`. Catalog order is the rendering order everywhere.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/symptoms.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog has no entries")]
    Empty,

    #[error("duplicate symptom id '{0}'")]
    DuplicateId(String),

    #[error("symptom entry #{index} has an empty {field}")]
    MissingField { index: usize, field: &'static str },
}

/// One checklist symptom. Immutable for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomEntry {
    pub id: String,
    pub label: String,
    /// How the sign is performed; fed to the illustration prompt and printed in the document.
    pub libras_description: String,
    /// Static asset shown by the UI until a generated image is available.
    pub placeholder_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<SymptomEntry>,
}

impl Catalog {
    /// The catalog bundled with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Reads the override file when given, the built-in catalog otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let catalog = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&raw)?
            }
            None => Self::builtin()?,
        };
        info!(
            entries = catalog.entries.len(),
            source = %path.map(|p| p.display().to_string()).unwrap_or_else(|| "builtin".to_string()),
            "Symptom catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let entries: Vec<SymptomEntry> = serde_json::from_str(raw)?;
        Self::new(entries)
    }

    /// Validates ids (non-empty, unique) and required text fields.
    pub fn new(entries: Vec<SymptomEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(CatalogError::MissingField { index, field: "id" });
            }
            if entry.label.trim().is_empty() {
                return Err(CatalogError::MissingField {
                    index,
                    field: "label",
                });
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SymptomEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&SymptomEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
pub(crate) fn test_entry(id: &str, label: &str) -> SymptomEntry {
    SymptomEntry {
        id: id.to_string(),
        label: label.to_string(),
        libras_description: format!("Sinal de {label}"),
        placeholder_image: format!("/static/symptoms/{id}.svg"),
        warning: None,
    }
}
