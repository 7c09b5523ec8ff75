use crate::catalog::ExamKind;
use crate::field::FieldAttributes;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Catalog seed document: categories, exams with their fields, and
/// composition expressed by exam code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogSeed {
    pub categories: Vec<String>,
    pub exams: Vec<SeedExam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedExam {
    pub code: String,
    pub name: String,
    pub kind: ExamKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_profile: bool,
    #[serde(default)]
    pub sampling_instructions: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldAttributes>,
    /// Component exam codes, in display order
    #[serde(default)]
    pub components: Vec<String>,
}

impl CatalogSeed {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn merge(&mut self, other: CatalogSeed) {
        for category in other.categories {
            if !self.categories.contains(&category) {
                self.categories.push(category);
            }
        }
        self.exams.extend(other.exams);
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.exams.is_empty()
    }
}

/// Loader for catalog seed files
pub struct CatalogSeedLoader;

impl CatalogSeedLoader {
    /// Load and merge every `*.json` seed in a directory, in file name order.
    ///
    /// A missing directory yields an empty seed; unreadable or malformed
    /// files are skipped with a warning.
    pub fn load_from_directory(dir_path: impl AsRef<Path>) -> Result<CatalogSeed, String> {
        let mut seed = CatalogSeed::default();
        let dir_path = dir_path.as_ref();

        if !dir_path.exists() {
            return Ok(seed);
        }

        let entries = std::fs::read_dir(dir_path)
            .map_err(|e| format!("Failed to read directory: {}", e))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = 0;
        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(content) => match CatalogSeed::from_json(&content) {
                    Ok(file_seed) => {
                        seed.merge(file_seed);
                        files += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse catalog seed {:?}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read file {:?}: {}", path, e);
                }
            }
        }

        tracing::info!(
            "Loaded {} exams from {} seed file(s) in {:?}",
            seed.exams.len(),
            files,
            dir_path
        );
        Ok(seed)
    }
}
