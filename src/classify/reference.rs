use std::path::Path;

use config::{Config, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const BUILTIN: &str = include_str!("../../data/reference.toml");

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Failed to load reference data: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid facility pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SponsorLists {
    #[serde(default)]
    pub large_cap: Vec<String>,
    #[serde(default)]
    pub mid_market: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacilityRule {
    pub label: String,
    pub pattern: String,
}

/// Curated names and patterns used by the classifiers. Built once and
/// handed to each classifier; never mutated afterwards.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub sponsors: SponsorLists,
    #[serde(default)]
    pub facilities: Vec<FacilityRule>,
}

impl ReferenceData {
    pub fn from_toml_str(text: &str) -> Result<Self, ReferenceError> {
        let data = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(data)
    }

    /// Reference data shipped with the binary.
    pub fn builtin() -> Result<Self, ReferenceError> {
        Self::from_toml_str(BUILTIN)
    }

    /// Load from `path`, falling back to the built-in copy when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        if !path.exists() {
            warn!(path = %path.display(), "Reference file not found, using built-in lists");
            return Self::builtin();
        }
        let data: ReferenceData = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        info!(
            path = %path.display(),
            large_cap = data.sponsors.large_cap.len(),
            mid_market = data.sponsors.mid_market.len(),
            facility_rules = data.facilities.len(),
            "Loaded reference data"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_lists_parse() {
        let data = ReferenceData::builtin().unwrap();
        assert!(data.sponsors.large_cap.iter().any(|n| n == "Pfizer"));
        assert!(data.sponsors.mid_market.iter().any(|n| n == "BeiGene"));
        assert!(!data.facilities.is_empty());
        assert_eq!(data.facilities[0].label, "university");
    }

    #[test]
    fn file_overrides_builtin() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[sponsors]\nlarge_cap = [\"Acme\"]\n\n[[facilities]]\nlabel = \"clinic\"\npattern = 'clinic'"
        )
        .unwrap();
        let data = ReferenceData::load(file.path()).unwrap();
        assert_eq!(data.sponsors.large_cap, vec!["Acme"]);
        assert!(data.sponsors.mid_market.is_empty());
        assert_eq!(data.facilities[0].pattern, "clinic");
    }

    #[test]
    fn missing_file_uses_builtin() {
        let data = ReferenceData::load(Path::new("does/not/exist.toml")).unwrap();
        assert!(!data.sponsors.large_cap.is_empty());
    }
}
