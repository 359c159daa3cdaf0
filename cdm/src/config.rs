use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Errors raised while loading a [`ResolverConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },
}

/// Resolution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Hard bound on nested expansion frames (entities, groups, constants).
    pub max_recursion_depth: usize,
    /// Directives added to every request
    pub default_directives: Vec<String>,
    /// Values used where no resolution guidance sets them
    pub guidance: GuidanceDefaults,
    /// Data type of generated foreign key attributes
    pub foreign_key_data_type: String,
    /// Data type of generated count attributes
    pub count_data_type: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 64,
            default_directives: Vec::new(),
            guidance: GuidanceDefaults::default(),
            foreign_key_data_type: "entityId".to_string(),
            count_data_type: "integer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceDefaults {
    pub allow_reference: bool,
    pub always_include_foreign_key: bool,
    pub reference_only_after_depth: usize,
    pub rename_format: String,
    pub starting_ordinal: i64,
    pub maximum_expansion: usize,
}

impl Default for GuidanceDefaults {
    fn default() -> Self {
        Self {
            allow_reference: true,
            always_include_foreign_key: false,
            reference_only_after_depth: 2,
            rename_format: "{a}{o}{M}".to_string(),
            starting_ordinal: 0,
            maximum_expansion: 5,
        }
    }
}

impl ResolverConfig {
    /// Create a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Create a configuration from `CDM_*` environment variables, starting from defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `CDM_*` overrides read through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup("CDM_MAX_RECURSION_DEPTH") {
            self.max_recursion_depth = parse_var("CDM_MAX_RECURSION_DEPTH", &value)?;
        }
        if let Some(value) = lookup("CDM_DEFAULT_DIRECTIVES") {
            self.default_directives = value
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = lookup("CDM_REFERENCE_ONLY_AFTER_DEPTH") {
            self.guidance.reference_only_after_depth =
                parse_var("CDM_REFERENCE_ONLY_AFTER_DEPTH", &value)?;
        }
        if let Some(value) = lookup("CDM_MAXIMUM_EXPANSION") {
            self.guidance.maximum_expansion = parse_var("CDM_MAXIMUM_EXPANSION", &value)?;
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_recursion_depth = 10\n\n[guidance]\nrename_format = \"{{a}}_{{o}}\""
        )
        .unwrap();

        let config = ResolverConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_recursion_depth, 10);
        assert_eq!(config.guidance.rename_format, "{a}_{o}");
        assert_eq!(config.guidance.maximum_expansion, 5);
        assert_eq!(config.foreign_key_data_type, "entityId");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ResolverConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CDM_DEFAULT_DIRECTIVES", "structured, normalized,"),
            ("CDM_MAXIMUM_EXPANSION", "3"),
        ]
        .into_iter()
        .collect();
        let config = ResolverConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.default_directives, vec!["structured", "normalized"]);
        assert_eq!(config.guidance.maximum_expansion, 3);
        assert_eq!(config.max_recursion_depth, 64);

        let err = ResolverConfig::default()
            .with_overrides(|k| (k == "CDM_MAX_RECURSION_DEPTH").then(|| "deep".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
